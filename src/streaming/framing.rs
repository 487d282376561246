//! Record reassembly from an unframed byte stream.
//!
//! Peers may send records with or without a trailing newline, and TCP is free
//! to split or merge them across reads. Records are therefore cut at the
//! `degrees` terminator, not at read boundaries:
//!
//! ```text
//! read 1: "Distance: 12.3"                      -> pending
//! read 2: "4 cm, Tilt Angle: 1.00 degreesDist"  -> 1 record, "Dist" pending
//! read 3: "ance: 9.00 cm, Tilt Angle: 0.00 degrees\n" -> 1 record
//! ```
//!
//! Bytes that cannot start a record are reported as a parse fault and
//! dropped, which resynchronizes on the next `Distance:` prefix.

use super::wire::{ParseError, RECORD_PREFIX, RECORD_TERMINATOR, parse_record};
use crate::core::types::TelemetrySample;

/// Receive buffer bound; also the largest pending partial record
pub const MAX_RECORD_BUFFER: usize = 1024;

/// Outcome of one reassembled record
pub type RecordResult = std::result::Result<TelemetrySample, ParseError>;

/// Incremental record splitter
pub struct RecordAssembler {
    pending: String,
    capacity: usize,
}

impl RecordAssembler {
    pub fn new() -> Self {
        Self::with_capacity(MAX_RECORD_BUFFER)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: String::with_capacity(capacity),
            capacity,
        }
    }

    /// Bytes held back waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed received bytes; returns every record completed by them, in order
    pub fn push(&mut self, bytes: &[u8]) -> Vec<RecordResult> {
        self.pending.push_str(&String::from_utf8_lossy(bytes));
        let mut out = Vec::new();

        while let Some(idx) = self.pending.find(RECORD_TERMINATOR) {
            let end = idx + RECORD_TERMINATOR.len();
            Self::split_chunk(&self.pending[..end], &mut out);
            self.pending.replace_range(..end, "");
            self.trim_leading_ws();
        }

        self.discard_junk(&mut out);

        if self.pending.len() > self.capacity {
            out.push(Err(ParseError::Overflow {
                len: self.pending.len(),
            }));
            self.pending.clear();
        }

        out
    }

    /// Parse one terminator-bounded chunk, reporting any junk before the
    /// last record prefix separately
    fn split_chunk(chunk: &str, out: &mut Vec<RecordResult>) {
        match chunk.rfind(RECORD_PREFIX) {
            Some(p) if p > 0 && !chunk[..p].trim().is_empty() => {
                out.push(parse_record(&chunk[..p]));
                out.push(parse_record(&chunk[p..]));
            }
            _ => out.push(parse_record(chunk)),
        }
    }

    /// Drop pending bytes that can no longer begin a record
    fn discard_junk(&mut self, out: &mut Vec<RecordResult>) {
        self.trim_leading_ws();
        if self.pending.is_empty() {
            return;
        }

        let junk_len = match self.pending.find(RECORD_PREFIX) {
            Some(p) => p,
            None => {
                // Keep a tail that may still grow into the prefix
                let max_keep = (RECORD_PREFIX.len() - 1).min(self.pending.len());
                let keep = (1..=max_keep)
                    .rev()
                    .find(|&k| self.pending.ends_with(&RECORD_PREFIX[..k]))
                    .unwrap_or(0);
                self.pending.len() - keep
            }
        };

        if junk_len > 0 {
            out.push(parse_record(&self.pending[..junk_len]));
            self.pending.replace_range(..junk_len, "");
        }
    }

    fn trim_leading_ws(&mut self) {
        let ws = self.pending.len() - self.pending.trim_start().len();
        if ws > 0 {
            self.pending.replace_range(..ws, "");
        }
    }
}

impl Default for RecordAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REC_A: &str = "Distance: 12.34 cm, Tilt Angle: -5.60 degrees";
    const REC_B: &str = "Distance: 50.00 cm, Tilt Angle: 40.00 degrees";

    fn ok(results: Vec<RecordResult>) -> Vec<TelemetrySample> {
        results.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_single_unterminated_record() {
        let mut asm = RecordAssembler::new();
        let samples = ok(asm.push(REC_A.as_bytes()));
        assert_eq!(samples, vec![TelemetrySample::new(12.34, -5.60)]);
        assert_eq!(asm.pending_len(), 0);
    }

    #[test]
    fn test_coalesced_records() {
        let mut asm = RecordAssembler::new();
        let joined = format!("{}{}\n", REC_A, REC_B);
        let samples = ok(asm.push(joined.as_bytes()));
        assert_eq!(
            samples,
            vec![
                TelemetrySample::new(12.34, -5.60),
                TelemetrySample::new(50.0, 40.0)
            ]
        );
    }

    #[test]
    fn test_fragmented_record() {
        let mut asm = RecordAssembler::new();
        assert!(asm.push(b"Distance: 12.3").is_empty());
        assert!(asm.push(b"4 cm, Tilt Angle: -5.6").is_empty());
        let samples = ok(asm.push(b"0 degrees\nDist"));
        assert_eq!(samples, vec![TelemetrySample::new(12.34, -5.60)]);
        assert_eq!(asm.pending_len(), 4);
    }

    #[test]
    fn test_garbage_reported_and_dropped() {
        let mut asm = RecordAssembler::new();
        let results = asm.push(b"garbage");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
        assert_eq!(asm.pending_len(), 0);
    }

    #[test]
    fn test_resync_after_junk() {
        let mut asm = RecordAssembler::new();
        let mixed = format!("xx{}", REC_B);
        let results = asm.push(mixed.as_bytes());
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert_eq!(results[1], Ok(TelemetrySample::new(50.0, 40.0)));
    }

    #[test]
    fn test_truncated_record_followed_by_full_one() {
        let mut asm = RecordAssembler::new();
        let stream = format!("Distance: 1.00 cm, Tilt{}", REC_B);
        let results = asm.push(stream.as_bytes());
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Err(ParseError::ExpectedLiteral { .. })
        ));
        assert_eq!(results[1], Ok(TelemetrySample::new(50.0, 40.0)));
    }

    #[test]
    fn test_overflow_without_terminator() {
        let mut asm = RecordAssembler::new();
        let huge = format!("Distance: {}", "1".repeat(MAX_RECORD_BUFFER + 10));
        let results = asm.push(huge.as_bytes());
        assert!(matches!(results.as_slice(), [Err(ParseError::Overflow { .. })]));
        assert_eq!(asm.pending_len(), 0);
    }
}
