//! Text record format for telemetry samples.
//!
//! # Wire Format
//!
//! ```text
//! Distance: 12.34 cm, Tilt Angle: -5.60 degrees\n
//! ```
//!
//! Both numbers are fixed-point with two decimals. Whitespace inside the
//! literal tokens matches zero or more whitespace characters, the same
//! leniency a `scanf` directive gives, so peers that pad differently still
//! parse. Everything else is literal.

use crate::core::types::TelemetrySample;

/// Leading literal of every record
pub const RECORD_PREFIX: &str = "Distance:";
/// Final literal of every record; also the frame terminator
pub const RECORD_TERMINATOR: &str = "degrees";

/// Which numeric field a parse failure refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Distance,
    Tilt,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Distance => write!(f, "distance"),
            Field::Tilt => write!(f, "tilt"),
        }
    }
}

/// Why a record was rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("empty record")]
    Empty,

    #[error("expected {expected:?} at byte {offset}")]
    ExpectedLiteral {
        expected: &'static str,
        offset: usize,
    },

    #[error("invalid {field} value {text:?}")]
    InvalidNumber { field: Field, text: String },

    #[error("{field} value is not finite")]
    NonFinite { field: Field },

    #[error("unexpected data after record")]
    TrailingData,

    #[error("no record terminator within {len} bytes")]
    Overflow { len: usize },
}

/// Format one sample as a newline-terminated record
pub fn format_record(sample: &TelemetrySample) -> String {
    format!(
        "Distance: {:.2} cm, Tilt Angle: {:.2} degrees\n",
        sample.distance_cm, sample.tilt_deg
    )
}

/// Parse exactly one record (surrounding whitespace allowed)
pub fn parse_record(text: &str) -> Result<TelemetrySample, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut cursor = Cursor::new(text);
    cursor.skip_ws();
    cursor.literal("Distance:")?;
    cursor.skip_ws();
    let distance_cm = cursor.number(Field::Distance)?;
    cursor.skip_ws();
    cursor.literal("cm,")?;
    cursor.skip_ws();
    cursor.literal("Tilt")?;
    cursor.skip_ws();
    cursor.literal("Angle:")?;
    cursor.skip_ws();
    let tilt_deg = cursor.number(Field::Tilt)?;
    cursor.skip_ws();
    cursor.literal(RECORD_TERMINATOR)?;
    cursor.skip_ws();
    if !cursor.at_end() {
        return Err(ParseError::TrailingData);
    }

    Ok(TelemetrySample {
        distance_cm,
        tilt_deg,
    })
}

/// Byte cursor over an ASCII record
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn literal(&mut self, expected: &'static str) -> Result<(), ParseError> {
        if self.rest().starts_with(expected) {
            self.pos += expected.len();
            Ok(())
        } else {
            Err(ParseError::ExpectedLiteral {
                expected,
                offset: self.pos,
            })
        }
    }

    /// Longest run of float characters, then `f32::from_str`
    fn number(&mut self, field: Field) -> Result<f32, ParseError> {
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
            .unwrap_or(rest.len());
        let token = &rest[..len];
        let value: f32 = token.parse().map_err(|_| ParseError::InvalidNumber {
            field,
            text: token.to_string(),
        })?;
        if !value.is_finite() {
            return Err(ParseError::NonFinite { field });
        }
        self.pos += len;
        Ok(value)
    }
}
