//! Recording digital lines with scripted inputs

use super::ManualClock;
use crate::core::platform::DigitalLines;
use crate::core::types::{Level, LineDirection, LineId};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// One recorded `write_line` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEvent {
    pub line: LineId,
    pub level: Level,
    /// Virtual time of the write, when a clock is attached
    pub at: Option<Duration>,
}

/// In-memory lines.
///
/// Inputs read either a fixed level or a time script `[(from, level), ..]`
/// evaluated against the attached [`ManualClock`].
#[derive(Clone, Default)]
pub struct MockLines {
    inner: Arc<Mutex<LinesInner>>,
    clock: Option<ManualClock>,
}

#[derive(Default)]
struct LinesInner {
    exported: HashSet<LineId>,
    directions: HashMap<LineId, LineDirection>,
    levels: HashMap<LineId, Level>,
    scripts: HashMap<LineId, Vec<(Duration, Level)>>,
    events: Vec<LineEvent>,
    failing: HashSet<LineId>,
}

impl MockLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp writes and evaluate input scripts against `clock`
    pub fn with_clock(clock: ManualClock) -> Self {
        Self {
            inner: Arc::default(),
            clock: Some(clock),
        }
    }

    fn stamp(&self) -> Option<Duration> {
        self.clock.as_ref().map(ManualClock::peek)
    }

    /// Fix the level an input line reads
    pub fn set_input(&self, line: LineId, level: Level) {
        self.inner.lock().levels.insert(line, level);
    }

    /// Script an input: each entry takes effect from its timestamp onward
    pub fn script_input(&self, line: LineId, script: Vec<(Duration, Level)>) {
        self.inner.lock().scripts.insert(line, script);
    }

    /// Make writes to `line` fail
    pub fn fail_line(&self, line: LineId) {
        self.inner.lock().failing.insert(line);
    }

    pub fn is_exported(&self, line: LineId) -> bool {
        self.inner.lock().exported.contains(&line)
    }

    pub fn direction(&self, line: LineId) -> Option<LineDirection> {
        self.inner.lock().directions.get(&line).copied()
    }

    /// Last level written to (or set on) a line
    pub fn level(&self, line: LineId) -> Level {
        self.inner.lock().levels.get(&line).copied().unwrap_or_default()
    }

    pub fn events(&self) -> Vec<LineEvent> {
        self.inner.lock().events.clone()
    }

    /// Levels written to one line, in order
    pub fn writes_to(&self, line: LineId) -> Vec<Level> {
        self.inner
            .lock()
            .events
            .iter()
            .filter(|e| e.line == line)
            .map(|e| e.level)
            .collect()
    }

    /// Whether any write ever drove `line` high
    pub fn ever_high(&self, line: LineId) -> bool {
        self.writes_to(line).iter().any(|l| l.is_high())
    }

    pub fn clear_events(&self) {
        self.inner.lock().events.clear();
    }
}

impl DigitalLines for MockLines {
    fn export_line(&mut self, line: LineId) -> Result<()> {
        self.inner.lock().exported.insert(line);
        Ok(())
    }

    fn unexport_line(&mut self, line: LineId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.exported.remove(&line);
        inner.directions.remove(&line);
        Ok(())
    }

    fn set_direction(&mut self, line: LineId, direction: LineDirection) -> Result<()> {
        self.inner.lock().directions.insert(line, direction);
        Ok(())
    }

    fn write_line(&mut self, line: LineId, level: Level) -> Result<()> {
        let at = self.stamp();
        let mut inner = self.inner.lock();
        if inner.failing.contains(&line) {
            return Err(Error::Gpio {
                line,
                operation: "write",
                source: std::io::Error::other("mock write failure"),
            });
        }
        inner.levels.insert(line, level);
        inner.events.push(LineEvent { line, level, at });
        Ok(())
    }

    fn read_line(&mut self, line: LineId) -> Result<Level> {
        let now = self.clock.as_ref().map(|c| c.peek());
        let inner = self.inner.lock();
        if let (Some(script), Some(now)) = (inner.scripts.get(&line), now) {
            let level = script
                .iter()
                .take_while(|(from, _)| *from <= now)
                .last()
                .map(|(_, level)| *level)
                .unwrap_or_default();
            return Ok(level);
        }
        Ok(inner.levels.get(&line).copied().unwrap_or_default())
    }
}
