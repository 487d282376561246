//! Digital lines through the legacy sysfs GPIO interface.
//!
//! ```text
//! /sys/class/gpio/export          <- "5"
//! /sys/class/gpio/gpio5/direction <- "out"
//! /sys/class/gpio/gpio5/value     <- "1" / "0"
//! /sys/class/gpio/unexport        <- "5"
//! ```
//!
//! Value files are kept open after the first access so the pulse loop does
//! not pay an open/close per step.

use crate::core::platform::DigitalLines;
use crate::core::types::{Level, LineDirection, LineId};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Default sysfs GPIO root
pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// sysfs GPIO accessor
pub struct SysfsGpio {
    root: PathBuf,
    /// Open `value` files, keyed by line
    values: HashMap<LineId, File>,
}

impl SysfsGpio {
    pub fn new() -> Self {
        Self::with_root(SYSFS_GPIO_ROOT)
    }

    /// Use a different sysfs root (tests point this at a temp directory)
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            values: HashMap::new(),
        }
    }

    fn line_dir(&self, line: LineId) -> PathBuf {
        self.root.join(format!("gpio{}", line))
    }

    fn write_control(&self, file: &str, line: LineId) -> std::io::Result<()> {
        let mut f = OpenOptions::new().write(true).open(self.root.join(file))?;
        f.write_all(line.to_string().as_bytes())
    }

    fn value_file(&mut self, line: LineId, operation: &'static str) -> Result<&mut File> {
        if !self.values.contains_key(&line) {
            let path = self.line_dir(line).join("value");
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&path)
                .map_err(|source| Error::Gpio {
                    line,
                    operation,
                    source,
                })?;
            self.values.insert(line, file);
        }
        self.values.get_mut(&line).ok_or(Error::Gpio {
            line,
            operation,
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

/// How a failed write to `export` or `unexport` is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlFailure {
    /// `export`: the line is still held, typically by a previous run
    AlreadyExported,
    /// `unexport`: the line was not exported
    NotExported,
    Fatal,
}

fn classify_control_error(file: &str, error: &std::io::Error) -> ControlFailure {
    match (file, error.raw_os_error()) {
        ("export", Some(libc::EBUSY)) => ControlFailure::AlreadyExported,
        ("unexport", Some(libc::EINVAL)) => ControlFailure::NotExported,
        _ => ControlFailure::Fatal,
    }
}

impl DigitalLines for SysfsGpio {
    fn export_line(&mut self, line: LineId) -> Result<()> {
        match self.write_control("export", line) {
            Ok(()) => {
                log::debug!("GPIO {} exported", line);
                Ok(())
            }
            Err(e) if classify_control_error("export", &e) == ControlFailure::AlreadyExported => {
                // Left exported by a previous run: release and claim again
                log::info!("GPIO {} is already exported, unexporting...", line);
                self.unexport_line(line)?;
                self.write_control("export", line)
                    .map_err(|source| Error::Gpio {
                        line,
                        operation: "export",
                        source,
                    })?;
                log::debug!("GPIO {} exported", line);
                Ok(())
            }
            Err(source) => Err(Error::Gpio {
                line,
                operation: "export",
                source,
            }),
        }
    }

    fn unexport_line(&mut self, line: LineId) -> Result<()> {
        self.values.remove(&line);
        match self.write_control("unexport", line) {
            Ok(()) => {
                log::debug!("GPIO {} unexported", line);
                Ok(())
            }
            Err(e) if classify_control_error("unexport", &e) == ControlFailure::NotExported => {
                log::debug!("GPIO {} is not currently exported", line);
                Ok(())
            }
            Err(source) => Err(Error::Gpio {
                line,
                operation: "unexport",
                source,
            }),
        }
    }

    fn set_direction(&mut self, line: LineId, direction: LineDirection) -> Result<()> {
        let path = self.line_dir(line).join("direction");
        OpenOptions::new()
            .write(true)
            .open(&path)
            .and_then(|mut f| f.write_all(direction.as_str().as_bytes()))
            .map_err(|source| Error::Gpio {
                line,
                operation: "direction",
                source,
            })?;
        log::debug!("GPIO {} direction set to {}", line, direction.as_str());
        Ok(())
    }

    fn write_line(&mut self, line: LineId, level: Level) -> Result<()> {
        let byte: &[u8] = if level.is_high() { b"1" } else { b"0" };
        let file = self.value_file(line, "write")?;
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.write_all(byte))
            .map_err(|source| Error::Gpio {
                line,
                operation: "write",
                source,
            })
    }

    fn read_line(&mut self, line: LineId) -> Result<Level> {
        let file = self.value_file(line, "read")?;
        let mut buf = [0u8; 1];
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_exact(&mut buf))
            .map_err(|source| Error::Gpio {
                line,
                operation: "read",
                source,
            })?;
        Ok(Level::from_bool(buf[0] == b'1'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Lay out a fake sysfs tree with one pre-exported line
    fn fake_root(line: LineId) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("export"), "").unwrap();
        fs::write(dir.path().join("unexport"), "").unwrap();
        let line_dir = dir.path().join(format!("gpio{}", line));
        fs::create_dir(&line_dir).unwrap();
        fs::write(line_dir.join("direction"), "in").unwrap();
        fs::write(line_dir.join("value"), "0").unwrap();
        dir
    }

    #[test]
    fn test_claim_output_writes_control_files() {
        let dir = fake_root(5);
        let mut gpio = SysfsGpio::with_root(dir.path());

        gpio.claim_output(5).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("export")).unwrap(), "5");
        assert_eq!(
            fs::read_to_string(dir.path().join("gpio5/direction")).unwrap(),
            "out"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("gpio5/value")).unwrap(),
            "0"
        );
    }

    #[test]
    fn test_control_error_classification() {
        let busy = std::io::Error::from_raw_os_error(libc::EBUSY);
        let invalid = std::io::Error::from_raw_os_error(libc::EINVAL);
        let denied = std::io::Error::from_raw_os_error(libc::EACCES);

        assert_eq!(classify_control_error("export", &busy), ControlFailure::AlreadyExported);
        assert_eq!(classify_control_error("unexport", &invalid), ControlFailure::NotExported);
        // Each errno is only benign for its own control file
        assert_eq!(classify_control_error("export", &invalid), ControlFailure::Fatal);
        assert_eq!(classify_control_error("unexport", &busy), ControlFailure::Fatal);
        assert_eq!(classify_control_error("export", &denied), ControlFailure::Fatal);
        assert_eq!(
            classify_control_error("export", &std::io::Error::other("no errno")),
            ControlFailure::Fatal
        );
    }

    #[test]
    fn test_unexport_failure_is_gpio_error() {
        // No `unexport` file in the tree: the write fails with ENOENT
        let dir = tempfile::tempdir().unwrap();
        let mut gpio = SysfsGpio::with_root(dir.path());
        assert!(matches!(
            gpio.unexport_line(5),
            Err(Error::Gpio {
                line: 5,
                operation: "unexport",
                ..
            })
        ));
    }

    #[test]
    fn test_write_then_read_value() {
        let dir = fake_root(18);
        let mut gpio = SysfsGpio::with_root(dir.path());

        gpio.write_line(18, Level::High).unwrap();
        assert_eq!(gpio.read_line(18).unwrap(), Level::High);
        gpio.write_line(18, Level::Low).unwrap();
        assert_eq!(gpio.read_line(18).unwrap(), Level::Low);
    }

    #[test]
    fn test_missing_line_reports_gpio_error() {
        let dir = fake_root(5);
        let mut gpio = SysfsGpio::with_root(dir.path());

        let err = gpio.write_line(6, Level::High).unwrap_err();
        assert!(matches!(
            err,
            Error::Gpio {
                line: 6,
                operation: "write",
                ..
            }
        ));
        assert!(err.is_hardware());
    }
}
