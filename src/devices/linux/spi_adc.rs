//! MCP3008 10-bit ADC on `/dev/spidev*` via the spidev ioctl interface.
//!
//! # Frame layout
//!
//! ```text
//! TX: [0x01] [SGL | CH<<4] [0x00]
//! RX: [ -- ] [ .. .. B9 B8] [B7..B0]
//! ```

use crate::core::platform::AnalogSource;
use crate::core::types::AnalogReading;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

// spidev ioctl requests (asm-generic _IOC encoding, magic 'k')
const SPI_IOC_WR_MODE: u32 = 0x4001_6b01;
const SPI_IOC_WR_BITS_PER_WORD: u32 = 0x4001_6b03;
const SPI_IOC_WR_MAX_SPEED_HZ: u32 = 0x4004_6b04;
const SPI_IOC_RD_MAX_SPEED_HZ: u32 = 0x8004_6b04;
/// SPI_IOC_MESSAGE(1): one 32-byte `spi_ioc_transfer`
const SPI_IOC_MESSAGE_1: u32 = 0x4020_6b00;

/// Start bit of an MCP3008 request
const START_BIT: u8 = 0x01;
/// Single-ended (as opposed to differential) input select
const SINGLE_ENDED: u8 = 0x08;

/// SPI bus settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SpiSettings {
    /// spidev device node
    pub device: String,
    /// Clock polarity/phase mode (0-3)
    pub mode: u8,
    pub bits_per_word: u8,
    pub speed_hz: u32,
    /// Delay after the transfer before deselecting (microseconds)
    pub delay_us: u16,
}

impl Default for SpiSettings {
    fn default() -> Self {
        Self {
            device: "/dev/spidev0.0".to_string(),
            mode: 0,
            bits_per_word: 8,
            speed_hz: 1_000_000,
            delay_us: 5,
        }
    }
}

/// Kernel `struct spi_ioc_transfer`
#[repr(C)]
#[derive(Default)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    pad: u8,
}

/// Control byte selecting a single-ended channel
#[inline]
pub(crate) fn control_byte(channel: u8) -> u8 {
    (SINGLE_ENDED | (channel & 0x07)) << 4
}

/// Build the three-byte request for `channel`
#[inline]
pub(crate) fn request_frame(channel: u8) -> [u8; 3] {
    [START_BIT, control_byte(channel), 0x00]
}

/// Extract the 10-bit result from a response frame
#[inline]
pub(crate) fn decode_frame(rx: &[u8; 3]) -> AnalogReading {
    AnalogReading::new((((rx[1] as u16) << 8) & 0x300) | rx[2] as u16)
}

/// MCP3008 converter on an opened spidev node
pub struct Mcp3008 {
    file: File,
    settings: SpiSettings,
}

impl Mcp3008 {
    /// Open and configure the SPI device
    pub fn open(settings: SpiSettings) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&settings.device)
            .map_err(|e| {
                Error::Other(format!("Failed to open SPI device {}: {}", settings.device, e))
            })?;

        let dev = Self { file, settings };
        dev.configure()?;
        log::info!(
            "SPI device {} ready (mode {}, {} bits, {} Hz)",
            dev.settings.device,
            dev.settings.mode,
            dev.settings.bits_per_word,
            dev.settings.speed_hz
        );
        Ok(dev)
    }

    fn configure(&self) -> Result<()> {
        let fd = self.file.as_raw_fd();
        let mode = self.settings.mode;
        let bits = self.settings.bits_per_word;
        let speed = self.settings.speed_hz;

        let writes: [(u32, *const libc::c_void, &str); 3] = [
            (SPI_IOC_WR_MODE, &mode as *const u8 as *const _, "mode"),
            (
                SPI_IOC_WR_BITS_PER_WORD,
                &bits as *const u8 as *const _,
                "bits per word",
            ),
            (
                SPI_IOC_WR_MAX_SPEED_HZ,
                &speed as *const u32 as *const _,
                "clock",
            ),
        ];

        for (request, arg, what) in writes {
            // SAFETY: fd is an open spidev node; write requests only read the
            // live value `arg` points at, whose size matches `request`.
            let rc = unsafe { libc::ioctl(fd, request as _, arg) };
            if rc == -1 {
                let e = std::io::Error::last_os_error();
                return Err(Error::Other(format!("Can't set SPI {}: {}", what, e)));
            }
        }

        let mut applied: u32 = 0;
        // SAFETY: read request; the kernel writes 4 bytes into `applied`,
        // which is a mutable local that outlives the call.
        let rc = unsafe {
            libc::ioctl(
                fd,
                SPI_IOC_RD_MAX_SPEED_HZ as _,
                &mut applied as *mut u32 as *mut libc::c_void,
            )
        };
        if rc == -1 {
            let e = std::io::Error::last_os_error();
            return Err(Error::Other(format!("Can't get SPI clock: {}", e)));
        }
        if applied != speed {
            log::warn!("SPI clock requested {} Hz, driver reports {} Hz", speed, applied);
        }
        Ok(())
    }
}

impl AnalogSource for Mcp3008 {
    fn analog_transfer(&mut self, channel: u8) -> Result<AnalogReading> {
        let tx = request_frame(channel);
        let mut rx = [0u8; 3];

        let transfer = SpiIocTransfer {
            tx_buf: tx.as_ptr() as u64,
            rx_buf: rx.as_mut_ptr() as u64,
            len: tx.len() as u32,
            speed_hz: self.settings.speed_hz,
            delay_usecs: self.settings.delay_us,
            bits_per_word: self.settings.bits_per_word,
            ..Default::default()
        };

        // SAFETY: tx/rx outlive the call and `len` matches both buffers.
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                SPI_IOC_MESSAGE_1 as _,
                &transfer as *const SpiIocTransfer,
            )
        };
        if rc == -1 {
            return Err(Error::Analog {
                channel,
                source: std::io::Error::last_os_error(),
            });
        }

        Ok(decode_frame(&rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_struct_matches_kernel_size() {
        assert_eq!(std::mem::size_of::<SpiIocTransfer>(), 32);
    }

    /// Direction bits of an `_IOC` request: 1 = write, 2 = read
    fn ioc_dir(request: u32) -> u32 {
        request >> 30
    }

    #[test]
    fn test_speed_readback_is_a_read_request() {
        assert_eq!(ioc_dir(SPI_IOC_RD_MAX_SPEED_HZ), 2);
        for request in [SPI_IOC_WR_MODE, SPI_IOC_WR_BITS_PER_WORD, SPI_IOC_WR_MAX_SPEED_HZ] {
            assert_eq!(ioc_dir(request), 1);
        }
    }

    #[test]
    fn test_open_regular_file_fails_cleanly() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let settings = SpiSettings {
            device: file.path().to_string_lossy().into_owned(),
            ..SpiSettings::default()
        };
        assert!(matches!(Mcp3008::open(settings), Err(Error::Other(_))));
    }

    #[test]
    fn test_channel_zero_is_single_ended() {
        // SGL/DIFF set: a cleared bit would sample CH0-CH1 differentially
        assert_eq!(control_byte(0) & 0x80, 0x80);
        assert_eq!(control_byte(7), 0xF0);
    }

    #[test]
    fn test_request_frame() {
        assert_eq!(request_frame(0), [0x01, 0x80, 0x00]);
        assert_eq!(request_frame(3), [0x01, 0xB0, 0x00]);
        // Channel wraps within 0-7
        assert_eq!(request_frame(9), request_frame(1));
    }

    #[test]
    fn test_decode_frame() {
        assert_eq!(decode_frame(&[0x00, 0x03, 0xFF]).value(), 1023);
        assert_eq!(decode_frame(&[0xFF, 0xFD, 0x90]).value(), 0x190);
        assert_eq!(decode_frame(&[0x00, 0x00, 0x00]).value(), 0);
    }
}
