//! Register access to an I2C device through `/dev/i2c-*`

use crate::core::platform::RegisterBus;
use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;

/// i2c-dev ioctl: select the target address for subsequent read/write
const I2C_SLAVE: u32 = 0x0703;

/// Opened bus bound to one device address
pub struct I2cDevice {
    file: File,
}

impl I2cDevice {
    /// Open `/dev/i2c-<bus>` and bind it to `address`
    pub fn open(bus: u8, address: u16) -> Result<Self> {
        let path = format!("/dev/i2c-{}", bus);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| Error::Other(format!("Failed to open {}: {}", path, e)))?;

        // SAFETY: fd is an open i2c-dev node; I2C_SLAVE takes the address by value.
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), I2C_SLAVE as _, address as libc::c_ulong) };
        if rc == -1 {
            return Err(Error::Other(format!(
                "Failed to select I2C address {:#04x} on {}: {}",
                address,
                path,
                std::io::Error::last_os_error()
            )));
        }

        log::info!("I2C device {:#04x} opened on {}", address, path);
        Ok(Self { file })
    }
}

impl RegisterBus for I2cDevice {
    fn read_register(&mut self, register: u8) -> Result<u8> {
        let mut value = [0u8; 1];
        self.file
            .write_all(&[register])
            .and_then(|_| self.file.read_exact(&mut value))
            .map_err(|source| Error::Bus { register, source })?;
        Ok(value[0])
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.file
            .write_all(&[register, value])
            .map_err(|source| Error::Bus { register, source })
    }
}
