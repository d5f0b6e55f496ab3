//! SMBus access through the Linux i2c-dev interface

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::debug;

use super::SmbusIo;
use crate::constants::paths;
use crate::error::{Result, WmError};

// <linux/i2c-dev.h>
const I2C_SLAVE: u64 = 0x0703;
const I2C_SMBUS: u64 = 0x0720;

// <linux/i2c.h>
const I2C_SMBUS_WRITE: u8 = 0;
const I2C_SMBUS_READ: u8 = 1;
const I2C_SMBUS_BYTE_DATA: u32 = 2;
const I2C_SMBUS_BLOCK_MAX: usize = 32;

#[repr(C)]
union SmbusData {
    byte: u8,
    // Sizes the union to the kernel's buffer
    #[allow(dead_code)]
    block: [u8; I2C_SMBUS_BLOCK_MAX + 2],
}

#[repr(C)]
struct SmbusIoctlData {
    read_write: u8,
    command: u8,
    size: u32,
    data: *mut SmbusData,
}

pub struct I2cDev {
    path: PathBuf,
    file: File,
    /// Slave address currently bound to the descriptor. Also serializes the
    /// bind + transfer pair.
    slave: Mutex<Option<u8>>,
}

impl I2cDev {
    /// Open `/dev/i2c-<bus>`
    pub fn open(bus: u32) -> Result<Self> {
        let path = PathBuf::from(format!("{}{}", paths::I2C_DEV_PREFIX, bus));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| WmError::DeviceOpen {
                path: path.clone(),
                source,
            })?;
        debug!("Opened SMBus adapter {}", path.display());
        Ok(Self {
            path,
            file,
            slave: Mutex::new(None),
        })
    }

    fn target(&self, address: u8) -> String {
        format!("{}@0x{:02x}", self.path.display(), address)
    }

    fn bind(&self, current: &mut Option<u8>, address: u8) -> Result<()> {
        if *current == Some(address) {
            return Ok(());
        }
        // SAFETY: ioctl is safe when:
        // 1. the descriptor is open for the lifetime of self.file
        // 2. I2C_SLAVE takes the address by value, no memory is shared
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_SLAVE as _,
                address as libc::c_ulong,
            )
        };
        if rc < 0 {
            *current = None;
            return Err(WmError::transport(
                self.target(address),
                format!("I2C_SLAVE failed: {}", std::io::Error::last_os_error()),
            ));
        }
        *current = Some(address);
        Ok(())
    }

    fn transfer(&self, address: u8, read_write: u8, command: u8, data: &mut SmbusData) -> Result<()> {
        let mut current = self.slave.lock();
        self.bind(&mut current, address)?;

        let mut args = SmbusIoctlData {
            read_write,
            command,
            size: I2C_SMBUS_BYTE_DATA,
            data: data as *mut SmbusData,
        };
        // SAFETY: ioctl is safe when:
        // 1. the descriptor is open for the lifetime of self.file
        // 2. args and the data union it points to are repr(C), live on this
        //    stack frame and outlive the call
        let rc = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_SMBUS as _,
                &mut args as *mut SmbusIoctlData,
            )
        };
        if rc < 0 {
            return Err(WmError::transport(
                self.target(address),
                format!(
                    "SMBus transfer of command 0x{:02x} failed: {}",
                    command,
                    std::io::Error::last_os_error()
                ),
            ));
        }
        Ok(())
    }
}

impl SmbusIo for I2cDev {
    fn read_byte_data(&self, address: u8, command: u8) -> Result<u8> {
        let mut data = SmbusData { block: [0; I2C_SMBUS_BLOCK_MAX + 2] };
        self.transfer(address, I2C_SMBUS_READ, command, &mut data)?;
        // SAFETY: the union was fully initialized through `block` and every
        // bit pattern is a valid u8
        Ok(unsafe { data.byte })
    }

    fn write_byte_data(&self, address: u8, command: u8, value: u8) -> Result<()> {
        let mut data = SmbusData { block: [0; I2C_SMBUS_BLOCK_MAX + 2] };
        data.byte = value;
        self.transfer(address, I2C_SMBUS_WRITE, command, &mut data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ioctl_layout() {
        assert_eq!(std::mem::size_of::<SmbusData>(), I2C_SMBUS_BLOCK_MAX + 2);
    }

    #[test]
    fn test_open_missing_bus() {
        let err = I2cDev::open(9999).err().unwrap();
        assert!(matches!(err, WmError::DeviceOpen { .. }));
    }
}
