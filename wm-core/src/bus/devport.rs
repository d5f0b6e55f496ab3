//! Port I/O through `/dev/port`
//!
//! The device maps file offsets one-to-one onto I/O ports, so a single-byte
//! positioned read or write is one `inb`/`outb`. Requires root.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::PortIo;
use crate::constants::paths;
use crate::error::{Result, WmError};

pub struct DevPort {
    path: PathBuf,
    file: File,
}

impl DevPort {
    /// Open the system port device
    pub fn open() -> Result<Self> {
        Self::open_path(paths::DEV_PORT)
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| WmError::DeviceOpen {
                path: path.clone(),
                source,
            })?;
        debug!("Opened port device {}", path.display());
        Ok(Self { path, file })
    }

    fn target(&self, port: u16) -> String {
        format!("{}:0x{:04x}", self.path.display(), port)
    }
}

impl PortIo for DevPort {
    fn inb(&self, port: u16) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.file
            .read_exact_at(&mut buf, port as u64)
            .map_err(|e| WmError::transport(self.target(port), format!("inb failed: {}", e)))?;
        Ok(buf[0])
    }

    fn outb(&self, port: u16, value: u8) -> Result<()> {
        self.file
            .write_all_at(&[value], port as u64)
            .map_err(|e| WmError::transport(self.target(port), format!("outb failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_positioned_byte_access() {
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(0x300).unwrap();

        let port = DevPort::open_path(file.path()).unwrap();
        port.outb(0x295, 0x4E).unwrap();
        port.outb(0x296, 0x01).unwrap();
        assert_eq!(port.inb(0x295).unwrap(), 0x4E);
        assert_eq!(port.inb(0x296).unwrap(), 0x01);
        assert_eq!(port.inb(0x290).unwrap(), 0x00);
    }

    #[test]
    fn test_read_past_end_is_transport_fault() {
        let file = NamedTempFile::new().unwrap();
        let port = DevPort::open_path(file.path()).unwrap();
        let err = port.inb(0x10).unwrap_err();
        assert!(err.is_transport_fault());
    }

    #[test]
    fn test_open_missing_device() {
        let err = DevPort::open_path("/nonexistent/port").err().unwrap();
        assert!(matches!(err, WmError::DeviceOpen { .. }));
    }
}
