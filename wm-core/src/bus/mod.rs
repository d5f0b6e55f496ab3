//! Bus transports
//!
//! A chip is reached either through a pair of I/O ports (ISA) or through
//! addressed byte transactions on an SMBus adapter. Both are modelled as a
//! capability trait plus an adapter wrapper that carries the adapter-wide lock.
//! Every chip on the same physical adapter must share one adapter value, since a
//! bank-select write from one chip is visible to every other chip on that bus.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use crate::constants::isa;
use crate::error::{Result, WmError};

mod devport;
mod i2cdev;
mod sim;

pub use devport::DevPort;
pub use i2cdev::I2cDev;
pub use sim::{BusOp, SimulatedChip};

/// Port-mapped I/O backend
#[cfg_attr(test, mockall::automock)]
pub trait PortIo: Send + Sync {
    fn inb(&self, port: u16) -> Result<u8>;
    fn outb(&self, port: u16, value: u8) -> Result<()>;
}

/// SMBus byte-data backend. Each call is one atomic bus transaction.
#[cfg_attr(test, mockall::automock)]
pub trait SmbusIo: Send + Sync {
    fn read_byte_data(&self, address: u8, command: u8) -> Result<u8>;
    fn write_byte_data(&self, address: u8, command: u8, value: u8) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    Isa,
    Smbus,
}

impl fmt::Display for BusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusKind::Isa => write!(f, "isa"),
            BusKind::Smbus => write!(f, "smbus"),
        }
    }
}

/// A named backend plus the lock that serializes multi-step sequences on it.
/// Clones share both the backend and the lock.
pub struct Adapter<T: ?Sized> {
    name: String,
    io: Arc<T>,
    lock: Arc<Mutex<()>>,
}

pub type IsaAdapter = Adapter<dyn PortIo>;
pub type SmbusAdapter = Adapter<dyn SmbusIo>;

impl<T: ?Sized> Adapter<T> {
    pub fn new(name: impl Into<String>, io: Arc<T>) -> Self {
        Self {
            name: name.into(),
            io,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn io(&self) -> &T {
        &self.io
    }

    /// Hold for the duration of one bank-select/access/restore sequence
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// True when both values guard the same physical adapter
    pub fn shares_lock_with(&self, other: &Adapter<T>) -> bool {
        Arc::ptr_eq(&self.lock, &other.lock)
    }
}

impl<T: ?Sized> Clone for Adapter<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            io: Arc::clone(&self.io),
            lock: Arc::clone(&self.lock),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Adapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter").field("name", &self.name).finish()
    }
}

/// How one chip instance is reached. Selected once at construction.
#[derive(Debug, Clone)]
pub enum Transport {
    Isa { adapter: IsaAdapter, base: u16 },
    Smbus { adapter: SmbusAdapter, address: u8 },
}

impl Transport {
    pub fn isa(adapter: IsaAdapter, base: u16) -> Self {
        Transport::Isa { adapter, base }
    }

    pub fn smbus(adapter: SmbusAdapter, address: u8) -> Self {
        Transport::Smbus { adapter, address }
    }

    pub fn kind(&self) -> BusKind {
        match self {
            Transport::Isa { .. } => BusKind::Isa,
            Transport::Smbus { .. } => BusKind::Smbus,
        }
    }

    /// Acquire the adapter-wide lock
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        match self {
            Transport::Isa { adapter, .. } => adapter.lock(),
            Transport::Smbus { adapter, .. } => adapter.lock(),
        }
    }

    /// Read one register byte in the currently selected bank.
    ///
    /// On ISA this is an address-port write followed by a data-port read, so
    /// the caller must hold [`Transport::lock`].
    pub fn read_byte(&self, offset: u8) -> Result<u8> {
        match self {
            Transport::Isa { adapter, base } => {
                adapter.io().outb(isa_port(*base, isa::ADDR_REG_OFFSET)?, offset)?;
                adapter.io().inb(isa_port(*base, isa::DATA_REG_OFFSET)?)
            }
            Transport::Smbus { adapter, address } => adapter.io().read_byte_data(*address, offset),
        }
    }

    /// Write one register byte in the currently selected bank
    pub fn write_byte(&self, offset: u8, value: u8) -> Result<()> {
        match self {
            Transport::Isa { adapter, base } => {
                adapter.io().outb(isa_port(*base, isa::ADDR_REG_OFFSET)?, offset)?;
                adapter.io().outb(isa_port(*base, isa::DATA_REG_OFFSET)?, value)
            }
            Transport::Smbus { adapter, address } => {
                adapter.io().write_byte_data(*address, offset, value)
            }
        }
    }
}

/// Absolute port of a chip register port, failing when it falls outside the I/O space
fn isa_port(base: u16, offset: u16) -> Result<u16> {
    base.checked_add(offset).ok_or_else(|| {
        WmError::transport(
            format!("isa@0x{:04x}", base),
            format!("port offset {} is outside the I/O space", offset),
        )
    })
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Isa { adapter, base } => write!(f, "isa:{}@0x{:04x}", adapter.name(), base),
            Transport::Smbus { adapter, address } => {
                write!(f, "smbus:{}@0x{:02x}", adapter.name(), address)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use mockall::Sequence;

    #[test]
    fn test_isa_read_uses_address_then_data_port() {
        let mut io = MockPortIo::new();
        let mut seq = Sequence::new();
        io.expect_outb()
            .with(eq(0x295), eq(0x27))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        io.expect_inb()
            .with(eq(0x296))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(0x2A));

        let adapter: IsaAdapter = Adapter::new("isa", Arc::new(io) as Arc<dyn PortIo>);
        let transport = Transport::isa(adapter, 0x290);
        let _guard = transport.lock();
        assert_eq!(transport.read_byte(0x27).unwrap(), 0x2A);
    }

    #[test]
    fn test_isa_write_stops_after_address_fault() {
        let mut io = MockPortIo::new();
        io.expect_outb()
            .with(eq(0x295), eq(0x40))
            .times(1)
            .returning(|_, _| Err(WmError::transport("port 0x295", "stuck")));
        io.expect_inb().never();

        let adapter: IsaAdapter = Adapter::new("isa", Arc::new(io) as Arc<dyn PortIo>);
        let transport = Transport::isa(adapter, 0x290);
        let err = transport.write_byte(0x40, 0x01).unwrap_err();
        assert!(err.is_transport_fault());
    }

    #[test]
    fn test_isa_base_at_top_of_io_space() {
        let mut io = MockPortIo::new();
        io.expect_outb().never();
        io.expect_inb().never();

        let adapter: IsaAdapter = Adapter::new("isa", Arc::new(io) as Arc<dyn PortIo>);
        let transport = Transport::isa(adapter, 0xFFFC);
        assert!(transport.read_byte(0x4F).unwrap_err().is_transport_fault());
        assert!(transport.write_byte(0x4E, 0).unwrap_err().is_transport_fault());
    }

    #[test]
    fn test_smbus_passes_slave_address() {
        let mut io = MockSmbusIo::new();
        io.expect_write_byte_data()
            .with(eq(0x2d), eq(0x4E), eq(0x00))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let adapter: SmbusAdapter = Adapter::new("i2c-0", Arc::new(io) as Arc<dyn SmbusIo>);
        let transport = Transport::smbus(adapter, 0x2d);
        transport.write_byte(0x4E, 0).unwrap();
        assert_eq!(transport.kind(), BusKind::Smbus);
        assert_eq!(transport.to_string(), "smbus:i2c-0@0x2d");
    }

    #[test]
    fn test_adapter_clones_share_lock() {
        let sim = Arc::new(SimulatedChip::new(crate::variant::ChipVariant::W83781D));
        let a: IsaAdapter = Adapter::new("isa", sim.clone() as Arc<dyn PortIo>);
        let b = a.clone();
        let c: IsaAdapter = Adapter::new("isa", sim as Arc<dyn PortIo>);
        assert!(a.shares_lock_with(&b));
        assert!(!a.shares_lock_with(&c));
    }
}
