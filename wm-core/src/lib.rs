//! w83mon Core Library
//!
//! Register access and calibration engine for the Winbond W83781D family of
//! hardware monitors (W83781D, W83782D, W83783S).
//!
//! # Features
//!
//! - **Transports**: port-mapped ISA access through `/dev/port` and SMBus access through i2c-dev
//! - **Bank switching**: word and banked registers addressed through one protocol
//! - **Variants**: per-chip channel sets and calibration as data tables
//! - **Snapshot cache**: at most one bulk read per staleness window
//! - **Parameters**: converted reads and validated writes per sensor group
//!
//! # Module Structure
//!
//! - `bus/` - Byte transports and backends (hardware and simulated)
//! - `access` - Bank-select addressing protocol
//! - `variant`, `convert` - Register map and raw/physical conversions
//! - `chip`, `snapshot`, `params` - Chip lifecycle, cache and parameter contract
//! - `registry` - Attached chip instances
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wm_core::{Adapter, Chip, ChipOptions, ChipRegistry, Param, SimulatedChip, SmbusIo, SystemClock, Transport};
//!
//! let sim = Arc::new(SimulatedChip::new(wm_core::ChipVariant::W83782D));
//! let transport = Transport::smbus(Adapter::new("sim", sim as Arc<dyn SmbusIo>), 0x2d);
//! let variant = wm_core::identify(&transport).unwrap();
//! let chip = Chip::new("mb", variant, transport, ChipOptions::default(), Arc::new(SystemClock::new())).unwrap();
//!
//! let registry = ChipRegistry::new();
//! let handle = registry.attach(chip).unwrap();
//! let temp = Param::Temperature(0).read(&registry.get(handle).unwrap()).unwrap();
//! ```

pub mod access;
pub mod bus;
pub mod chip;
pub mod clock;
pub mod constants;
pub mod convert;
pub mod error;
pub mod params;
pub mod readings;
pub mod register;
pub mod registry;
pub mod snapshot;
pub mod variant;

#[cfg(test)]
pub(crate) mod test_utils;

pub use bus::{
    Adapter, BusKind, BusOp, DevPort, I2cDev, IsaAdapter, PortIo, SimulatedChip, SmbusAdapter,
    SmbusIo, Transport,
};
pub use chip::{identify, Chip, ChipOptions, ChipState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, WmError};
pub use params::{Param, ParamInfo};
pub use readings::{format_scaled, parse_scaled, ChipReadings, ParamReading};
pub use register::RegisterAddress;
pub use registry::{ChipHandle, ChipRegistry};
pub use snapshot::Snapshot;
pub use variant::{Calibration, ChipVariant, VariantModel};
