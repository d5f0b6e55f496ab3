//! Shared fixtures for unit tests
//!
//! Builds chips on top of [`SimulatedChip`] with a hand-driven clock so tests
//! can count bus accesses and move time around.

use std::sync::Arc;
use std::time::Duration;

use crate::bus::{Adapter, IsaAdapter, PortIo, SimulatedChip, SmbusAdapter, SmbusIo, Transport};
use crate::chip::{Chip, ChipOptions};
use crate::clock::ManualClock;
use crate::variant::ChipVariant;

pub struct SimFixture {
    pub sim: Arc<SimulatedChip>,
    pub clock: Arc<ManualClock>,
    pub chip: Chip,
}

pub fn smbus_transport(sim: &Arc<SimulatedChip>) -> Transport {
    let adapter: SmbusAdapter = Adapter::new("sim", sim.clone() as Arc<dyn SmbusIo>);
    Transport::smbus(adapter, 0x2d)
}

pub fn isa_transport(sim: &Arc<SimulatedChip>) -> Transport {
    let adapter: IsaAdapter = Adapter::new("sim", sim.clone() as Arc<dyn PortIo>);
    Transport::isa(adapter, 0x290)
}

/// Chip in `Detected` state on a simulated SMBus slave
pub fn detected(variant: ChipVariant, options: ChipOptions) -> SimFixture {
    let sim = Arc::new(SimulatedChip::new(variant));
    let clock = Arc::new(ManualClock::new(Duration::from_secs(100)));
    let chip = Chip::new("test", variant, smbus_transport(&sim), options, clock.clone())
        .expect("valid chip options");
    SimFixture { sim, clock, chip }
}

/// Chip in `Active` state with an empty access log
pub fn active(variant: ChipVariant) -> SimFixture {
    active_with(variant, ChipOptions::default())
}

pub fn active_with(variant: ChipVariant, options: ChipOptions) -> SimFixture {
    let fixture = detected(variant, options);
    fixture.chip.initialize().expect("initialize");
    fixture.chip.activate().expect("activate");
    fixture.sim.clear_ops();
    fixture
}

/// Same as [`active`], but reached over the port-mapped transport
pub fn active_isa(variant: ChipVariant) -> SimFixture {
    let sim = Arc::new(SimulatedChip::new(variant));
    let clock = Arc::new(ManualClock::new(Duration::from_secs(100)));
    let chip = Chip::new("test", variant, isa_transport(&sim), ChipOptions::default(), clock.clone())
        .expect("valid chip options");
    chip.initialize().expect("initialize");
    chip.activate().expect("activate");
    sim.clear_ops();
    SimFixture { sim, clock, chip }
}
