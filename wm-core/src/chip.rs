//! One monitored chip instance
//!
//! Owns the variant description, the transport, the lifecycle state and the
//! snapshot cache. The snapshot lock is held for a whole refresh, a whole
//! initialization or one field update; register sequences inside take the
//! adapter lock, always in that order. State checks that gate bus access are
//! made under the snapshot lock, the same lock `detach` holds.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::access::{read_byte, read_value, reset_bank, write_value};
use crate::bus::{BusKind, Transport};
use crate::clock::Clock;
use crate::constants::{config_bits, ids, limits, regs, rt, sensor, timing};
use crate::convert::{fan_to_reg, temp_add_to_reg, temp_to_reg, vid_from_reg, voltage_to_reg};
use crate::error::{Result, WmError};
use crate::snapshot::Snapshot;
use crate::variant::{ChipVariant, Nominal, VariantModel};

/// Lifecycle of a chip instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipState {
    /// Constructed, registers untouched
    Detected,
    /// Limits written and monitoring started
    Initialized,
    /// Serving reads and writes
    Active,
    /// Released, no further access
    Detached,
}

impl fmt::Display for ChipState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChipState::Detected => "detected",
            ChipState::Initialized => "initialized",
            ChipState::Active => "active",
            ChipState::Detached => "detached",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipOptions {
    /// Maximum snapshot age
    pub staleness: Duration,
    /// Write power-on default limits during initialization
    pub reset_limits: bool,
    /// Read the RT calibration tables during initialization (W83781D only)
    pub rt_tables: bool,
}

impl Default for ChipOptions {
    fn default() -> Self {
        Self {
            staleness: timing::STALENESS_WINDOW,
            reset_limits: true,
            rt_tables: false,
        }
    }
}

/// Probe the chip behind `transport` and report which variant it is.
///
/// Returns the bank select to 0 first, since a chip can be stuck in another bank.
pub fn identify(transport: &Transport) -> Result<ChipVariant> {
    reset_bank(transport)?;

    let vendor = read_byte(transport, regs::CHIPMAN)?;
    if vendor != ids::WINBOND_VENDOR {
        debug!("{}: vendor byte 0x{:02x}, not a Winbond chip", transport, vendor);
        return Err(WmError::ChipNotFound(transport.to_string()));
    }

    let wchipid = read_byte(transport, regs::WCHIPID)?;
    let variant = ChipVariant::from_wchipid(wchipid).ok_or_else(|| {
        debug!("{}: unknown chip id 0x{:02x}", transport, wchipid);
        WmError::ChipNotFound(transport.to_string())
    })?;

    if transport.kind() == BusKind::Isa && !variant.model().isa_capable {
        return Err(WmError::invalid_config(
            "bus",
            format!("{} reports as {}, which has no ISA interface", transport, variant),
        ));
    }

    info!("Identified {} at {}", variant, transport);
    Ok(variant)
}

pub struct Chip {
    name: String,
    variant: ChipVariant,
    model: &'static VariantModel,
    transport: Transport,
    options: ChipOptions,
    clock: Arc<dyn Clock>,
    state: Mutex<ChipState>,
    snapshot: Mutex<Snapshot>,
}

impl Chip {
    pub fn new(
        name: impl Into<String>,
        variant: ChipVariant,
        transport: Transport,
        options: ChipOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let name = name.into();
        let model = variant.model();

        if transport.kind() == BusKind::Isa && !model.isa_capable {
            return Err(WmError::invalid_config(
                "bus",
                format!("{} is only reachable over SMBus", variant),
            ));
        }
        if options.rt_tables && !model.rt_tables {
            return Err(WmError::invalid_config(
                "rt_tables",
                format!("{} has no RT calibration tables", variant),
            ));
        }
        if options.staleness.is_zero() {
            return Err(WmError::invalid_config("staleness", "must be greater than zero"));
        }

        debug!("Created {} '{}' on {}", variant, name, transport);
        Ok(Self {
            name,
            variant,
            model,
            transport,
            options,
            clock,
            state: Mutex::new(ChipState::Detected),
            snapshot: Mutex::new(Snapshot::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self) -> ChipVariant {
        self.variant
    }

    pub fn model(&self) -> &'static VariantModel {
        self.model
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn bus(&self) -> BusKind {
        self.transport.kind()
    }

    pub fn options(&self) -> &ChipOptions {
        &self.options
    }

    pub fn state(&self) -> ChipState {
        *self.state.lock()
    }

    fn require(&self, required: ChipState) -> Result<()> {
        let state = self.state();
        if state != required {
            return Err(WmError::InvalidState {
                chip: self.name.clone(),
                state: state.to_string(),
                required: required.to_string(),
            });
        }
        Ok(())
    }

    fn transition(&self, from: ChipState, to: ChipState) -> Result<()> {
        let mut state = self.state.lock();
        if *state != from {
            return Err(WmError::InvalidState {
                chip: self.name.clone(),
                state: state.to_string(),
                required: from.to_string(),
            });
        }
        *state = to;
        debug!("{}: {} -> {}", self.name, from, to);
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Reset the chip, write power-on limits and start monitoring.
    ///
    /// A transport fault leaves the chip in `Detected`.
    pub fn initialize(&self) -> Result<()> {
        let mut snap = self.snapshot.lock();
        self.require(ChipState::Detected)?;

        if let Err(e) = self.init_registers(&mut snap) {
            warn!("{}: initialization failed: {}", self.name, e);
            snap.invalidate();
            return Err(e);
        }

        self.transition(ChipState::Detected, ChipState::Initialized)?;
        info!("{}: {} initialized on {}", self.name, self.variant, self.transport);
        Ok(())
    }

    /// Start serving reads and writes
    pub fn activate(&self) -> Result<()> {
        self.transition(ChipState::Initialized, ChipState::Active)
    }

    /// Release the chip. Every later access fails.
    pub fn detach(&self) {
        let mut snap = self.snapshot.lock();
        snap.invalidate();
        let mut state = self.state.lock();
        if *state != ChipState::Detached {
            info!("{}: detached from {}", self.name, self.transport);
        }
        *state = ChipState::Detached;
    }

    fn init_registers(&self, snap: &mut Snapshot) -> Result<()> {
        let bus = &self.transport;

        // Resets everything except watchdog and last conversion values,
        // including all fan divisors to 2
        write_value(bus, regs::CONFIG, config_bits::INIT as u16)?;

        let vid_code = self.read_vid_code()?;
        let vid = vid_from_reg(vid_code);
        debug!("{}: VID code 0x{:02x} = {}", self.name, vid_code, vid);

        self.read_sensor_types(snap)?;

        if self.options.rt_tables {
            self.read_rt_tables(snap)?;
        }

        if self.options.reset_limits {
            self.write_default_limits(vid)?;
        }

        // Start monitoring
        let config = read_byte(bus, regs::CONFIG)?;
        write_value(
            bus,
            regs::CONFIG,
            ((config & !config_bits::INT_CLEAR) | config_bits::START) as u16,
        )?;
        Ok(())
    }

    fn read_vid_code(&self) -> Result<u8> {
        let low = read_byte(&self.transport, regs::VID_FANDIV)? & 0x0F;
        let high = read_byte(&self.transport, regs::CHIPID)? & 0x01;
        Ok(low | (high << 4))
    }

    fn read_sensor_types(&self, snap: &mut Snapshot) -> Result<()> {
        if self.model.sensor_types == 0 {
            return Ok(());
        }
        let scfg1 = read_byte(&self.transport, regs::SCFG1)?;
        let scfg2 = read_byte(&self.transport, regs::SCFG2)?;
        for n in 0..self.model.sensor_types {
            snap.sensor_types[n] = if scfg1 & regs::SCFG1_BITS[n] == 0 {
                sensor::DEFAULT_BETA
            } else if scfg2 & regs::SCFG2_BITS[n] != 0 {
                sensor::PENTIUM_II_DIODE
            } else {
                sensor::TRANSISTOR_3904
            };
        }
        Ok(())
    }

    fn read_rt_tables(&self, snap: &mut Snapshot) -> Result<()> {
        // The index does not auto-increment, so every entry is addressed explicitly
        let mut index: u16 = 0;
        for table in snap.rt.iter_mut() {
            for entry in table.iter_mut() {
                write_value(&self.transport, regs::RT_IDX, index)?;
                *entry = read_byte(&self.transport, regs::RT_VAL)?;
                index += 1;
            }
        }
        debug!("{}: read {} RT table entries", self.name, rt::TABLES * rt::TABLE_LEN);
        Ok(())
    }

    fn write_default_limits(&self, vid: i64) -> Result<()> {
        let bus = &self.transport;

        for ch in self.model.voltages {
            let nominal = match ch.nominal {
                Nominal::Vid if vid == limits::VID_SUSPICIOUS => limits::VID_FALLBACK,
                Nominal::Vid => vid,
                Nominal::Fixed(value) => value,
            };
            let delta = nominal.abs() * limits::IN_PERCENTAGE / 100;
            let a = voltage_to_reg(nominal - delta, ch.calibration);
            let b = voltage_to_reg(nominal + delta, ch.calibration);
            write_value(bus, ch.min, a.min(b) as u16)?;
            write_value(bus, ch.max, a.max(b) as u16)?;
        }

        let fan_min = fan_to_reg(limits::FAN_MIN_RPM, limits::FAN_MIN_DIVISOR);
        for reg in regs::FAN_MIN.iter().take(self.model.fans) {
            write_value(bus, *reg, fan_min as u16)?;
        }

        write_value(bus, regs::TEMP_OVER, temp_to_reg(limits::TEMP_OVER) as u16)?;
        write_value(bus, regs::TEMP_HYST, temp_to_reg(limits::TEMP_HYST) as u16)?;
        write_value(bus, regs::TEMP_CONFIG, 0)?;

        for extra in self.model.extra_temps {
            write_value(bus, extra.over, temp_add_to_reg(limits::TEMP_OVER))?;
            write_value(bus, extra.hyst, temp_add_to_reg(limits::TEMP_HYST))?;
            write_value(bus, extra.config, 0)?;
        }
        Ok(())
    }

    // ========================================================================
    // Snapshot cache
    // ========================================================================

    /// Refresh the snapshot if it is stale
    pub fn refresh_if_stale(&self) -> Result<()> {
        self.with_snapshot(|_| ())
    }

    /// Copy of the current snapshot, refreshed if stale
    pub fn snapshot(&self) -> Result<Snapshot> {
        self.with_snapshot(Snapshot::clone)
    }

    /// Run `f` against a fresh snapshot while holding the snapshot lock
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> Result<R> {
        let mut snap = self.snapshot.lock();
        self.require(ChipState::Active)?;
        self.refresh_locked(&mut snap, false)?;
        Ok(f(&snap))
    }

    /// Update snapshot fields and the matching registers while holding the
    /// snapshot lock. With `needs_snapshot` an invalid snapshot is refilled
    /// first, for writes whose conversion depends on other cached fields.
    /// A transport fault invalidates the snapshot.
    pub(crate) fn update<R>(
        &self,
        needs_snapshot: bool,
        f: impl FnOnce(&mut Snapshot, &Transport) -> Result<R>,
    ) -> Result<R> {
        let mut snap = self.snapshot.lock();
        self.require(ChipState::Active)?;
        if needs_snapshot && !snap.valid {
            self.refresh_locked(&mut snap, true)?;
        }
        let result = f(&mut snap, &self.transport);
        if let Err(e) = &result {
            if e.is_transport_fault() {
                warn!("{}: write failed, dropping cached state: {}", self.name, e);
                snap.invalidate();
            }
        }
        result
    }

    /// Refresh regardless of age
    pub fn force_refresh(&self) -> Result<()> {
        let mut snap = self.snapshot.lock();
        self.require(ChipState::Active)?;
        self.refresh_locked(&mut snap, true)
    }

    fn refresh_locked(&self, snap: &mut Snapshot, force: bool) -> Result<()> {
        let now = self.clock.now();
        if !force && !snap.is_stale(now, self.options.staleness) {
            return Ok(());
        }

        debug!("{}: refreshing snapshot", self.name);
        match self.read_all(snap) {
            Ok(()) => {
                snap.mark_fresh(now);
                Ok(())
            }
            Err(e) => {
                warn!("{}: refresh failed: {}", self.name, e);
                snap.invalidate();
                Err(e)
            }
        }
    }

    fn read_all(&self, snap: &mut Snapshot) -> Result<()> {
        let bus = &self.transport;

        for ch in self.model.voltages {
            snap.in_value[ch.index] = read_byte(bus, ch.input)?;
            snap.in_min[ch.index] = read_byte(bus, ch.min)?;
            snap.in_max[ch.index] = read_byte(bus, ch.max)?;
        }

        for n in 0..self.model.fans {
            snap.fan[n] = read_byte(bus, regs::FAN[n])?;
            snap.fan_min[n] = read_byte(bus, regs::FAN_MIN[n])?;
        }

        for n in 0..self.model.pwm_count(self.bus()) {
            snap.pwm[n] = read_byte(bus, regs::PWM[n])?;
        }

        snap.temp = read_byte(bus, regs::TEMP)?;
        snap.temp_over = read_byte(bus, regs::TEMP_OVER)?;
        snap.temp_hyst = read_byte(bus, regs::TEMP_HYST)?;
        for (n, extra) in self.model.extra_temps.iter().enumerate() {
            snap.temp_add[n] = read_value(bus, extra.value)?;
            snap.temp_add_over[n] = read_value(bus, extra.over)?;
            snap.temp_add_hyst[n] = read_value(bus, extra.hyst)?;
        }

        let vid_fandiv = read_byte(bus, regs::VID_FANDIV)?;
        let chipid = read_byte(bus, regs::CHIPID)?;
        snap.vid = (vid_fandiv & 0x0F) | ((chipid & 0x01) << 4);
        snap.fan_div[0] = (vid_fandiv >> 4) & 0x03;
        snap.fan_div[1] = (vid_fandiv >> 6) & 0x03;
        snap.fan_div[2] = (read_byte(bus, regs::PIN)? >> 6) & 0x03;

        let mut alarms = read_byte(bus, regs::ALARM1)? as u32;
        alarms |= (read_byte(bus, regs::ALARM2)? as u32) << 8;
        if self.model.alarm3 {
            alarms |= (read_byte(bus, regs::ALARM3)? as u32) << 16;
        }
        snap.alarms = alarms;

        let ints2 = read_byte(bus, regs::BEEP_INTS2)?;
        let ints1 = read_byte(bus, regs::BEEP_INTS1)?;
        snap.beep_enable = ints2 & 0x80 != 0;
        snap.beeps = (((ints2 & 0x7F) as u16) << 8) | ints1 as u16;

        self.read_sensor_types(snap)?;
        Ok(())
    }
}

impl fmt::Debug for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chip")
            .field("name", &self.name)
            .field("variant", &self.variant)
            .field("transport", &self.transport.to_string())
            .field("state", &self.state())
            .finish()
    }
}
