/*
 * This file is part of w83mon.
 *
 * Copyright (C) 2025 w83mon contributors
 *
 * w83mon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * w83mon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with w83mon. If not, see <https://www.gnu.org/licenses/>.
 */

//! Chips attached from a configuration file
//!
//! Adapters are shared between chips on the same physical bus: one for
//! `/dev/port` and one per i2c bus number, so bank switching on one chip is
//! serialized against every other chip on that bus.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use wm_core::constants::paths;
use wm_core::{
    identify, Adapter, Chip, ChipReadings, ChipRegistry, Clock, DevPort, I2cDev, IsaAdapter, Param,
    ParamInfo, PortIo, SimulatedChip, SmbusAdapter, SmbusIo, SystemClock, Transport,
};
use wm_error::{Result, WmError};

use crate::config::{BusConfig, ChipConfig, MonitorConfig};

/// Parameter description for listing
#[derive(Debug, Clone, Serialize)]
pub struct ParamListing {
    pub name: String,
    pub magnitude: u8,
    pub read_values: usize,
    pub write_values: usize,
}

impl ParamListing {
    fn new(param: Param) -> Self {
        let ParamInfo { magnitude, read_values, write_values } = param.info();
        Self {
            name: param.name(),
            magnitude,
            read_values,
            write_values,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChipListing {
    pub name: String,
    pub variant: String,
    pub params: Vec<ParamListing>,
}

#[derive(Default)]
struct Adapters {
    port: Option<IsaAdapter>,
    i2c: HashMap<u32, SmbusAdapter>,
}

pub struct Monitor {
    registry: ChipRegistry,
    simulated: HashMap<String, Arc<SimulatedChip>>,
    failures: Vec<(String, String)>,
}

impl Monitor {
    pub fn from_config(cfg: &MonitorConfig) -> Result<Self> {
        Self::with_clock(cfg, Arc::new(SystemClock::new()))
    }

    /// Attach every configured chip. Chips that fail to attach are skipped and
    /// reported through [`Monitor::failures`]; adapter open errors are fatal.
    pub fn with_clock(cfg: &MonitorConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut adapters = Adapters::default();
        let mut monitor = Monitor {
            registry: ChipRegistry::new(),
            simulated: HashMap::new(),
            failures: Vec::new(),
        };

        for chip_cfg in &cfg.chips {
            let transport = monitor.transport_for(chip_cfg, &mut adapters)?;
            if let Err(e) = monitor.attach(chip_cfg, transport, clock.clone()) {
                warn!("{}: skipped: {}", chip_cfg.name, e);
                monitor.failures.push((chip_cfg.name.clone(), e.to_string()));
            }
        }

        info!(
            "Attached {} of {} configured chips",
            monitor.registry.len(),
            cfg.chips.len()
        );
        Ok(monitor)
    }

    fn transport_for(&mut self, chip: &ChipConfig, adapters: &mut Adapters) -> Result<Transport> {
        match &chip.bus {
            BusConfig::Isa { base } => {
                let adapter = match &adapters.port {
                    Some(adapter) => adapter.clone(),
                    None => {
                        let port = Arc::new(DevPort::open()?);
                        let adapter: IsaAdapter = Adapter::new(paths::DEV_PORT, port as Arc<dyn PortIo>);
                        adapters.port = Some(adapter.clone());
                        adapter
                    }
                };
                Ok(Transport::isa(adapter, *base))
            }
            BusConfig::Smbus { bus, address } => {
                let adapter = match adapters.i2c.get(bus) {
                    Some(adapter) => adapter.clone(),
                    None => {
                        let dev = Arc::new(I2cDev::open(*bus)?);
                        let adapter: SmbusAdapter = Adapter::new(
                            format!("{}{}", paths::I2C_DEV_PREFIX, bus),
                            dev as Arc<dyn SmbusIo>,
                        );
                        adapters.i2c.insert(*bus, adapter.clone());
                        adapter
                    }
                };
                Ok(Transport::smbus(adapter, *address))
            }
            BusConfig::Simulated { variant } => {
                let sim = Arc::new(SimulatedChip::new(*variant));
                self.simulated.insert(chip.name.clone(), sim.clone());
                let adapter: SmbusAdapter = Adapter::new(format!("sim:{}", chip.name), sim as Arc<dyn SmbusIo>);
                Ok(Transport::smbus(adapter, 0x2d))
            }
        }
    }

    fn attach(&self, chip_cfg: &ChipConfig, transport: Transport, clock: Arc<dyn Clock>) -> Result<()> {
        let variant = match chip_cfg.variant {
            Some(variant) => variant,
            None => identify(&transport)?,
        };
        let chip = Chip::new(chip_cfg.name.clone(), variant, transport, chip_cfg.options(), clock)?;
        self.registry.attach(chip)?;
        Ok(())
    }

    pub fn registry(&self) -> &ChipRegistry {
        &self.registry
    }

    /// Chips that were configured but could not be attached, with the reason
    pub fn failures(&self) -> &[(String, String)] {
        &self.failures
    }

    /// Backing register file of a `simulated` chip
    pub fn simulated(&self, name: &str) -> Option<Arc<SimulatedChip>> {
        self.simulated.get(name).cloned()
    }

    pub fn chip(&self, name: &str) -> Result<Arc<Chip>> {
        self.registry
            .find(name)
            .map(|(_, chip)| chip)
            .ok_or_else(|| WmError::ChipNotFound(name.to_string()))
    }

    pub fn read_all(&self) -> Result<Vec<ChipReadings>> {
        self.registry.chips().iter().map(|chip| chip.readings()).collect()
    }

    pub fn read(&self, chip: &str, param: &str) -> Result<Vec<i64>> {
        let param: Param = param.parse()?;
        let chip = self.chip(chip)?;
        param.read(&chip)
    }

    pub fn write(&self, chip: &str, param: &str, values: &[i64]) -> Result<()> {
        let param: Param = param.parse()?;
        let chip = self.chip(chip)?;
        param.write(&chip, values)
    }

    pub fn list_params(&self) -> Vec<ChipListing> {
        self.registry
            .chips()
            .iter()
            .map(|chip| ChipListing {
                name: chip.name().to_string(),
                variant: chip.variant().to_string(),
                params: Param::all(chip).into_iter().map(ParamListing::new).collect(),
            })
            .collect()
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.registry.detach_all();
    }
}
