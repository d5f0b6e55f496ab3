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

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wm_core::constants::{smbus, timing};
use wm_core::{ChipOptions, ChipVariant};
use wm_error::{Result, WmError};

const DEFAULT_CONFIG_PATH: &str = "/etc/w83mon/config.json";

/// Lowest and highest base address accepted for port-mapped chips
const ISA_BASE_MIN: u16 = 0x100;
const ISA_BASE_MAX: u16 = 0xFFF8;

/// Where a chip is reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BusConfig {
    /// Port-mapped, through /dev/port
    Isa { base: u16 },
    /// i2c-dev bus number and 7-bit slave address
    Smbus { bus: u32, address: u8 },
    /// In-memory chip, for dry runs
    Simulated { variant: ChipVariant },
}

impl BusConfig {
    pub fn is_hardware(&self) -> bool {
        !matches!(self, BusConfig::Simulated { .. })
    }
}

fn default_staleness_ms() -> u64 { timing::STALENESS_WINDOW_MS }
fn default_reset_limits() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChipConfig {
    pub name: String,
    pub bus: BusConfig,
    /// Probed from the chip when absent
    #[serde(default)]
    pub variant: Option<ChipVariant>,
    #[serde(default = "default_staleness_ms")]
    pub staleness_ms: u64,
    /// Write power-on default limits when attaching
    #[serde(default = "default_reset_limits")]
    pub reset_limits: bool,
    /// Read the W83781D RT calibration tables when attaching
    #[serde(default)]
    pub rt_tables: bool,
}

impl ChipConfig {
    /// Variant known without touching hardware
    pub fn known_variant(&self) -> Option<ChipVariant> {
        match (&self.bus, self.variant) {
            (_, Some(v)) => Some(v),
            (BusConfig::Simulated { variant }, None) => Some(*variant),
            _ => None,
        }
    }

    pub fn options(&self) -> ChipOptions {
        ChipOptions {
            staleness: Duration::from_millis(self.staleness_ms),
            reset_limits: self.reset_limits,
            rt_tables: self.rt_tables,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    pub chips: Vec<ChipConfig>,
}

/// Config file location: `W83MON_CONFIG` if set, otherwise the system path
pub fn config_path() -> PathBuf {
    if let Ok(path) = env::var("W83MON_CONFIG") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

pub fn load_config(path: &Path) -> Result<MonitorConfig> {
    let data = fs::read_to_string(path).map_err(|source| WmError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: MonitorConfig = serde_json::from_str(&data)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn validate_config(cfg: &MonitorConfig) -> Result<()> {
    let mut names = HashSet::new();

    for chip in &cfg.chips {
        if chip.name.trim().is_empty() {
            return Err(WmError::config("chip name must not be empty"));
        }
        if !names.insert(chip.name.as_str()) {
            return Err(WmError::config(format!("duplicate chip name '{}'", chip.name)));
        }
        if chip.staleness_ms == 0 {
            return Err(WmError::config(format!("{}: staleness_ms must be greater than zero", chip.name)));
        }

        match &chip.bus {
            BusConfig::Isa { base } => {
                if !(ISA_BASE_MIN..=ISA_BASE_MAX).contains(base) {
                    return Err(WmError::config(format!(
                        "{}: ISA base 0x{:x} outside 0x{:x}..=0x{:x}",
                        chip.name, base, ISA_BASE_MIN, ISA_BASE_MAX
                    )));
                }
                if chip.variant == Some(ChipVariant::W83783S) {
                    return Err(WmError::config(format!(
                        "{}: w83783s has no ISA interface",
                        chip.name
                    )));
                }
            }
            BusConfig::Smbus { address, .. } => {
                if !(smbus::VALID_FIRST..=smbus::VALID_LAST).contains(address) {
                    return Err(WmError::config(format!(
                        "{}: SMBus address 0x{:02x} outside 0x{:02x}..=0x{:02x}",
                        chip.name, address, smbus::VALID_FIRST, smbus::VALID_LAST
                    )));
                }
            }
            BusConfig::Simulated { variant } => {
                if let Some(declared) = chip.variant {
                    if declared != *variant {
                        return Err(WmError::config(format!(
                            "{}: variant {} does not match simulated {}",
                            chip.name, declared, variant
                        )));
                    }
                }
            }
        }

        if chip.rt_tables {
            if let Some(variant) = chip.known_variant() {
                if !variant.model().rt_tables {
                    return Err(WmError::config(format!(
                        "{}: rt_tables is only available on w83781d",
                        chip.name
                    )));
                }
            }
        }
    }
    Ok(())
}
