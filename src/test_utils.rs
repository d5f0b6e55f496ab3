/*
 * Test utilities for w83mon
 *
 * Helpers for building configurations and temporary config files that are
 * shared by the unit tests of the binary crate.
 */

#[cfg(test)]
pub mod test_utils {
    use crate::config::{BusConfig, ChipConfig, MonitorConfig};
    use serde_json::Value;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wm_core::ChipVariant;

    /// Writes `value` as JSON to a temporary file that lives as long as the handle
    pub fn write_config(value: &Value) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(file, "{}", value).expect("Failed to write config");
        file.flush().expect("Failed to flush config");
        file
    }

    /// One simulated chip per `(name, variant)`, variants left to probing
    pub fn simulated_config(chips: &[(&str, ChipVariant)]) -> MonitorConfig {
        MonitorConfig {
            chips: chips
                .iter()
                .map(|(name, variant)| ChipConfig {
                    name: name.to_string(),
                    bus: BusConfig::Simulated { variant: *variant },
                    variant: None,
                    staleness_ms: 1500,
                    reset_limits: true,
                    rt_tables: false,
                })
                .collect(),
        }
    }
}
