//! Converted, serializable view of a whole chip

use serde::{Deserialize, Serialize};

use crate::bus::BusKind;
use crate::chip::{Chip, ChipState};
use crate::error::Result;
use crate::params::Param;
use crate::variant::ChipVariant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamReading {
    pub name: String,
    pub magnitude: u8,
    pub values: Vec<i64>,
}

impl ParamReading {
    /// Values rendered with their implied decimal places
    pub fn formatted(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|v| format_scaled(*v, self.magnitude))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipReadings {
    pub name: String,
    pub variant: ChipVariant,
    pub bus: BusKind,
    pub state: ChipState,
    pub params: Vec<ParamReading>,
}

impl ChipReadings {
    pub fn get(&self, name: &str) -> Option<&ParamReading> {
        self.params.iter().find(|p| p.name == name)
    }
}

impl Chip {
    /// Every parameter converted from a single snapshot
    pub fn readings(&self) -> Result<ChipReadings> {
        let params = Param::all(self);
        let params = self.with_snapshot(|snap| {
            params
                .iter()
                .map(|param| ParamReading {
                    name: param.name(),
                    magnitude: param.info().magnitude,
                    values: param.read_from(self, snap),
                })
                .collect::<Vec<_>>()
        })?;

        Ok(ChipReadings {
            name: self.name().to_string(),
            variant: self.variant(),
            bus: self.bus(),
            state: self.state(),
            params,
        })
    }
}

/// Render `value / 10^magnitude` without going through floating point
pub fn format_scaled(value: i64, magnitude: u8) -> String {
    if magnitude == 0 {
        return value.to_string();
    }
    let scale = 10i64.pow(magnitude as u32);
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    format!(
        "{}{}.{:0width$}",
        sign,
        abs / scale as u64,
        abs % scale as u64,
        width = magnitude as usize
    )
}

/// Parse a decimal string into an integer scaled by `10^magnitude`
pub fn parse_scaled(text: &str, magnitude: u8) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    if frac.len() > magnitude as usize {
        return None;
    }

    let scale = 10i64.checked_pow(magnitude as u32)?;
    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac_value: i64 = if frac.is_empty() {
        0
    } else {
        frac.parse::<i64>().ok()? * 10i64.pow((magnitude as usize - frac.len()) as u32)
    };
    let value = whole.checked_mul(scale)?.checked_add(frac_value)?;
    Some(if negative { -value } else { value })
}
