//! Raw register <-> physical unit conversions
//!
//! Units: voltages in 10 mV, temperatures in 0.1 degC, fan speeds in RPM.
//! Rounding only happens on the way into a register.

use crate::error::{Result, WmError};
use crate::variant::Calibration;

// ============================================================================
// Voltage
// ============================================================================

/// Pin voltage of an input register
pub fn in_from_reg(raw: u8) -> i64 {
    raw as i64 * 16 / 10
}

/// Highest pin voltage the ADC can report, in 10 mV
const IN_PIN_MAX: i64 = 410;

/// Register value for a pin voltage, saturating at the ends of the ADC range
pub fn in_to_reg(pin: i64) -> u8 {
    let pin = pin.clamp(0, IN_PIN_MAX);
    ((pin * 10 + 8) / 16).min(255) as u8
}

pub fn voltage_from_reg(raw: u8, calibration: Calibration) -> i64 {
    calibration.pin_to_physical(in_from_reg(raw))
}

pub fn voltage_to_reg(physical: i64, calibration: Calibration) -> u8 {
    in_to_reg(calibration.physical_to_pin(physical))
}

// ============================================================================
// Fans
// ============================================================================

const FAN_CLOCK: i64 = 1_350_000;

/// RPM from a count register. 0 means unmeasurable (-1), 255 means stopped.
pub fn fan_from_reg(raw: u8, divisor: i64) -> i64 {
    match raw {
        0 => -1,
        255 => 0,
        count => FAN_CLOCK / (count as i64 * divisor),
    }
}

pub fn fan_to_reg(rpm: i64, divisor: i64) -> u8 {
    if rpm <= 0 {
        return 255;
    }
    // Anything faster counts below one tick at divisor 1
    let rpm = rpm.min(FAN_CLOCK);
    let count = (FAN_CLOCK + rpm * divisor / 2) / (rpm * divisor);
    count.clamp(1, 255) as u8
}

pub fn div_from_reg(code: u8) -> i64 {
    1 << (code & 0x03)
}

/// Divisor code for 1, 2, 4 or 8
pub fn div_to_reg(divisor: i64) -> Result<u8> {
    match divisor {
        1 => Ok(0),
        2 => Ok(1),
        4 => Ok(2),
        8 => Ok(3),
        other => Err(WmError::invalid_config(
            "fan_div",
            format!("unsupported fan divisor {} (must be 1, 2, 4 or 8)", other),
        )),
    }
}

// ============================================================================
// Temperatures
// ============================================================================

/// Primary sensor: signed whole degrees
pub fn temp_from_reg(raw: u8) -> i64 {
    raw as i8 as i64 * 10
}

pub fn temp_to_reg(tenths: i64) -> u8 {
    let tenths = tenths.clamp(i8::MIN as i64 * 10, i8::MAX as i64 * 10);
    let degrees = if tenths < 0 {
        (tenths - 5) / 10
    } else {
        (tenths + 5) / 10
    };
    degrees.clamp(i8::MIN as i64, i8::MAX as i64) as i8 as u8
}

/// Additional sensors: 9-bit two's complement half degrees in bits 15..7
pub fn temp_add_from_reg(raw: u16) -> i64 {
    ((raw as i16) >> 7) as i64 * 5
}

pub fn temp_add_to_reg(tenths: i64) -> u16 {
    // 9-bit field: -128.0 to 127.5 degC
    let tenths = tenths.clamp(-1280, 1275);
    let halves = if tenths < 0 {
        (tenths - 2) / 5
    } else {
        (tenths + 2) / 5
    };
    ((halves.clamp(-256, 255) << 7) as u16) & 0xFF80
}

// ============================================================================
// VID
// ============================================================================

/// Core voltage from the 5-bit VID code, in 10 mV
pub fn vid_from_reg(code: u8) -> i64 {
    let code = (code & 0x1F) as i64;
    match code {
        0x1F => 0,
        c if c >= 0x10 => 510 - c * 10,
        c if c >= 0x06 => 0,
        c => 205 - c * 5,
    }
}
