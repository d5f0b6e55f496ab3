//! Constants and register map for the W83781D family
//!
//! Centralizes all register offsets, chip identifiers and power-on defaults.
//! Offsets above 0xFF carry the bank number in the high byte.

use std::time::Duration;

/// Device nodes used by the hardware backends
pub mod paths {
    /// Byte-addressed view of the I/O port space
    pub const DEV_PORT: &str = "/dev/port";

    /// Prefix of the i2c-dev character devices
    pub const I2C_DEV_PREFIX: &str = "/dev/i2c-";
}

/// Register offsets
pub mod regs {
    /// Bank select register, always reachable from any bank
    pub const BANK_SELECT: u8 = 0x4E;

    pub const CONFIG: u16 = 0x40;
    pub const ALARM1: u16 = 0x41;
    pub const ALARM2: u16 = 0x42;
    /// W83782D only
    pub const ALARM3: u16 = 0x450;
    pub const VID_FANDIV: u16 = 0x47;
    pub const CHIPID: u16 = 0x49;
    pub const PIN: u16 = 0x4B;
    pub const CHIPMAN: u16 = 0x4F;
    pub const BEEP_INTS1: u16 = 0x56;
    pub const BEEP_INTS2: u16 = 0x57;
    pub const WCHIPID: u16 = 0x58;

    pub const FAN: [u16; 3] = [0x28, 0x29, 0x2A];
    pub const FAN_MIN: [u16; 3] = [0x3B, 0x3C, 0x3D];

    pub const TEMP: u16 = 0x27;
    pub const TEMP_OVER: u16 = 0x39;
    pub const TEMP_HYST: u16 = 0x3A;
    pub const TEMP_CONFIG: u16 = 0x52;

    pub const TEMP2: u16 = 0x150;
    pub const TEMP2_CONFIG: u16 = 0x152;
    pub const TEMP2_HYST: u16 = 0x153;
    pub const TEMP2_OVER: u16 = 0x155;

    pub const TEMP3: u16 = 0x250;
    pub const TEMP3_CONFIG: u16 = 0x252;
    pub const TEMP3_HYST: u16 = 0x253;
    pub const TEMP3_OVER: u16 = 0x255;

    /// The W83782D and W83783S datasheets disagree on PWM1/PWM2; these follow the W83782D.
    pub const PWM: [u16; 4] = [0x5B, 0x5A, 0x5E, 0x5F];

    pub const SCFG1: u16 = 0x5D;
    pub const SCFG2: u16 = 0x59;
    pub const SCFG1_BITS: [u8; 3] = [0x02, 0x04, 0x08];
    pub const SCFG2_BITS: [u8; 3] = [0x10, 0x04, 0x08];

    pub const RT_IDX: u16 = 0x50;
    pub const RT_VAL: u16 = 0x51;

    /// Voltage input register
    pub const fn input(nr: usize) -> u16 {
        if nr < 7 {
            0x20 + nr as u16
        } else {
            0x550 + (nr as u16 - 7)
        }
    }

    /// Voltage high limit register
    pub const fn input_max(nr: usize) -> u16 {
        if nr < 7 {
            0x2B + nr as u16 * 2
        } else {
            0x554 + (nr as u16 - 7) * 2
        }
    }

    /// Voltage low limit register
    pub const fn input_min(nr: usize) -> u16 {
        if nr < 7 {
            0x2C + nr as u16 * 2
        } else {
            0x555 + (nr as u16 - 7) * 2
        }
    }
}

/// Chip identification values
pub mod ids {
    /// Expected content of CHIPMAN (Winbond)
    pub const WINBOND_VENDOR: u8 = 0xA3;

    /// WCHIPID values with the unreliable low bit masked off
    pub const WCHIPID_MASK: u8 = 0xFE;
    pub const W83781D: u8 = 0x10;
    pub const W83782D: u8 = 0x30;
    pub const W83783S: u8 = 0x40;
}

/// ISA port layout relative to the chip's base address
pub mod isa {
    pub const ADDR_REG_OFFSET: u16 = 5;
    pub const DATA_REG_OFFSET: u16 = 6;
    /// Number of ports the chip decodes
    pub const EXTENT: u16 = 8;
    /// Conventional base address on most boards
    pub const DEFAULT_BASE: u16 = 0x290;
}

/// Serial bus addressing
pub mod smbus {
    /// Valid 7-bit slave addresses
    pub const VALID_FIRST: u8 = 0x08;
    pub const VALID_LAST: u8 = 0x77;
}

/// Sensor type codes accepted by the diode/thermistor selection registers
pub mod sensor {
    pub const PENTIUM_II_DIODE: u16 = 1;
    pub const TRANSISTOR_3904: u16 = 2;
    /// Thermistor with the default beta
    pub const DEFAULT_BETA: u16 = 3435;
}

/// Configuration register bits
pub mod config_bits {
    /// Reset everything except watchdog and last conversion values
    pub const INIT: u8 = 0x80;
    pub const START: u8 = 0x01;
    pub const INT_CLEAR: u8 = 0x08;
}

/// Timing constants for the snapshot cache
pub mod timing {
    use super::*;

    /// Maximum snapshot age before a read forces a full refresh
    pub const STALENESS_WINDOW: Duration = Duration::from_millis(1500);

    /// Same value in milliseconds, for configuration defaults
    pub const STALENESS_WINDOW_MS: u64 = 1500;
}

/// Power-on limits written by initialization
pub mod limits {
    /// Voltage limits are nominal +/- this percentage
    pub const IN_PERCENTAGE: i64 = 10;

    /// VID reading that is replaced by `VID_FALLBACK` for the core rails
    pub const VID_SUSPICIOUS: i64 = 350;
    pub const VID_FALLBACK: i64 = 280;

    /// Fan minimum in RPM, written at divisor 2
    pub const FAN_MIN_RPM: i64 = 3000;
    pub const FAN_MIN_DIVISOR: i64 = 2;

    /// Temperature limits in tenths of a degree
    pub const TEMP_OVER: i64 = 600;
    pub const TEMP_HYST: i64 = 500;
}

/// Calibration table dimensions
pub mod rt {
    pub const TABLES: usize = 3;
    pub const TABLE_LEN: usize = 32;
}
