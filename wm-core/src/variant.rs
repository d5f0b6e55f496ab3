//! Per-variant chip description
//!
//! Channel sets, register addresses and calibration constants for each member
//! of the family. Variant differences are data here; the rest of the crate
//! only consults these tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::bus::BusKind;
use crate::constants::{ids, regs};
use crate::error::WmError;
use crate::register::RegisterAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipVariant {
    W83781D,
    W83782D,
    W83783S,
}

impl ChipVariant {
    pub const ALL: [ChipVariant; 3] = [ChipVariant::W83781D, ChipVariant::W83782D, ChipVariant::W83783S];

    pub fn name(self) -> &'static str {
        match self {
            ChipVariant::W83781D => "w83781d",
            ChipVariant::W83782D => "w83782d",
            ChipVariant::W83783S => "w83783s",
        }
    }

    /// WCHIPID register value with the low bit masked off
    pub fn wchipid(self) -> u8 {
        match self {
            ChipVariant::W83781D => ids::W83781D,
            ChipVariant::W83782D => ids::W83782D,
            ChipVariant::W83783S => ids::W83783S,
        }
    }

    pub fn from_wchipid(raw: u8) -> Option<Self> {
        match raw & ids::WCHIPID_MASK {
            ids::W83781D => Some(ChipVariant::W83781D),
            ids::W83782D => Some(ChipVariant::W83782D),
            ids::W83783S => Some(ChipVariant::W83783S),
            _ => None,
        }
    }

    pub fn model(self) -> &'static VariantModel {
        match self {
            ChipVariant::W83781D => &W83781D_MODEL,
            ChipVariant::W83782D => &W83782D_MODEL,
            ChipVariant::W83783S => &W83783S_MODEL,
        }
    }
}

impl fmt::Display for ChipVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChipVariant {
    type Err = WmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChipVariant::ALL
            .into_iter()
            .find(|v| v.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| WmError::invalid_config("variant", format!("unknown chip '{}'", s)))
    }
}

/// Mapping between the physical quantity of a voltage channel and the voltage
/// at the chip pin, both in units of 10 mV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calibration {
    /// The physical value is the pin voltage
    Direct,
    /// `pin = (physical * mul + add) / div`
    Scaled { mul: i64, add: i64, div: i64 },
}

impl Calibration {
    pub fn physical_to_pin(self, physical: i64) -> i64 {
        match self {
            Calibration::Direct => physical,
            Calibration::Scaled { mul, add, div } => {
                div_round(physical as i128 * mul as i128 + add as i128, div as i128)
            }
        }
    }

    pub fn pin_to_physical(self, pin: i64) -> i64 {
        match self {
            Calibration::Direct => pin,
            Calibration::Scaled { mul, add, div } => {
                div_round(pin as i128 * div as i128 - add as i128, mul as i128)
            }
        }
    }

    /// A higher register value means a lower physical value
    pub fn is_inverting(self) -> bool {
        matches!(self, Calibration::Scaled { mul, .. } if mul < 0)
    }
}

/// Integer division rounding half away from zero, saturating to the i64 range.
/// Wide operands keep every i64 input times a calibration constant exact.
pub(crate) fn div_round(num: i128, den: i128) -> i64 {
    let (n, d) = (num.unsigned_abs(), den.unsigned_abs());
    let mut q = n / d;
    if n % d >= d - n % d {
        q += 1;
    }
    let q = i64::try_from(q).unwrap_or(i64::MAX);
    if (num < 0) != (den < 0) {
        -q
    } else {
        q
    }
}

/// Physical value the power-on limits are centred on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nominal {
    /// Follow the VID reading
    Vid,
    Fixed(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoltageChannel {
    pub index: usize,
    pub input: RegisterAddress,
    pub min: RegisterAddress,
    pub max: RegisterAddress,
    pub calibration: Calibration,
    pub nominal: Nominal,
}

/// Registers of one additional (9-bit) temperature channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraTemp {
    pub value: RegisterAddress,
    pub config: RegisterAddress,
    pub hyst: RegisterAddress,
    pub over: RegisterAddress,
}

#[derive(Debug)]
pub struct VariantModel {
    pub variant: ChipVariant,
    pub voltages: &'static [VoltageChannel],
    pub fans: usize,
    pub extra_temps: &'static [ExtraTemp],
    pub pwm_smbus: usize,
    pub pwm_isa: usize,
    /// Bank-4 alarm register present
    pub alarm3: bool,
    /// Temperature channels with a selectable diode/thermistor input
    pub sensor_types: usize,
    /// Per-degree RT calibration tables can be read
    pub rt_tables: bool,
    pub isa_capable: bool,
}

impl VariantModel {
    pub fn voltage(&self, index: usize) -> Option<&VoltageChannel> {
        self.voltages.iter().find(|ch| ch.index == index)
    }

    /// Primary channel plus the additional ones
    pub fn temperatures(&self) -> usize {
        1 + self.extra_temps.len()
    }

    pub fn pwm_count(&self, bus: BusKind) -> usize {
        match bus {
            BusKind::Isa => self.pwm_isa,
            BusKind::Smbus => self.pwm_smbus,
        }
    }
}

const fn direct(index: usize, nominal: Nominal) -> VoltageChannel {
    VoltageChannel {
        index,
        input: RegisterAddress::new(regs::input(index)),
        min: RegisterAddress::new(regs::input_min(index)),
        max: RegisterAddress::new(regs::input_max(index)),
        calibration: Calibration::Direct,
        nominal,
    }
}

const fn scaled(index: usize, mul: i64, add: i64, div: i64, nominal: i64) -> VoltageChannel {
    VoltageChannel {
        index,
        input: RegisterAddress::new(regs::input(index)),
        min: RegisterAddress::new(regs::input_min(index)),
        max: RegisterAddress::new(regs::input_max(index)),
        calibration: Calibration::Scaled { mul, add, div },
        nominal: Nominal::Fixed(nominal),
    }
}

// -12 V and -5 V through inverting resistor dividers
const W83781D_IN5: VoltageChannel = scaled(5, -604, 0, 2100, -1200);
const W83781D_IN6: VoltageChannel = scaled(6, -604, 0, 909, -500);

// -12 V and -5 V level-shifted into the positive range
const W83782D_IN5: VoltageChannel = scaled(5, 100, 149_100, 514, -1200);
const W83782D_IN6: VoltageChannel = scaled(6, 100, 77_100, 314, -500);

static W83781D_VOLTAGES: [VoltageChannel; 7] = [
    direct(0, Nominal::Vid),
    direct(1, Nominal::Vid),
    direct(2, Nominal::Fixed(330)),
    direct(3, Nominal::Fixed(297)),
    direct(4, Nominal::Fixed(315)),
    W83781D_IN5,
    W83781D_IN6,
];

static W83782D_VOLTAGES: [VoltageChannel; 9] = [
    direct(0, Nominal::Vid),
    direct(1, Nominal::Vid),
    direct(2, Nominal::Fixed(330)),
    direct(3, Nominal::Fixed(297)),
    direct(4, Nominal::Fixed(315)),
    W83782D_IN5,
    W83782D_IN6,
    direct(7, Nominal::Fixed(297)),
    direct(8, Nominal::Fixed(330)),
];

// No in1 on the W83783S
static W83783S_VOLTAGES: [VoltageChannel; 6] = [
    direct(0, Nominal::Vid),
    direct(2, Nominal::Fixed(330)),
    direct(3, Nominal::Fixed(297)),
    direct(4, Nominal::Fixed(315)),
    W83782D_IN5,
    W83782D_IN6,
];

const TEMP2_REGS: ExtraTemp = ExtraTemp {
    value: RegisterAddress::new(regs::TEMP2),
    config: RegisterAddress::new(regs::TEMP2_CONFIG),
    hyst: RegisterAddress::new(regs::TEMP2_HYST),
    over: RegisterAddress::new(regs::TEMP2_OVER),
};

const TEMP3_REGS: ExtraTemp = ExtraTemp {
    value: RegisterAddress::new(regs::TEMP3),
    config: RegisterAddress::new(regs::TEMP3_CONFIG),
    hyst: RegisterAddress::new(regs::TEMP3_HYST),
    over: RegisterAddress::new(regs::TEMP3_OVER),
};

static EXTRA_TEMPS: [ExtraTemp; 2] = [TEMP2_REGS, TEMP3_REGS];

// No temp3 on the W83783S
static EXTRA_TEMPS_783S: [ExtraTemp; 1] = [TEMP2_REGS];

static W83781D_MODEL: VariantModel = VariantModel {
    variant: ChipVariant::W83781D,
    voltages: &W83781D_VOLTAGES,
    fans: 3,
    extra_temps: &EXTRA_TEMPS,
    pwm_smbus: 0,
    pwm_isa: 0,
    alarm3: false,
    sensor_types: 0,
    rt_tables: true,
    isa_capable: true,
};

static W83782D_MODEL: VariantModel = VariantModel {
    variant: ChipVariant::W83782D,
    voltages: &W83782D_VOLTAGES,
    fans: 3,
    extra_temps: &EXTRA_TEMPS,
    pwm_smbus: 4,
    pwm_isa: 2,
    alarm3: true,
    sensor_types: 3,
    rt_tables: false,
    isa_capable: true,
};

static W83783S_MODEL: VariantModel = VariantModel {
    variant: ChipVariant::W83783S,
    voltages: &W83783S_VOLTAGES,
    fans: 3,
    extra_temps: &EXTRA_TEMPS_783S,
    pwm_smbus: 2,
    pwm_isa: 0,
    alarm3: false,
    sensor_types: 2,
    rt_tables: false,
    isa_capable: false,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wchipid_mapping_ignores_low_bit() {
        assert_eq!(ChipVariant::from_wchipid(0x11), Some(ChipVariant::W83781D));
        assert_eq!(ChipVariant::from_wchipid(0x30), Some(ChipVariant::W83782D));
        assert_eq!(ChipVariant::from_wchipid(0x41), Some(ChipVariant::W83783S));
        assert_eq!(ChipVariant::from_wchipid(0x20), None);
    }

    #[test]
    fn test_variant_serde_names() {
        assert_eq!(serde_json::to_string(&ChipVariant::W83782D).unwrap(), "\"w83782d\"");
        let v: ChipVariant = serde_json::from_str("\"w83783s\"").unwrap();
        assert_eq!(v, ChipVariant::W83783S);
        assert_eq!("W83781D".parse::<ChipVariant>().unwrap(), ChipVariant::W83781D);
        assert!("lm78".parse::<ChipVariant>().is_err());
    }

    #[test]
    fn test_channel_sets() {
        let m1 = ChipVariant::W83781D.model();
        let m2 = ChipVariant::W83782D.model();
        let m3 = ChipVariant::W83783S.model();
        assert_eq!(m1.voltages.len(), 7);
        assert_eq!(m2.voltages.len(), 9);
        assert!(m3.voltage(1).is_none());
        assert!(m3.voltage(7).is_none());
        assert_eq!(m3.temperatures(), 2);
        assert_eq!(m2.temperatures(), 3);
        assert_eq!(m2.pwm_count(BusKind::Smbus), 4);
        assert_eq!(m2.pwm_count(BusKind::Isa), 2);
        assert_eq!(m1.pwm_count(BusKind::Smbus), 0);
    }

    #[test]
    fn test_bank5_channels_on_w83782d() {
        let in7 = ChipVariant::W83782D.model().voltage(7).unwrap();
        assert_eq!(in7.input.raw(), 0x550);
        assert_eq!(in7.max.raw(), 0x554);
        assert_eq!(in7.min.raw(), 0x555);
        assert_eq!(in7.input.bank(), 5);
    }

    #[test]
    fn test_same_channel_differs_by_variant() {
        let old = ChipVariant::W83781D.model().voltage(5).unwrap().calibration;
        let new = ChipVariant::W83782D.model().voltage(5).unwrap().calibration;
        assert!(old.is_inverting());
        assert!(!new.is_inverting());
        // -12 V lands on very different pin voltages
        assert_eq!(old.physical_to_pin(-1200), 345);
        assert_eq!(new.physical_to_pin(-1200), 57);
    }

    #[test]
    fn test_div_round() {
        assert_eq!(div_round(7, 2), 4);
        assert_eq!(div_round(-7, 2), -4);
        assert_eq!(div_round(7, -2), -4);
        assert_eq!(div_round(4, 3), 1);
        assert_eq!(div_round(0, 5), 0);
        assert_eq!(div_round(i128::MAX, 1), i64::MAX);
        assert_eq!(div_round(i128::MIN, 1), -i64::MAX);
    }

    #[test]
    fn test_scaled_calibration_extremes() {
        for ch in [W83781D_IN5, W83781D_IN6, W83782D_IN5, W83782D_IN6] {
            let cal = ch.calibration;
            for physical in [i64::MIN, i64::MIN / 2, -1, 0, 1, i64::MAX / 2, i64::MAX] {
                let pin = cal.physical_to_pin(physical);
                if physical > 0 {
                    assert_eq!(pin > 0, !cal.is_inverting(), "{:?} {}", cal, physical);
                }
            }
        }
    }
}
