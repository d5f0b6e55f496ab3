//! Parameter contract
//!
//! Every logical sensor group is addressed as a [`Param`]. Reads return the
//! converted values of one group from a fresh snapshot, writes convert the
//! supplied values, update the snapshot and issue the register writes.
//!
//! Values are integers scaled by `10^magnitude`: voltages in 10 mV,
//! temperatures in 0.1 degC, everything else unscaled.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::access::{read_byte, write_value};
use crate::chip::Chip;
use crate::constants::{regs, rt, sensor};
use crate::convert::{
    div_from_reg, div_to_reg, fan_from_reg, fan_to_reg, temp_add_from_reg, temp_add_to_reg,
    temp_from_reg, temp_to_reg, vid_from_reg, voltage_from_reg, voltage_to_reg,
};
use crate::error::{Result, WmError};
use crate::snapshot::Snapshot;

/// One logical sensor group. Channel numbers are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Voltage(usize),
    Fan(usize),
    /// 0 is the primary sensor, 1 and 2 the additional ones
    Temperature(usize),
    Vid,
    Alarms,
    Beep,
    FanDivisor,
    Pwm(usize),
    SensorType(usize),
    RtTable(usize),
}

/// Shape of a parameter's values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamInfo {
    /// Decimal places implied by the integer values
    pub magnitude: u8,
    /// Number of values a read returns
    pub read_values: usize,
    /// Number of values a write accepts; 0 for read-only parameters
    pub write_values: usize,
}

impl ParamInfo {
    pub fn writable(&self) -> bool {
        self.write_values > 0
    }
}

const fn info(magnitude: u8, read_values: usize, write_values: usize) -> ParamInfo {
    ParamInfo {
        magnitude,
        read_values,
        write_values,
    }
}

impl Param {
    pub fn info(&self) -> ParamInfo {
        match self {
            Param::Voltage(_) => info(2, 3, 2),
            Param::Fan(_) => info(0, 2, 1),
            Param::Temperature(_) => info(1, 3, 2),
            Param::Vid => info(2, 1, 0),
            Param::Alarms => info(0, 1, 0),
            Param::Beep => info(0, 2, 2),
            Param::FanDivisor => info(0, 3, 3),
            Param::Pwm(_) => info(0, 1, 1),
            Param::SensorType(_) => info(0, 1, 1),
            Param::RtTable(_) => info(0, rt::TABLE_LEN, 0),
        }
    }

    /// Conventional entry name: `in0`, `fan1`, `temp1`, `vid` ...
    pub fn name(&self) -> String {
        match self {
            Param::Voltage(n) => format!("in{}", n),
            Param::Fan(n) => format!("fan{}", n + 1),
            Param::Temperature(n) => format!("temp{}", n + 1),
            Param::Vid => "vid".to_string(),
            Param::Alarms => "alarms".to_string(),
            Param::Beep => "beep".to_string(),
            Param::FanDivisor => "fan_div".to_string(),
            Param::Pwm(n) => format!("pwm{}", n + 1),
            Param::SensorType(n) => format!("sensor{}", n + 1),
            Param::RtTable(n) => format!("rt{}", n + 1),
        }
    }

    /// Channel group name used in errors
    pub fn group(&self) -> &'static str {
        match self {
            Param::Voltage(_) => "voltage",
            Param::Fan(_) => "fan",
            Param::Temperature(_) => "temperature",
            Param::Vid => "vid",
            Param::Alarms => "alarms",
            Param::Beep => "beep",
            Param::FanDivisor => "fan_div",
            Param::Pwm(_) => "pwm",
            Param::SensorType(_) => "sensor",
            Param::RtTable(_) => "rt",
        }
    }

    fn channel(&self) -> Option<usize> {
        match self {
            Param::Voltage(n)
            | Param::Fan(n)
            | Param::Temperature(n)
            | Param::Pwm(n)
            | Param::SensorType(n)
            | Param::RtTable(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether `chip` has this parameter at all
    pub fn is_supported(&self, chip: &Chip) -> bool {
        let model = chip.model();
        match *self {
            Param::Voltage(n) => model.voltage(n).is_some(),
            Param::Fan(n) => n < model.fans,
            Param::Temperature(n) => n < model.temperatures(),
            Param::Pwm(n) => n < model.pwm_count(chip.bus()),
            Param::SensorType(n) => n < model.sensor_types,
            Param::RtTable(n) => chip.options().rt_tables && n < rt::TABLES,
            Param::Vid | Param::Alarms | Param::Beep | Param::FanDivisor => true,
        }
    }

    /// Fail with `UnsupportedChannel` unless `chip` has this parameter
    pub fn check(&self, chip: &Chip) -> Result<()> {
        if self.is_supported(chip) {
            return Ok(());
        }
        Err(WmError::unsupported_channel(
            chip.name(),
            self.group(),
            self.channel().unwrap_or_default(),
        ))
    }

    /// Every parameter `chip` exposes, in display order
    pub fn all(chip: &Chip) -> Vec<Param> {
        let model = chip.model();
        let mut params: Vec<Param> = model.voltages.iter().map(|ch| Param::Voltage(ch.index)).collect();
        params.extend((0..model.fans).map(Param::Fan));
        params.extend((0..model.temperatures()).map(Param::Temperature));
        params.extend([Param::Vid, Param::FanDivisor, Param::Alarms, Param::Beep]);
        params.extend((0..model.pwm_count(chip.bus())).map(Param::Pwm));
        params.extend((0..model.sensor_types).map(Param::SensorType));
        if chip.options().rt_tables {
            params.extend((0..rt::TABLES).map(Param::RtTable));
        }
        params
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Converted values from a fresh snapshot
    pub fn read(&self, chip: &Chip) -> Result<Vec<i64>> {
        self.check(chip)?;
        chip.with_snapshot(|snap| self.read_from(chip, snap))
    }

    /// Convert this parameter's fields of `snap`. The parameter must be supported by `chip`.
    pub fn read_from(&self, chip: &Chip, snap: &Snapshot) -> Vec<i64> {
        let model = chip.model();
        match *self {
            Param::Voltage(n) => {
                let Some(ch) = model.voltage(n) else {
                    return Vec::new();
                };
                let cal = ch.calibration;
                let (low, high) = if cal.is_inverting() {
                    (snap.in_max[n], snap.in_min[n])
                } else {
                    (snap.in_min[n], snap.in_max[n])
                };
                vec![
                    voltage_from_reg(low, cal),
                    voltage_from_reg(high, cal),
                    voltage_from_reg(snap.in_value[n], cal),
                ]
            }
            Param::Fan(n) => {
                let div = div_from_reg(snap.fan_div[n]);
                vec![fan_from_reg(snap.fan_min[n], div), fan_from_reg(snap.fan[n], div)]
            }
            Param::Temperature(0) => vec![
                temp_from_reg(snap.temp_hyst),
                temp_from_reg(snap.temp_over),
                temp_from_reg(snap.temp),
            ],
            Param::Temperature(n) => {
                let k = n - 1;
                vec![
                    temp_add_from_reg(snap.temp_add_hyst[k]),
                    temp_add_from_reg(snap.temp_add_over[k]),
                    temp_add_from_reg(snap.temp_add[k]),
                ]
            }
            Param::Vid => vec![vid_from_reg(snap.vid)],
            Param::Alarms => vec![snap.alarms as i64],
            Param::Beep => vec![snap.beep_enable as i64, snap.beeps as i64],
            Param::FanDivisor => snap.fan_div.iter().map(|code| div_from_reg(*code)).collect(),
            Param::Pwm(n) => vec![snap.pwm[n] as i64],
            Param::SensorType(n) => vec![snap.sensor_types[n] as i64],
            Param::RtTable(n) => snap.rt[n].iter().map(|v| *v as i64).collect(),
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Write up to `info().write_values` values in read order.
    ///
    /// Extra values are ignored and missing ones leave their fields alone.
    /// Invalid values are rejected before any register is touched.
    pub fn write(&self, chip: &Chip, values: &[i64]) -> Result<()> {
        self.check(chip)?;
        if !self.info().writable() {
            return Err(WmError::ReadOnly(self.name()));
        }
        if values.is_empty() {
            return Ok(());
        }
        debug!("{}: write {} = {:?}", chip.name(), self.name(), values);

        match *self {
            Param::Voltage(n) => write_voltage(chip, n, values),
            Param::Fan(n) => write_fan_min(chip, n, values[0]),
            Param::Temperature(n) => write_temperature(chip, n, values),
            Param::Beep => write_beep(chip, values),
            Param::FanDivisor => write_fan_divisors(chip, values),
            Param::Pwm(n) => write_pwm(chip, n, values[0]),
            Param::SensorType(n) => write_sensor_type(chip, n, values[0]),
            Param::Vid | Param::Alarms | Param::RtTable(_) => Err(WmError::ReadOnly(self.name())),
        }
    }
}

fn write_voltage(chip: &Chip, n: usize, values: &[i64]) -> Result<()> {
    let ch = chip
        .model()
        .voltage(n)
        .ok_or_else(|| WmError::unsupported_channel(chip.name(), "voltage", n))?;
    let cal = ch.calibration;
    // Low-to-high order maps onto swapped registers for inverting inputs
    let (low_reg, high_reg, inverting) = if cal.is_inverting() {
        (ch.max, ch.min, true)
    } else {
        (ch.min, ch.max, false)
    };

    chip.update(false, |snap, bus| {
        if let Some(low) = values.first() {
            let raw = voltage_to_reg(*low, cal);
            if inverting {
                snap.in_max[n] = raw;
            } else {
                snap.in_min[n] = raw;
            }
            write_value(bus, low_reg, raw as u16)?;
        }
        if let Some(high) = values.get(1) {
            let raw = voltage_to_reg(*high, cal);
            if inverting {
                snap.in_min[n] = raw;
            } else {
                snap.in_max[n] = raw;
            }
            write_value(bus, high_reg, raw as u16)?;
        }
        Ok(())
    })
}

fn write_fan_min(chip: &Chip, n: usize, rpm: i64) -> Result<()> {
    // Conversion depends on the cached divisor
    chip.update(true, |snap, bus| {
        snap.fan_min[n] = fan_to_reg(rpm, div_from_reg(snap.fan_div[n]));
        write_value(bus, regs::FAN_MIN[n], snap.fan_min[n] as u16)
    })
}

fn write_temperature(chip: &Chip, n: usize, values: &[i64]) -> Result<()> {
    let hyst = values.first().copied();
    let over = values.get(1).copied();

    if n == 0 {
        return chip.update(false, |snap, bus| {
            if let Some(v) = hyst {
                snap.temp_hyst = temp_to_reg(v);
                write_value(bus, regs::TEMP_HYST, snap.temp_hyst as u16)?;
            }
            if let Some(v) = over {
                snap.temp_over = temp_to_reg(v);
                write_value(bus, regs::TEMP_OVER, snap.temp_over as u16)?;
            }
            Ok(())
        });
    }

    let k = n - 1;
    let extra = chip.model().extra_temps[k];
    chip.update(false, |snap, bus| {
        if let Some(v) = hyst {
            snap.temp_add_hyst[k] = temp_add_to_reg(v);
            write_value(bus, extra.hyst, snap.temp_add_hyst[k])?;
        }
        if let Some(v) = over {
            snap.temp_add_over[k] = temp_add_to_reg(v);
            write_value(bus, extra.over, snap.temp_add_over[k])?;
        }
        Ok(())
    })
}

fn write_beep(chip: &Chip, values: &[i64]) -> Result<()> {
    let enable = values[0] != 0;
    let mask = values.get(1).map(|m| (*m & 0x7FFF) as u16);

    chip.update(false, |snap, bus| {
        let high = match mask {
            Some(mask) => {
                snap.beeps = mask;
                write_value(bus, regs::BEEP_INTS1, mask & 0xFF)?;
                (mask >> 8) as u8
            }
            // Keep the chip's current high mask bits
            None => read_byte(bus, regs::BEEP_INTS2)? & 0x7F,
        };
        snap.beep_enable = enable;
        write_value(bus, regs::BEEP_INTS2, (high | ((enable as u8) << 7)) as u16)
    })
}

fn write_fan_divisors(chip: &Chip, values: &[i64]) -> Result<()> {
    let codes = values
        .iter()
        .take(3)
        .map(|d| div_to_reg(*d))
        .collect::<Result<Vec<u8>>>()?;

    chip.update(false, |snap, bus| {
        let mut fandiv = read_byte(bus, regs::VID_FANDIV)?;
        if let Some(&code) = codes.get(1) {
            snap.fan_div[1] = code;
            fandiv = (fandiv & 0x3F) | (code << 6);
        }
        snap.fan_div[0] = codes[0];
        fandiv = (fandiv & 0xCF) | (codes[0] << 4);
        write_value(bus, regs::VID_FANDIV, fandiv as u16)?;

        if let Some(&code) = codes.get(2) {
            snap.fan_div[2] = code;
            let pin = read_byte(bus, regs::PIN)?;
            write_value(bus, regs::PIN, ((pin & 0x3F) | (code << 6)) as u16)?;
        }
        Ok(())
    })
}

fn write_pwm(chip: &Chip, n: usize, value: i64) -> Result<()> {
    let duty = value.clamp(0, 255) as u8;
    chip.update(false, |snap, bus| {
        snap.pwm[n] = duty;
        write_value(bus, regs::PWM[n], duty as u16)
    })
}

fn write_sensor_type(chip: &Chip, n: usize, code: i64) -> Result<()> {
    let bit1 = regs::SCFG1_BITS[n];
    let bit2 = regs::SCFG2_BITS[n];
    let kind = u16::try_from(code).ok().filter(|c| {
        [sensor::PENTIUM_II_DIODE, sensor::TRANSISTOR_3904, sensor::DEFAULT_BETA].contains(c)
    });
    let Some(kind) = kind else {
        return Err(WmError::invalid_config(
            format!("sensor{}", n + 1),
            format!(
                "invalid sensor type {}; must be {}, {} or {}",
                code,
                sensor::PENTIUM_II_DIODE,
                sensor::TRANSISTOR_3904,
                sensor::DEFAULT_BETA
            ),
        ));
    };

    chip.update(false, |snap, bus| {
        let scfg1 = read_byte(bus, regs::SCFG1)?;
        match kind {
            sensor::DEFAULT_BETA => {
                write_value(bus, regs::SCFG1, (scfg1 & !bit1) as u16)?;
            }
            diode => {
                write_value(bus, regs::SCFG1, (scfg1 | bit1) as u16)?;
                let scfg2 = read_byte(bus, regs::SCFG2)?;
                let scfg2 = if diode == sensor::PENTIUM_II_DIODE {
                    scfg2 | bit2
                } else {
                    scfg2 & !bit2
                };
                write_value(bus, regs::SCFG2, scfg2 as u16)?;
            }
        }
        snap.sensor_types[n] = kind;
        Ok(())
    })
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Param {
    type Err = WmError;

    fn from_str(s: &str) -> Result<Self> {
        let unknown = || WmError::invalid_config("param", format!("unknown parameter '{}'", s));

        match s {
            "vid" => return Ok(Param::Vid),
            "alarms" => return Ok(Param::Alarms),
            "beep" => return Ok(Param::Beep),
            "fan_div" => return Ok(Param::FanDivisor),
            _ => {}
        }

        let split = s.find(|c: char| c.is_ascii_digit()).ok_or_else(unknown)?;
        let (prefix, digits) = s.split_at(split);
        let number: usize = digits.parse().map_err(|_| unknown())?;

        // Every group except voltages is numbered from 1
        let one_based = |ctor: fn(usize) -> Param| {
            number.checked_sub(1).map(ctor).ok_or_else(unknown)
        };
        match prefix {
            "in" => Ok(Param::Voltage(number)),
            "fan" => one_based(Param::Fan),
            "temp" => one_based(Param::Temperature),
            "pwm" => one_based(Param::Pwm),
            "sensor" => one_based(Param::SensorType),
            "rt" => one_based(Param::RtTable),
            _ => Err(unknown()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusOp;
    use crate::chip::ChipOptions;
    use crate::test_utils::{self, SimFixture};
    use crate::variant::ChipVariant;

    #[test]
    fn test_names_round_trip() {
        let params = [
            Param::Voltage(0),
            Param::Voltage(8),
            Param::Fan(2),
            Param::Temperature(0),
            Param::Vid,
            Param::Alarms,
            Param::Beep,
            Param::FanDivisor,
            Param::Pwm(3),
            Param::SensorType(1),
            Param::RtTable(2),
        ];
        for param in params {
            assert_eq!(param.name().parse::<Param>().unwrap(), param);
        }
        assert_eq!("temp1".parse::<Param>().unwrap(), Param::Temperature(0));
        assert!("fan0".parse::<Param>().is_err());
        assert!("foo1".parse::<Param>().is_err());
        assert!("in".parse::<Param>().is_err());
    }

    #[test]
    fn test_info_shapes() {
        assert_eq!(Param::Voltage(0).info(), ParamInfo { magnitude: 2, read_values: 3, write_values: 2 });
        assert_eq!(Param::Temperature(1).info().magnitude, 1);
        assert!(!Param::Vid.info().writable());
        assert_eq!(Param::RtTable(0).info().read_values, 32);
    }

    #[test]
    fn test_all_follows_variant() {
        let SimFixture { chip, .. } = test_utils::active(ChipVariant::W83783S);
        let all = Param::all(&chip);
        assert!(!all.contains(&Param::Voltage(1)));
        assert!(!all.contains(&Param::Temperature(2)));
        assert!(all.contains(&Param::Pwm(1)));
        assert!(!all.contains(&Param::Pwm(2)));
        assert!(all.contains(&Param::SensorType(1)));
        assert!(!all.contains(&Param::SensorType(2)));
    }

    #[test]
    fn test_unsupported_channel_reported() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83783S);
        for param in [Param::Voltage(1), Param::Temperature(2), Param::Pwm(2), Param::Fan(3)] {
            let err = param.read(&chip).unwrap_err();
            assert!(matches!(err, WmError::UnsupportedChannel { .. }), "{}", param);
            let err = param.write(&chip, &[0]).unwrap_err();
            assert!(matches!(err, WmError::UnsupportedChannel { .. }), "{}", param);
        }
        assert_eq!(sim.op_count(), 0);

        let SimFixture { chip, .. } = test_utils::active_isa(ChipVariant::W83782D);
        assert!(Param::Pwm(1).read(&chip).is_ok());
        assert!(Param::Pwm(2).read(&chip).is_err());
    }

    #[test]
    fn test_voltage_read_write() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83782D);
        Param::Voltage(2).write(&chip, &[300, 360]).unwrap();
        assert_eq!(sim.register(regs::input_min(2)), 188);
        assert_eq!(sim.register(regs::input_max(2)), 225);

        sim.set_register(regs::input(2), 206);
        let values = Param::Voltage(2).read(&chip).unwrap();
        assert_eq!(values, vec![300, 360, 329]);
    }

    #[test]
    fn test_inverting_voltage_swaps_limits() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83781D);
        Param::Voltage(5).write(&chip, &[-1300, -1100]).unwrap();

        // -13 V sits at the higher pin voltage, so it lands in the max register
        let max = sim.register(regs::input_max(5));
        let min = sim.register(regs::input_min(5));
        assert!(max > min);

        let values = Param::Voltage(5).read(&chip).unwrap();
        assert!(values[0] < values[1], "{:?}", values);
        assert!((values[0] + 1300).abs() <= 5, "{:?}", values);
        assert!((values[1] + 1100).abs() <= 5, "{:?}", values);
    }

    #[test]
    fn test_partial_write_leaves_other_fields() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83781D);
        let before = sim.register(regs::input_max(3));
        Param::Voltage(3).write(&chip, &[250]).unwrap();
        assert_eq!(sim.register(regs::input_max(3)), before);

        sim.clear_ops();
        Param::Voltage(3).write(&chip, &[]).unwrap();
        assert_eq!(sim.op_count(), 0);
    }

    #[test]
    fn test_fan_min_uses_divisor() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83781D);
        sim.set_register(regs::FAN[0], 0xFF);
        Param::FanDivisor.write(&chip, &[4]).unwrap();
        Param::Fan(0).write(&chip, &[1500, 9999]).unwrap();
        assert_eq!(sim.register(regs::FAN_MIN[0]), 225);

        assert_eq!(Param::Fan(0).read(&chip).unwrap(), vec![1500, 0]);
    }

    #[test]
    fn test_fan_min_write_without_snapshot_refreshes() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83781D);
        sim.set_register(regs::VID_FANDIV, 0x30);
        Param::Fan(0).write(&chip, &[3000]).unwrap();
        // Divisor code 3 (8) was read before converting
        assert_eq!(sim.register(regs::FAN_MIN[0]), 56);
    }

    #[test]
    fn test_temperature_order() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83782D);
        Param::Temperature(0).write(&chip, &[450, 700]).unwrap();
        assert_eq!(sim.register(regs::TEMP_HYST), 45);
        assert_eq!(sim.register(regs::TEMP_OVER), 70);

        Param::Temperature(2).write(&chip, &[-55, 805]).unwrap();
        assert_eq!(sim.word(regs::TEMP3_HYST), temp_add_to_reg(-55));
        assert_eq!(sim.word(regs::TEMP3_OVER), temp_add_to_reg(805));

        sim.set_word(regs::TEMP3, 0x2A80);
        assert_eq!(Param::Temperature(2).read(&chip).unwrap(), vec![-55, 805, 425]);
    }

    #[test]
    fn test_read_only_params() {
        let options = ChipOptions { rt_tables: true, ..ChipOptions::default() };
        let SimFixture { sim, chip, .. } = test_utils::active_with(ChipVariant::W83781D, options);
        for param in [Param::Vid, Param::Alarms, Param::RtTable(0)] {
            assert!(matches!(param.write(&chip, &[1]).unwrap_err(), WmError::ReadOnly(_)));
        }
        assert_eq!(sim.op_count(), 0);
        assert_eq!(Param::RtTable(0).read(&chip).unwrap().len(), 32);
    }

    #[test]
    fn test_rt_tables_need_capability() {
        let SimFixture { chip, .. } = test_utils::active(ChipVariant::W83781D);
        assert!(matches!(
            Param::RtTable(0).read(&chip).unwrap_err(),
            WmError::UnsupportedChannel { .. }
        ));
    }

    #[test]
    fn test_beep_write_both_values() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83781D);
        Param::Beep.write(&chip, &[1, 0xFFFF]).unwrap();
        assert_eq!(sim.register(regs::BEEP_INTS1), 0xFF);
        assert_eq!(sim.register(regs::BEEP_INTS2), 0xFF);
        assert_eq!(Param::Beep.read(&chip).unwrap(), vec![1, 0x7FFF]);
    }

    #[test]
    fn test_beep_enable_keeps_mask() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83781D);
        sim.set_register(regs::BEEP_INTS1, 0x11);
        sim.set_register(regs::BEEP_INTS2, 0x85);
        Param::Beep.write(&chip, &[0]).unwrap();
        assert_eq!(sim.register(regs::BEEP_INTS2), 0x05);
        assert_eq!(sim.register(regs::BEEP_INTS1), 0x11);
    }

    #[test]
    fn test_fan_divisor_write_stores_third_divisor() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83782D);
        sim.set_register(regs::PIN, 0x45);
        Param::FanDivisor.write(&chip, &[8, 1, 4]).unwrap();
        assert_eq!(sim.register(regs::VID_FANDIV) & 0xF0, 0b0011_0000);
        assert_eq!(sim.register(regs::PIN), 0x85);
        assert_eq!(Param::FanDivisor.read(&chip).unwrap(), vec![8, 1, 4]);
    }

    #[test]
    fn test_fan_divisor_rejected_without_mutation() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83781D);
        let err = Param::FanDivisor.write(&chip, &[2, 3]).unwrap_err();
        assert!(matches!(err, WmError::InvalidConfiguration { .. }));
        assert_eq!(sim.op_count(), 0);
    }

    #[test]
    fn test_pwm_clamps() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83782D);
        Param::Pwm(0).write(&chip, &[300]).unwrap();
        assert_eq!(sim.register(regs::PWM[0]), 255);
        Param::Pwm(3).write(&chip, &[-4]).unwrap();
        assert_eq!(sim.register(regs::PWM[3]), 0);
    }

    #[test]
    fn test_sensor_type_codes() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83782D);

        Param::SensorType(0).write(&chip, &[1]).unwrap();
        assert_eq!(sim.register(regs::SCFG1) & 0x02, 0x02);
        assert_eq!(sim.register(regs::SCFG2) & 0x10, 0x10);

        Param::SensorType(0).write(&chip, &[2]).unwrap();
        assert_eq!(sim.register(regs::SCFG1) & 0x02, 0x02);
        assert_eq!(sim.register(regs::SCFG2) & 0x10, 0);

        Param::SensorType(0).write(&chip, &[3435]).unwrap();
        assert_eq!(sim.register(regs::SCFG1) & 0x02, 0);
        assert_eq!(Param::SensorType(0).read(&chip).unwrap(), vec![3435]);
    }

    #[test]
    fn test_sensor_type_rejected_without_mutation() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83782D);
        sim.set_register(regs::SCFG1, 0x0E);
        let before = chip.snapshot().unwrap();
        sim.clear_ops();

        for code in [0, 3, 3434, -1] {
            let err = Param::SensorType(1).write(&chip, &[code]).unwrap_err();
            assert!(matches!(err, WmError::InvalidConfiguration { .. }));
        }
        assert_eq!(sim.op_count(), 0);
        assert_eq!(chip.snapshot().unwrap(), before);
    }

    #[test]
    fn test_write_fault_invalidates_snapshot() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83781D);
        chip.refresh_if_stale().unwrap();
        sim.fail_after(0);
        let err = Param::Temperature(0).write(&chip, &[400]).unwrap_err();
        assert!(err.is_transport_fault());

        // Snapshot was fresh before the fault, so this is a full refresh
        sim.clear_fault();
        sim.clear_ops();
        chip.refresh_if_stale().unwrap();
        assert!(sim.ops().iter().any(|op| matches!(op, BusOp::Read { .. })));
    }

    #[test]
    fn test_extreme_values_saturate_every_writable_group() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83782D);
        for extreme in [i64::MAX, i64::MIN] {
            Param::Voltage(0).write(&chip, &[extreme, extreme]).unwrap();
            Param::Voltage(5).write(&chip, &[extreme, extreme]).unwrap();
            Param::Fan(0).write(&chip, &[extreme]).unwrap();
            Param::Temperature(0).write(&chip, &[extreme, extreme]).unwrap();
            Param::Temperature(1).write(&chip, &[extreme, extreme]).unwrap();
            Param::Beep.write(&chip, &[extreme, extreme]).unwrap();
            Param::Pwm(0).write(&chip, &[extreme]).unwrap();
            assert!(Param::FanDivisor.write(&chip, &[extreme]).is_err());
            assert!(Param::SensorType(0).write(&chip, &[extreme]).is_err());
        }

        Param::Voltage(0).write(&chip, &[i64::MIN, i64::MAX]).unwrap();
        assert_eq!(sim.register(regs::input_min(0)), 0);
        assert_eq!(sim.register(regs::input_max(0)), 255);
        Param::Temperature(0).write(&chip, &[i64::MIN, i64::MAX]).unwrap();
        assert_eq!(sim.register(regs::TEMP_HYST), 0x80);
        assert_eq!(sim.register(regs::TEMP_OVER), 0x7F);
        Param::Temperature(1).write(&chip, &[i64::MIN, i64::MAX]).unwrap();
        assert_eq!(sim.word(regs::TEMP2_HYST), 0x8000);
        assert_eq!(sim.word(regs::TEMP2_OVER), 0x7F80);
        Param::Fan(0).write(&chip, &[i64::MAX]).unwrap();
        assert_eq!(sim.register(regs::FAN_MIN[0]), 1);

        chip.force_refresh().unwrap();
        assert_eq!(&Param::Temperature(1).read(&chip).unwrap()[..2], &[-1280, 1275]);
    }

    #[test]
    fn test_extreme_values_on_inverting_channel() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83781D);
        Param::Voltage(5).write(&chip, &[i64::MIN, i64::MAX]).unwrap();
        // Lowest physical value is the highest pin voltage
        assert_eq!(sim.register(regs::input_max(5)), 255);
        assert_eq!(sim.register(regs::input_min(5)), 0);
    }

    #[test]
    fn test_writes_do_not_touch_staleness() {
        let SimFixture { sim, chip, .. } = test_utils::active(ChipVariant::W83781D);
        chip.refresh_if_stale().unwrap();
        Param::Temperature(0).write(&chip, &[400]).unwrap();
        sim.clear_ops();
        chip.refresh_if_stale().unwrap();
        assert_eq!(sim.op_count(), 0);
    }
}
