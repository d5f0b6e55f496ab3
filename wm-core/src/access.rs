//! Register addressing protocol
//!
//! Turns a logical [`RegisterAddress`] into byte operations on a [`Transport`]:
//! select the bank, access the byte (or the high/low pair of a word register),
//! then return the chip to bank 0. The whole sequence runs under the adapter
//! lock. A fault aborts the sequence where it happened and is not retried,
//! so the chip may be left in a non-zero bank.

use tracing::trace;

use crate::bus::Transport;
use crate::constants::regs;
use crate::error::Result;
use crate::register::RegisterAddress;

/// Read a byte register, or a word register as `(high << 8) | low`
pub fn read_value(transport: &Transport, reg: impl Into<RegisterAddress>) -> Result<u16> {
    let reg = reg.into();
    let _guard = transport.lock();

    if reg.is_banked() {
        transport.write_byte(regs::BANK_SELECT, reg.bank())?;
    }
    let mut value = transport.read_byte(reg.offset())? as u16;
    if reg.is_word_sized() {
        let low = transport.read_byte(reg.offset() + 1)? as u16;
        value = (value << 8) | low;
    }
    if reg.is_banked() {
        transport.write_byte(regs::BANK_SELECT, 0)?;
    }

    trace!("{} read {} = 0x{:04x}", transport, reg, value);
    Ok(value)
}

/// Read a byte register, truncating to its width
pub fn read_byte(transport: &Transport, reg: impl Into<RegisterAddress>) -> Result<u8> {
    Ok((read_value(transport, reg)? & 0xFF) as u8)
}

/// Write a byte register, or a word register high byte first
pub fn write_value(transport: &Transport, reg: impl Into<RegisterAddress>, value: u16) -> Result<()> {
    let reg = reg.into();
    let _guard = transport.lock();

    if reg.is_banked() {
        transport.write_byte(regs::BANK_SELECT, reg.bank())?;
    }
    if reg.is_word_sized() {
        transport.write_byte(reg.offset(), (value >> 8) as u8)?;
        transport.write_byte(reg.offset() + 1, (value & 0xFF) as u8)?;
    } else {
        transport.write_byte(reg.offset(), (value & 0xFF) as u8)?;
    }
    if reg.is_banked() {
        transport.write_byte(regs::BANK_SELECT, 0)?;
    }

    trace!("{} write {} = 0x{:04x}", transport, reg, value);
    Ok(())
}

/// Force the chip back to bank 0. Used before identification, since a chip may
/// have been left in another bank by an earlier aborted sequence.
pub fn reset_bank(transport: &Transport) -> Result<()> {
    let _guard = transport.lock();
    transport.write_byte(regs::BANK_SELECT, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::bus::{Adapter, BusOp, IsaAdapter, PortIo, SimulatedChip, SmbusAdapter, SmbusIo};
    use crate::variant::ChipVariant;

    fn smbus(sim: &Arc<SimulatedChip>) -> Transport {
        let adapter: SmbusAdapter = Adapter::new("sim", sim.clone() as Arc<dyn SmbusIo>);
        Transport::smbus(adapter, 0x2d)
    }

    fn isa(sim: &Arc<SimulatedChip>) -> Transport {
        let adapter: IsaAdapter = Adapter::new("sim", sim.clone() as Arc<dyn PortIo>);
        Transport::isa(adapter, 0x290)
    }

    #[test]
    fn test_word_read_sequence() {
        for make in [smbus, isa] {
            let sim = Arc::new(SimulatedChip::new(ChipVariant::W83781D));
            sim.set_word(0x150, 0x1980);
            let transport = make(&sim);

            assert_eq!(read_value(&transport, 0x0150).unwrap(), 0x1980);
            assert_eq!(
                sim.ops(),
                vec![
                    BusOp::Write { bank: 0, offset: 0x4E, value: 1 },
                    BusOp::Read { bank: 1, offset: 0x50, value: 0x19 },
                    BusOp::Read { bank: 1, offset: 0x51, value: 0x80 },
                    BusOp::Write { bank: 1, offset: 0x4E, value: 0 },
                ]
            );
            assert_eq!(sim.bank(), 0);
        }
    }

    #[test]
    fn test_word_write_high_byte_first() {
        let sim = Arc::new(SimulatedChip::new(ChipVariant::W83782D));
        let transport = smbus(&sim);
        write_value(&transport, 0x0255, 0x3C00).unwrap();

        let writes: Vec<_> = sim.ops().into_iter().filter(|op| op.is_write()).collect();
        assert_eq!(
            writes,
            vec![
                BusOp::Write { bank: 0, offset: 0x4E, value: 2 },
                BusOp::Write { bank: 2, offset: 0x55, value: 0x3C },
                BusOp::Write { bank: 2, offset: 0x56, value: 0x00 },
                BusOp::Write { bank: 2, offset: 0x4E, value: 0 },
            ]
        );
        assert_eq!(sim.word(0x255), 0x3C00);
    }

    #[test]
    fn test_unbanked_byte_access_skips_bank_select() {
        let sim = Arc::new(SimulatedChip::new(ChipVariant::W83781D));
        sim.set_register(0x27, 0x2A);
        let transport = smbus(&sim);

        assert_eq!(read_value(&transport, 0x27).unwrap(), 0x2A);
        assert_eq!(sim.ops(), vec![BusOp::Read { bank: 0, offset: 0x27, value: 0x2A }]);
    }

    #[test]
    fn test_banked_byte_register_outside_banks_1_2() {
        let sim = Arc::new(SimulatedChip::new(ChipVariant::W83782D));
        sim.set_register(0x450, 0x05);
        let transport = isa(&sim);

        assert_eq!(read_byte(&transport, 0x450).unwrap(), 0x05);
        // Offset 0x50 is only word-sized in banks 1 and 2
        assert_eq!(sim.op_count(), 3);
        assert_eq!(sim.bank(), 0);
    }

    #[test]
    fn test_fault_aborts_before_bank_restore() {
        let sim = Arc::new(SimulatedChip::new(ChipVariant::W83781D));
        let transport = smbus(&sim);
        // Bank select succeeds, the data read fails
        sim.fail_after(1);

        let err = read_value(&transport, 0x0150).unwrap_err();
        assert!(err.is_transport_fault());
        assert_eq!(sim.bank(), 1);
        assert_eq!(sim.op_count(), 1);
    }

    #[test]
    fn test_reset_bank() {
        let sim = Arc::new(SimulatedChip::new(ChipVariant::W83781D));
        let transport = smbus(&sim);
        transport.write_byte(0x4E, 2).unwrap();
        reset_bank(&transport).unwrap();
        assert_eq!(sim.bank(), 0);
    }
}
