//! In-memory W8378x register file
//!
//! Answers both as a port-mapped device and as an SMBus slave, so the same
//! simulated chip can sit behind either transport. Every register-level access
//! is recorded, and faults can be injected after a given number of accesses.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::{PortIo, SmbusIo};
use crate::constants::{config_bits, ids, isa, regs, rt};
use crate::error::{Result, WmError};
use crate::register::RegisterAddress;
use crate::variant::ChipVariant;

/// One register access as seen by the chip, in the bank that was selected at the time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Read { bank: u8, offset: u8, value: u8 },
    Write { bank: u8, offset: u8, value: u8 },
}

impl BusOp {
    pub fn offset(&self) -> u8 {
        match self {
            BusOp::Read { offset, .. } | BusOp::Write { offset, .. } => *offset,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, BusOp::Write { .. })
    }
}

#[derive(Debug, Default)]
struct SimState {
    /// bank -> register file
    banks: HashMap<u8, [u8; 256]>,
    bank: u8,
    /// ISA address-port latch
    latch: u8,
    rt_index: u8,
    rt: Vec<u8>,
    log: Vec<BusOp>,
    accesses: usize,
    fail_at: Option<usize>,
}

impl SimState {
    fn page(&mut self, bank: u8) -> &mut [u8; 256] {
        self.banks.entry(bank).or_insert([0u8; 256])
    }

    fn peek(&self, reg: RegisterAddress) -> u8 {
        self.banks
            .get(&reg.bank())
            .map(|page| page[reg.offset() as usize])
            .unwrap_or(0)
    }

    fn poke(&mut self, reg: RegisterAddress, value: u8) {
        self.page(reg.bank())[reg.offset() as usize] = value;
    }

    fn check_fault(&mut self, target: &str) -> Result<()> {
        let n = self.accesses;
        self.accesses += 1;
        match self.fail_at {
            Some(at) if n >= at => Err(WmError::transport(target, "simulated bus fault")),
            _ => Ok(()),
        }
    }

    fn read(&mut self, offset: u8) -> u8 {
        let bank = self.bank;
        let value = if offset == regs::BANK_SELECT {
            bank
        } else if bank == 0 && offset as u16 == regs::RT_VAL {
            self.rt.get(self.rt_index as usize).copied().unwrap_or(0)
        } else {
            self.page(bank)[offset as usize]
        };
        self.log.push(BusOp::Read { bank, offset, value });
        value
    }

    fn write(&mut self, offset: u8, value: u8) {
        let bank = self.bank;
        self.log.push(BusOp::Write { bank, offset, value });
        if offset == regs::BANK_SELECT {
            self.bank = value & 0x07;
            return;
        }
        if bank == 0 && offset as u16 == regs::RT_IDX {
            self.rt_index = value;
            return;
        }
        if bank == 0 && offset as u16 == regs::CONFIG && value & config_bits::INIT != 0 {
            // Reset sets every fan divisor back to 2 and self-clears
            let vid_fandiv = RegisterAddress::new(regs::VID_FANDIV);
            let pin = RegisterAddress::new(regs::PIN);
            let vid = self.peek(vid_fandiv) & 0x0F;
            self.poke(vid_fandiv, vid | 0x50);
            let pin_bits = self.peek(pin) & 0x3F;
            self.poke(pin, pin_bits | 0x40);
            self.page(0)[offset as usize] = value & !config_bits::INIT;
            return;
        }
        self.page(bank)[offset as usize] = value;
    }
}

pub struct SimulatedChip {
    variant: ChipVariant,
    state: Mutex<SimState>,
}

impl SimulatedChip {
    /// A powered-up chip of the given variant with identification registers set
    pub fn new(variant: ChipVariant) -> Self {
        let mut state = SimState {
            rt: vec![0; rt::TABLES * rt::TABLE_LEN],
            ..SimState::default()
        };
        state.poke(RegisterAddress::new(regs::CHIPMAN), ids::WINBOND_VENDOR);
        // Low bit of WCHIPID is unreliable on real parts
        state.poke(RegisterAddress::new(regs::WCHIPID), variant.wchipid() | 0x01);
        state.poke(RegisterAddress::new(regs::VID_FANDIV), 0x50);
        state.poke(RegisterAddress::new(regs::PIN), 0x40);
        Self {
            variant,
            state: Mutex::new(state),
        }
    }

    pub fn variant(&self) -> ChipVariant {
        self.variant
    }

    /// Set a register without recording a bus access
    pub fn set_register(&self, reg: u16, value: u8) {
        self.state.lock().poke(RegisterAddress::new(reg), value);
    }

    /// Set a word-sized register (high byte at the register, low byte after it)
    pub fn set_word(&self, reg: u16, value: u16) {
        let mut state = self.state.lock();
        state.poke(RegisterAddress::new(reg), (value >> 8) as u8);
        state.poke(RegisterAddress::new(reg + 1), (value & 0xFF) as u8);
    }

    /// Read a register without recording a bus access
    pub fn register(&self, reg: u16) -> u8 {
        self.state.lock().peek(RegisterAddress::new(reg))
    }

    pub fn word(&self, reg: u16) -> u16 {
        let state = self.state.lock();
        let high = state.peek(RegisterAddress::new(reg)) as u16;
        let low = state.peek(RegisterAddress::new(reg + 1)) as u16;
        (high << 8) | low
    }

    /// Program the 5-bit VID code across VID_FANDIV and CHIPID
    pub fn set_vid_code(&self, code: u8) {
        let mut state = self.state.lock();
        let vid_fandiv = RegisterAddress::new(regs::VID_FANDIV);
        let chipid = RegisterAddress::new(regs::CHIPID);
        let fandiv = state.peek(vid_fandiv) & 0xF0;
        state.poke(vid_fandiv, fandiv | (code & 0x0F));
        let id = state.peek(chipid) & 0xFE;
        state.poke(chipid, id | ((code >> 4) & 0x01));
    }

    pub fn set_rt_table(&self, table: &[u8]) {
        let mut state = self.state.lock();
        let len = state.rt.len().min(table.len());
        state.rt[..len].copy_from_slice(&table[..len]);
    }

    /// Currently selected bank
    pub fn bank(&self) -> u8 {
        self.state.lock().bank
    }

    /// Register accesses recorded so far
    pub fn ops(&self) -> Vec<BusOp> {
        self.state.lock().log.clone()
    }

    pub fn op_count(&self) -> usize {
        self.state.lock().log.len()
    }

    pub fn clear_ops(&self) {
        self.state.lock().log.clear();
    }

    /// Fail every backend call once `n` more calls have succeeded
    pub fn fail_after(&self, n: usize) {
        let mut state = self.state.lock();
        state.fail_at = Some(state.accesses + n);
    }

    pub fn clear_fault(&self) {
        self.state.lock().fail_at = None;
    }
}

impl PortIo for SimulatedChip {
    fn inb(&self, port: u16) -> Result<u8> {
        let mut state = self.state.lock();
        state.check_fault(&format!("sim:port 0x{:04x}", port))?;
        match port % isa::EXTENT {
            p if p == isa::ADDR_REG_OFFSET => Ok(state.latch),
            p if p == isa::DATA_REG_OFFSET => {
                let offset = state.latch;
                Ok(state.read(offset))
            }
            _ => Ok(0xFF),
        }
    }

    fn outb(&self, port: u16, value: u8) -> Result<()> {
        let mut state = self.state.lock();
        state.check_fault(&format!("sim:port 0x{:04x}", port))?;
        match port % isa::EXTENT {
            p if p == isa::ADDR_REG_OFFSET => state.latch = value,
            p if p == isa::DATA_REG_OFFSET => {
                let offset = state.latch;
                state.write(offset, value);
            }
            _ => {}
        }
        Ok(())
    }
}

impl SmbusIo for SimulatedChip {
    fn read_byte_data(&self, address: u8, command: u8) -> Result<u8> {
        let mut state = self.state.lock();
        state.check_fault(&format!("sim:smbus 0x{:02x}", address))?;
        Ok(state.read(command))
    }

    fn write_byte_data(&self, address: u8, command: u8, value: u8) -> Result<()> {
        let mut state = self.state.lock();
        state.check_fault(&format!("sim:smbus 0x{:02x}", address))?;
        state.write(command, value);
        Ok(())
    }
}
