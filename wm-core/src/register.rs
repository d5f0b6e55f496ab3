//! Logical register addresses
//!
//! A `RegisterAddress` packs the bank number in the high byte and the in-bank
//! offset in the low byte. Bank 0 is the resting state; any other bank must be
//! selected before the access and restored afterwards.

use std::fmt;

/// Offsets that hold a 16-bit value (high byte first) in banks 1 and 2
const WORD_OFFSETS: [u8; 3] = [0x50, 0x53, 0x55];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegisterAddress(u16);

impl RegisterAddress {
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Bank number, 0 when the register lives in the unbanked space
    pub const fn bank(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn offset(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub const fn is_banked(self) -> bool {
        self.bank() != 0
    }

    /// Word-sized registers are the temperature value/hyst/over words of banks 1 and 2.
    pub fn is_word_sized(self) -> bool {
        matches!(self.bank(), 1 | 2) && WORD_OFFSETS.contains(&self.offset())
    }
}

impl From<u16> for RegisterAddress {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RegisterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_banked() {
            write!(f, "bank{}:0x{:02X}", self.bank(), self.offset())
        } else {
            write!(f, "0x{:02X}", self.offset())
        }
    }
}
