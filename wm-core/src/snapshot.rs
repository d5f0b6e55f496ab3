//! Cached raw register state of one chip

use std::time::Duration;

use crate::constants::rt;

/// Raw register values, indexed by zero-based channel. Slots for channels the
/// variant does not have stay zero and are never read from or written to the chip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub in_value: [u8; 9],
    pub in_min: [u8; 9],
    pub in_max: [u8; 9],
    pub fan: [u8; 3],
    pub fan_min: [u8; 3],
    /// Divisor exponents
    pub fan_div: [u8; 3],
    pub temp: u8,
    pub temp_over: u8,
    pub temp_hyst: u8,
    pub temp_add: [u16; 2],
    pub temp_add_over: [u16; 2],
    pub temp_add_hyst: [u16; 2],
    /// Combined 5-bit VID code
    pub vid: u8,
    pub alarms: u32,
    pub beeps: u16,
    pub beep_enable: bool,
    pub pwm: [u8; 4],
    pub sensor_types: [u16; 3],
    pub rt: [[u8; rt::TABLE_LEN]; rt::TABLES],
    pub valid: bool,
    pub last_updated: Option<Duration>,
}

impl Snapshot {
    /// Stale when never filled, invalidated, older than `window`, or when the
    /// clock reads earlier than the last refresh.
    pub fn is_stale(&self, now: Duration, window: Duration) -> bool {
        match (self.valid, self.last_updated) {
            (true, Some(last)) => now < last || now - last > window,
            _ => true,
        }
    }

    pub fn mark_fresh(&mut self, now: Duration) {
        self.valid = true;
        self.last_updated = Some(now);
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}
