//! Attached chip instances
//!
//! Chips are owned by the registry and addressed by an opaque handle. Callers
//! get shared references; detaching removes the entry and releases the chip.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chip::Chip;
use crate::error::{Result, WmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChipHandle(u64);

impl ChipHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChipHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Default)]
pub struct ChipRegistry {
    next: AtomicU64,
    chips: RwLock<HashMap<ChipHandle, Arc<Chip>>>,
}

impl ChipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize and activate `chip`, then take ownership of it.
    ///
    /// A chip that fails to come up is detached and not registered.
    pub fn attach(&self, chip: Chip) -> Result<ChipHandle> {
        if self.find(chip.name()).is_some() {
            return Err(WmError::invalid_config(
                "name",
                format!("a chip named '{}' is already attached", chip.name()),
            ));
        }

        if let Err(e) = chip.initialize().and_then(|_| chip.activate()) {
            warn!("{}: not attached: {}", chip.name(), e);
            chip.detach();
            return Err(e);
        }

        // Another attach of the same name may have finished while this one initialized
        let mut chips = self.chips.write();
        if chips.values().any(|c| c.name() == chip.name()) {
            drop(chips);
            warn!("{}: not attached: name taken during initialization", chip.name());
            chip.detach();
            return Err(WmError::invalid_config(
                "name",
                format!("a chip named '{}' is already attached", chip.name()),
            ));
        }
        let handle = ChipHandle(self.next.fetch_add(1, Ordering::Relaxed));
        info!("Attached {} '{}' as {}", chip.variant(), chip.name(), handle);
        chips.insert(handle, Arc::new(chip));
        Ok(handle)
    }

    pub fn get(&self, handle: ChipHandle) -> Result<Arc<Chip>> {
        self.chips
            .read()
            .get(&handle)
            .cloned()
            .ok_or(WmError::UnknownHandle(handle.0))
    }

    pub fn find(&self, name: &str) -> Option<(ChipHandle, Arc<Chip>)> {
        self.chips
            .read()
            .iter()
            .find(|(_, chip)| chip.name() == name)
            .map(|(handle, chip)| (*handle, chip.clone()))
    }

    /// Remove and release a chip. Outstanding references see it as detached.
    pub fn detach(&self, handle: ChipHandle) -> Result<()> {
        let chip = self
            .chips
            .write()
            .remove(&handle)
            .ok_or(WmError::UnknownHandle(handle.0))?;
        chip.detach();
        Ok(())
    }

    pub fn detach_all(&self) {
        let chips: Vec<_> = self.chips.write().drain().collect();
        for (_, chip) in chips {
            chip.detach();
        }
    }

    /// Handles in attach order
    pub fn handles(&self) -> Vec<ChipHandle> {
        let mut handles: Vec<_> = self.chips.read().keys().copied().collect();
        handles.sort();
        handles
    }

    /// Chips in attach order
    pub fn chips(&self) -> Vec<Arc<Chip>> {
        let chips = self.chips.read();
        self.handles()
            .into_iter()
            .filter_map(|handle| chips.get(&handle).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.chips.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chips.read().is_empty()
    }
}
