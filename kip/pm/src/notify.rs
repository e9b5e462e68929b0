//! Wake notification
//!
//! Subsystems whose time-critical setup does not survive standby register a
//! listener here and redo that setup when notified. Listeners are plain
//! function pointers in a fixed-capacity table; registration is permanent.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use heapless::Vec;

use crate::{PmError, PmResult};

/// Maximum number of registered wake listeners
pub const MAX_WAKE_LISTENERS: usize = 4;

/// Why a wake notification fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Return from standby; the primary counter was just restored
    Standby,
}

impl fmt::Display for WakeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeReason::Standby => write!(f, "standby"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for WakeReason {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            WakeReason::Standby => defmt::write!(fmt, "standby"),
        }
    }
}

/// Fixed-capacity table of wake listeners
pub struct WakeListeners {
    table: Mutex<RefCell<Vec<fn(WakeReason), MAX_WAKE_LISTENERS>>>,
}

impl WakeListeners {
    /// Create an empty table
    pub const fn new() -> Self {
        Self {
            table: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Add a listener; fails once the table is at capacity
    pub fn register(&self, listener: fn(WakeReason)) -> PmResult<()> {
        critical_section::with(|cs| {
            self.table
                .borrow_ref_mut(cs)
                .push(listener)
                .map_err(|_| PmError::ListenerTableFull)
        })
    }

    /// Number of registered listeners
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.table.borrow_ref(cs).len())
    }

    /// Whether no listener is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every registered listener with `reason`.
    ///
    /// The table is copied out under the critical section and the listeners
    /// run outside it, so a listener may itself register another listener.
    pub fn notify(&self, reason: WakeReason) {
        let table = critical_section::with(|cs| self.table.borrow_ref(cs).clone());
        for listener in &table {
            listener(reason);
        }
    }
}

impl Default for WakeListeners {
    fn default() -> Self {
        Self::new()
    }
}
