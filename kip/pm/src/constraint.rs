//! Sleep-state constraints
//!
//! Subsystems that cannot tolerate a given sleep state assert a disallow bit
//! before starting the sensitive work and lift it when done. The controller
//! reads the combined mask at every sleep decision.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;

bitflags::bitflags! {
    /// Disallow bits read at each sleep decision
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConstraintMask: u32 {
        /// Standby must not be entered
        const DISALLOW_STANDBY = 1 << 0;
        /// Idle must not be entered
        const DISALLOW_IDLE = 1 << 1;
    }
}

impl fmt::Display for ConstraintMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04b}", self.bits())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConstraintMask {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=u32:b}", self.bits());
    }
}

/// Shared registry of sleep-state constraints.
///
/// Bits are reference-free: `apply` of an already-applied bit and `lift` of
/// an already-lifted bit are no-ops, matching a level-style veto rather than
/// a counted lock.
pub struct Constraints {
    mask: Mutex<RefCell<ConstraintMask>>,
}

impl Constraints {
    /// Create a registry with no constraints applied
    pub const fn new() -> Self {
        Self {
            mask: Mutex::new(RefCell::new(ConstraintMask::empty())),
        }
    }

    /// Assert the given disallow bits
    pub fn apply(&self, constraint: ConstraintMask) {
        critical_section::with(|cs| {
            let mut mask = self.mask.borrow_ref_mut(cs);
            *mask |= constraint;
        });
    }

    /// Clear the given disallow bits
    pub fn lift(&self, constraint: ConstraintMask) {
        critical_section::with(|cs| {
            let mut mask = self.mask.borrow_ref_mut(cs);
            *mask &= !constraint;
        });
    }

    /// Current combined mask
    pub fn mask(&self) -> ConstraintMask {
        critical_section::with(|cs| *self.mask.borrow_ref(cs))
    }

    /// Whether standby is currently permitted
    pub fn standby_allowed(&self) -> bool {
        !self.mask().contains(ConstraintMask::DISALLOW_STANDBY)
    }

    /// Whether idle is currently permitted
    pub fn idle_allowed(&self) -> bool {
        !self.mask().contains(ConstraintMask::DISALLOW_IDLE)
    }
}

impl Default for Constraints {
    fn default() -> Self {
        Self::new()
    }
}
