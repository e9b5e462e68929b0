#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

//! # Sleep-State Controller
//!
//! Coordinates entry into and exit from low-power states on a SoC whose
//! primary compare timer does not survive the deepest sleep state. Before
//! standby, timekeeping is handed off to a low-resolution always-on counter
//! sharing the primary counter's interrupt line; on wake, the primary
//! counter's channel configuration is restored from a snapshot and dependent
//! subsystems are notified.
//!
//! The controller owns its peripheral handles (the `kip-hal` traits), a
//! [`Constraints`] registry that subsystems use to veto sleep states, and a
//! fixed-capacity wake-listener table.

use core::fmt;

pub mod constraint;
pub mod controller;
pub mod notify;

pub use constraint::*;
pub use controller::*;
pub use notify::*;

pub use kip_hal::{
    Channel, ChannelMask, Cpu, LfClock, Resolution, SocPower, SysCounter, WakeCounter, WakeLine,
    WakeSource, LATE_WINDOW, MAX_HORIZON, WAKE_TICK_RATIO,
};

/// Result type used throughout the sleep controller
pub type PmResult<T> = Result<T, PmError>;

/// Error types for sleep controller operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmError {
    /// Primary counter failed to resynchronize after standby wake
    WakeResync,
    /// Wake-listener table is at capacity
    ListenerTableFull,
}

impl fmt::Display for PmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PmError::WakeResync => {
                write!(f, "Primary counter failed to resynchronize after standby wake")
            }
            PmError::ListenerTableFull => write!(f, "Wake-listener table is at capacity"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PmError {}

#[cfg(feature = "defmt")]
impl defmt::Format for PmError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            PmError::WakeResync => defmt::write!(fmt, "WakeResync"),
            PmError::ListenerTableFull => defmt::write!(fmt, "ListenerTableFull"),
        }
    }
}
