#![no_std]
#![allow(unsafe_code)] // Cortex-M interrupt unmasking requires an unsafe intrinsic

//! # kip-hal
//!
//! Hardware interface layer for the kip timekeeping and sleep-coordination
//! crates. This crate defines the channel/counter model shared by the tick
//! source and the sleep controller, the traits that describe the register-level
//! peripheral boundary, and (behind the `mock` feature) a scriptable fake SoC
//! for host tests.
//!
//! The hardware model is two timer peripherals sharing one CPU wake line:
//! a fast free-running system counter with several compare channels, and a
//! low-resolution always-on counter with a single alarm channel that stands in
//! as wake source while the system counter is powered down.

pub mod channel;
pub mod counter;
pub mod soc;
pub mod wake;

#[cfg(feature = "mock")]
pub mod mock;

pub use channel::*;
pub use counter::*;
#[cfg(feature = "mock")]
pub use mock::*;
pub use soc::*;
pub use wake::*;

/// kip framework version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
