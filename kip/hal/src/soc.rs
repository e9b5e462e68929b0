//! SoC-level hooks: reference clock status, CPU primitives, power sequences

/// Status of the always-on low-frequency reference clock.
///
/// When the reference is an internally generated oscillator it passes through
/// a settling filter after selection; until the filter settles the clock is
/// not trustworthy as a wake source.
pub trait LfClock {
    /// Check whether the selected source has a settling requirement at all
    fn needs_settling(&self) -> bool;

    /// Check whether the settling filter has settled
    fn settled(&self) -> bool;
}

impl<T: LfClock + ?Sized> LfClock for &T {
    fn needs_settling(&self) -> bool {
        (**self).needs_settling()
    }

    fn settled(&self) -> bool {
        (**self).settled()
    }
}

/// Architecture primitives used by the sleep controller
pub trait Cpu {
    /// Execute a single low-power wait-for-interrupt instruction with
    /// interrupts left enabled at the hardware level
    fn wait_for_interrupt(&self);

    /// Re-enable interrupts that were masked while the sleep decision was
    /// being made
    fn unlock_interrupts(&self);
}

impl<T: Cpu + ?Sized> Cpu for &T {
    fn wait_for_interrupt(&self) {
        (**self).wait_for_interrupt()
    }

    fn unlock_interrupts(&self) {
        (**self).unlock_interrupts()
    }
}

/// Cortex-M implementation of the CPU primitives
#[derive(Debug, Clone, Copy, Default)]
pub struct CortexCpu;

impl CortexCpu {
    /// Create the Cortex-M CPU handle
    pub const fn new() -> Self {
        Self
    }
}

impl Cpu for CortexCpu {
    fn wait_for_interrupt(&self) {
        #[cfg(target_arch = "arm")]
        cortex_m::asm::wfi();
        #[cfg(not(target_arch = "arm"))]
        core::hint::spin_loop();
    }

    fn unlock_interrupts(&self) {
        #[cfg(target_arch = "arm")]
        unsafe {
            cortex_m::interrupt::enable()
        };
    }
}

/// Chip-specific power sequences consumed by the sleep controller.
///
/// These are opaque to the controller: it decides when to call them and in
/// what order, never how they work.
pub trait SocPower {
    /// Execute the deepest-sleep entry sequence; returns after wake-up
    fn enter_standby(&self);

    /// Unconditional full power-down path. On hardware this does not return;
    /// hosted implementations may.
    fn shutdown(&self);

    /// Reconfigure clock-dependent peripherals whose configuration does not
    /// survive the deepest sleep state
    fn reapply_clock_dependencies(&self);
}

impl<T: SocPower + ?Sized> SocPower for &T {
    fn enter_standby(&self) {
        (**self).enter_standby()
    }

    fn shutdown(&self) {
        (**self).shutdown()
    }

    fn reapply_clock_dependencies(&self) {
        (**self).reapply_clock_dependencies()
    }
}
