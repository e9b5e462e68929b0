//! Shared wake interrupt line routing

use core::fmt;

/// Event source driving the shared wake interrupt line.
///
/// The primary system counter and the always-on wake counter are physically
/// distinct peripherals that share a single CPU interrupt line. Whichever
/// source is selected at the moment the core sleeps determines what wakes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeSource {
    /// The primary system counter's compare events
    Primary,
    /// The always-on wake counter's alarm event
    Alternate,
}

impl fmt::Display for WakeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WakeSource::Primary => write!(f, "primary"),
            WakeSource::Alternate => write!(f, "alternate"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for WakeSource {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            WakeSource::Primary => defmt::write!(fmt, "primary"),
            WakeSource::Alternate => defmt::write!(fmt, "alternate"),
        }
    }
}

/// The one CPU interrupt line both timer peripherals publish to.
///
/// Routing is an explicit operation with a single setter; nothing else in the
/// system changes the selected source as a side effect.
pub trait WakeLine {
    /// Route the line to the given event source
    fn select(&self, source: WakeSource);

    /// Clear a pending interrupt on the line at the interrupt controller
    fn clear_pending(&self);

    /// Enable the line at the interrupt controller with the given priority
    fn enable(&self, priority: u8);
}

impl<T: WakeLine + ?Sized> WakeLine for &T {
    fn select(&self, source: WakeSource) {
        (**self).select(source)
    }

    fn clear_pending(&self) {
        (**self).clear_pending()
    }

    fn enable(&self, priority: u8) {
        (**self).enable(priority)
    }
}
