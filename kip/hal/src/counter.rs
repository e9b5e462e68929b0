//! Counter traits and timing constants

use crate::{Channel, ChannelMask, Resolution};

/// Window, in finest-resolution counter units, within which a compare value
/// behind the counter still fires immediately.
///
/// A compare value further than this in the past is interpreted by the
/// hardware as lying far in the future instead of as already elapsed.
pub const LATE_WINDOW: u32 = 1 << 22;

/// Maximum number of counter units a compare value may be scheduled into
/// the future: `2^32 - 2^22 - 1` (`0xFFBF_FFFF`).
///
/// The compare hardware fires immediately when the compare value is less than
/// [`LATE_WINDOW`] units in the past, so a delta beyond this horizon becomes
/// ambiguous with "already past". All deadline arithmetic clamps to this
/// value before writing a compare register.
pub const MAX_HORIZON: u32 = u32::MAX - LATE_WINDOW;

/// Primary counter units per tick of the always-on wake counter.
///
/// The primary counter advances once per unit while the wake counter advances
/// once per eight units. Deltas move between the two domains by integer
/// multiplication or division with this ratio.
pub const WAKE_TICK_RATIO: u32 = 8;

/// Register-level interface of the primary free-running system counter and
/// its compare channels.
///
/// The counter is read-only from software and wraps modulo `2^32`. Each
/// compare channel holds an absolute 32-bit compare value and an armed flag;
/// the armed flags of all channels are visible as one [`ChannelMask`], which
/// is also how the sleep controller learns which channels other subsystems
/// have outstanding deadlines on.
pub trait SysCounter {
    /// Read the counter at its finest resolution
    fn now(&self) -> u32;

    /// Read a channel's absolute compare value
    fn compare(&self, channel: Channel) -> u32;

    /// Write a channel's absolute compare value
    fn set_compare(&self, channel: Channel, value: u32);

    /// Read the armed-channel mask
    fn armed(&self) -> ChannelMask;

    /// Write the entire armed-channel mask in one register operation
    fn set_armed(&self, mask: ChannelMask);

    /// Arm a single channel
    fn arm(&self, channel: Channel);

    /// Disarm a single channel
    fn disarm(&self, channel: Channel);

    /// Clear a channel's pending compare event
    fn clear_event(&self, channel: Channel);

    /// Configure the native resolution of a channel
    fn set_resolution(&self, channel: Channel, resolution: Resolution);

    /// Configure whether the counter halts while the CPU is halted by a
    /// debugger
    fn set_debug_halt(&self, halt: bool);

    /// Check whether the counter is running and synchronized.
    ///
    /// After a power state that removed power from the peripheral, register
    /// values are not trustworthy until this reports `true`.
    fn is_running(&self) -> bool;
}

impl<T: SysCounter + ?Sized> SysCounter for &T {
    fn now(&self) -> u32 {
        (**self).now()
    }

    fn compare(&self, channel: Channel) -> u32 {
        (**self).compare(channel)
    }

    fn set_compare(&self, channel: Channel, value: u32) {
        (**self).set_compare(channel, value)
    }

    fn armed(&self) -> ChannelMask {
        (**self).armed()
    }

    fn set_armed(&self, mask: ChannelMask) {
        (**self).set_armed(mask)
    }

    fn arm(&self, channel: Channel) {
        (**self).arm(channel)
    }

    fn disarm(&self, channel: Channel) {
        (**self).disarm(channel)
    }

    fn clear_event(&self, channel: Channel) {
        (**self).clear_event(channel)
    }

    fn set_resolution(&self, channel: Channel, resolution: Resolution) {
        (**self).set_resolution(channel, resolution)
    }

    fn set_debug_halt(&self, halt: bool) {
        (**self).set_debug_halt(halt)
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }
}

/// Register-level interface of the low-resolution always-on counter.
///
/// This counter keeps running in the deepest sleep state and carries the
/// wake-up deadline while the primary counter is powered down. It has a
/// single compare channel: writing the compare value arms it, and it disarms
/// itself when it fires.
pub trait WakeCounter {
    /// Read the counter in its native 8-unit resolution
    fn now(&self) -> u32;

    /// Write the alarm compare value; the write itself arms the channel
    fn set_alarm(&self, value: u32);

    /// Explicitly disarm the alarm channel
    fn clear_alarm(&self);

    /// Clear the alarm's pending event flag
    fn clear_event(&self);

    /// Synchronizing read-back that guarantees a preceding event clear has
    /// taken effect in the always-on domain before this call returns
    fn sync(&self);
}

impl<T: WakeCounter + ?Sized> WakeCounter for &T {
    fn now(&self) -> u32 {
        (**self).now()
    }

    fn set_alarm(&self, value: u32) {
        (**self).set_alarm(value)
    }

    fn clear_alarm(&self) {
        (**self).clear_alarm()
    }

    fn clear_event(&self) {
        (**self).clear_event()
    }

    fn sync(&self) {
        (**self).sync()
    }
}
