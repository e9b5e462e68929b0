//! Compare channel model for the primary system counter

use core::fmt;

/// Native tick size of a compare channel relative to the counter's finest
/// supported resolution.
///
/// The system counter advances in 1-unit steps, but the upper compare
/// channels natively tick in quarter units. Deadline arithmetic shifts
/// channel compare values by [`Resolution::shift`] to bring both kinds onto
/// the finest grid before comparing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 1 counter unit per channel tick
    Unit,
    /// 1/4 counter unit per channel tick
    Quarter,
}

impl Resolution {
    /// Log2 of the channel tick size in finest-resolution units
    pub const fn shift(self) -> u8 {
        match self {
            Resolution::Unit => 0,
            Resolution::Quarter => 2,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Unit => write!(f, "unit"),
            Resolution::Quarter => write!(f, "quarter"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Resolution {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Resolution::Unit => defmt::write!(fmt, "unit"),
            Resolution::Quarter => defmt::write!(fmt, "quarter"),
        }
    }
}

/// Type-safe index of a compare channel on the primary system counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Channel(u8);

impl Channel {
    /// Number of compare channels on the primary counter
    pub const COUNT: usize = 5;

    /// Channel reserved for the kernel tick timeout
    pub const KERNEL: Channel = Channel(0);

    /// Create a new channel index, checked against [`Channel::COUNT`]
    pub const fn new(index: u8) -> Option<Self> {
        if (index as usize) < Self::COUNT {
            Some(Channel(index))
        } else {
            None
        }
    }

    /// Create a channel index without validation (const fn)
    pub const fn new_unchecked(index: u8) -> Self {
        Channel(index)
    }

    /// Get the raw channel index
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Bit position of this channel in the active-channel mask
    pub const fn bit(self) -> u32 {
        1 << self.0
    }

    /// Native resolution of this channel.
    ///
    /// The lower two channels tick in whole counter units; the remaining
    /// channels tick in quarter units. This plan is fixed by the hardware.
    pub const fn resolution(self) -> Resolution {
        match self.0 {
            0 | 1 => Resolution::Unit,
            _ => Resolution::Quarter,
        }
    }

    /// Iterate over all channels in index order
    pub fn all() -> impl Iterator<Item = Channel> {
        (0..Self::COUNT as u8).map(Channel)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CH{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Channel {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "CH{}", self.0);
    }
}

/// Bitmap of armed compare channels on the primary counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMask(u32);

impl ChannelMask {
    /// Mask with no channel armed
    pub const EMPTY: Self = Self(0);

    /// Create a mask from raw interrupt-enable bits
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Get the raw mask bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check whether a channel is armed in this mask
    pub const fn contains(self, channel: Channel) -> bool {
        (self.0 & channel.bit()) != 0
    }

    /// Return this mask with the given channel armed
    pub const fn with(self, channel: Channel) -> Self {
        Self(self.0 | channel.bit())
    }

    /// Return this mask with the given channel disarmed
    pub const fn without(self, channel: Channel) -> Self {
        Self(self.0 & !channel.bit())
    }

    /// Check whether no channel is armed
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for ChannelMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChannelMask({:#07b})", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChannelMask {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "ChannelMask({=u32:b})", self.0);
    }
}
