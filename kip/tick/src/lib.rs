#![no_std]
#![forbid(unsafe_code)]

//! # Kernel Tick Source
//!
//! Monotonic tick delivery for a tickless kernel, built on channel 0 of the
//! always-running system counter. The counter free-runs and is never reset;
//! deadlines are compare values and elapsed time is reconstructed from
//! counter reads with wraparound-safe arithmetic.
//!
//! The tick source announces elapsed ticks through a [`TickSink`] and never
//! re-arms itself: after each announcement the kernel decides the next
//! deadline and calls [`TickSource::arm_timeout`] again.

use core::cell::RefCell;
use core::fmt;

use critical_section::Mutex;
use kip_hal::{Channel, Resolution, SysCounter, WakeLine, WakeSource, MAX_HORIZON};

/// Interrupt priority of the channel-0 compare event.
///
/// Low enough that radio and peripheral interrupts preempt tick processing.
pub const TICK_IRQ_PRIORITY: u8 = 3;

/// A timeout request from the kernel, in kernel-tick units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Wake after this many kernel ticks. Non-positive and overflowing
    /// requests are clamped to the maximum horizon rather than rejected.
    Ticks(i32),
    /// No timeout requested; handled per [`ForeverPolicy`]
    Forever,
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Ticks(ticks) => write!(f, "{} ticks", ticks),
            Timeout::Forever => write!(f, "forever"),
        }
    }
}

/// What a [`Timeout::Forever`] request does to channel 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeverPolicy {
    /// Disarm channel 0; no compare event until the next `arm_timeout`
    Disarm,
    /// Keep channel 0 armed at the furthest tick-aligned deadline, so the
    /// counter still produces a periodic heartbeat near the wrap point
    ParkAtHorizon,
}

impl Default for ForeverPolicy {
    fn default() -> Self {
        ForeverPolicy::Disarm
    }
}

/// Tick source configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickConfig {
    /// Native counter units per kernel tick
    period: u32,
    /// Behavior of `arm_timeout(Timeout::Forever, ..)`
    forever: ForeverPolicy,
}

impl TickConfig {
    /// Create a configuration with the given tick period.
    ///
    /// `period` is in native counter units and must be non-zero.
    /// `Forever` requests disarm the channel unless overridden with
    /// [`with_forever_policy`](Self::with_forever_policy).
    pub const fn new(period: u32) -> Self {
        Self {
            period,
            forever: ForeverPolicy::Disarm,
        }
    }

    /// Override the `Forever` handling policy
    pub const fn with_forever_policy(mut self, policy: ForeverPolicy) -> Self {
        self.forever = policy;
        self
    }

    /// Native counter units per kernel tick
    pub const fn period(&self) -> u32 {
        self.period
    }

    /// Configured `Forever` handling policy
    pub const fn forever_policy(&self) -> ForeverPolicy {
        self.forever
    }
}

/// Kernel callback interface for tick delivery
pub trait TickSink {
    /// Report `ticks` elapsed kernel ticks since the previous announcement
    fn announce(&self, ticks: u32);
}

impl<T: TickSink + ?Sized> TickSink for &T {
    fn announce(&self, ticks: u32) {
        (**self).announce(ticks);
    }
}

/// Ticks elapsed between two counter readings.
///
/// Divides each reading down to its tick-grid quotient and subtracts the
/// quotients; dividing the raw delta instead would drift by one tick whenever
/// `last` is not tick-aligned. When the counter has wrapped since `last`, the
/// distance is the remaining run to the top plus the run from zero.
pub fn elapsed_ticks_between(current: u32, last: u32, period: u32) -> u32 {
    if current >= last {
        current / period - last / period
    } else {
        (u32::MAX - last) / period + current / period
    }
}

/// Tick source over channel 0 of the system counter
pub struct TickSource<C: SysCounter, L: WakeLine, S: TickSink> {
    /// System counter peripheral
    counter: C,
    /// Shared wake interrupt line
    wake: L,
    /// Kernel announce callback
    sink: S,
    /// Tick period and `Forever` policy
    config: TickConfig,
    /// Counter reading at the last announcement
    last_announced: Mutex<RefCell<u32>>,
}

impl<C: SysCounter, L: WakeLine, S: TickSink> TickSource<C, L, S> {
    /// Create a tick source from its peripheral handles and configuration
    pub const fn new(counter: C, wake: L, sink: S, config: TickConfig) -> Self {
        Self {
            counter,
            wake,
            sink,
            config,
            last_announced: Mutex::new(RefCell::new(0)),
        }
    }

    /// Bring up channel 0.
    ///
    /// Seeds the announcement baseline from the live counter, clears any
    /// stale compare event, configures unit resolution, halts the counter
    /// with the debugger, routes the shared wake line to the system counter,
    /// and arms channel 0 a full horizon out so the channel is never left
    /// without a deadline. The compare interrupt is enabled last, at
    /// [`TICK_IRQ_PRIORITY`].
    pub fn init(&self) {
        critical_section::with(|cs| {
            let now = self.counter.now();
            *self.last_announced.borrow_ref_mut(cs) = now;

            self.counter.clear_event(Channel::KERNEL);
            self.counter.set_resolution(Channel::KERNEL, Resolution::Unit);
            self.counter.set_debug_halt(true);
            self.wake.select(WakeSource::Primary);
            self.counter.arm(Channel::KERNEL);
            self.counter
                .set_compare(Channel::KERNEL, now.wrapping_add(MAX_HORIZON));
            self.wake.enable(TICK_IRQ_PRIORITY);
        });
    }

    /// Program the next kernel deadline.
    ///
    /// The deadline is computed from the current counter value rounded down
    /// to the tick grid, so it lands on a tick boundary regardless of when
    /// within a tick this is called. Requests beyond [`MAX_HORIZON`] native
    /// units (including negative tick counts, which wrap) are clamped to the
    /// furthest tick-aligned deadline. The channel is re-armed on every
    /// timed request, so a preceding `Forever` under the disarm policy
    /// cannot leave the timeout dead.
    ///
    /// The idle hint is accepted for interface compatibility and ignored;
    /// sleep decisions are made elsewhere.
    pub fn arm_timeout(&self, timeout: Timeout, _is_idle_hint: bool) {
        let period = self.config.period;
        critical_section::with(|_cs| {
            let delta = match timeout {
                Timeout::Forever => match self.config.forever {
                    ForeverPolicy::Disarm => {
                        self.counter.disarm(Channel::KERNEL);
                        return;
                    }
                    ForeverPolicy::ParkAtHorizon => MAX_HORIZON - MAX_HORIZON % period,
                },
                Timeout::Ticks(ticks) => {
                    let delta = (ticks as u32).wrapping_mul(period);
                    if delta > MAX_HORIZON {
                        MAX_HORIZON - MAX_HORIZON % period
                    } else {
                        delta
                    }
                }
            };

            let now = self.counter.now();
            let aligned = now - now % period;
            self.counter.arm(Channel::KERNEL);
            self.counter
                .set_compare(Channel::KERNEL, aligned.wrapping_add(delta));
        });
    }

    /// Kernel ticks elapsed since the last announcement.
    ///
    /// Read-only; the announcement baseline moves only in
    /// [`on_compare_event`](Self::on_compare_event).
    pub fn elapsed_ticks(&self) -> u32 {
        critical_section::with(|cs| {
            let current = self.counter.now();
            let last = *self.last_announced.borrow_ref(cs);
            elapsed_ticks_between(current, last, self.config.period)
        })
    }

    /// Raw counter snapshot for fine-grained timestamping
    pub fn cycle_count(&self) -> u32 {
        self.counter.now()
    }

    /// Channel-0 compare event handler.
    ///
    /// Announces the elapsed ticks to the kernel, then moves the baseline to
    /// the counter value that was read for the computation. Does not re-arm
    /// channel 0; scheduling the next deadline is the kernel's call.
    pub fn on_compare_event(&self) {
        let (current, ticks) = critical_section::with(|cs| {
            let current = self.counter.now();
            let last = *self.last_announced.borrow_ref(cs);
            (current, elapsed_ticks_between(current, last, self.config.period))
        });

        self.sink.announce(ticks);

        critical_section::with(|cs| {
            *self.last_announced.borrow_ref_mut(cs) = current;
        });
    }

    /// Active configuration
    pub fn config(&self) -> &TickConfig {
        &self.config
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Timeout {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Timeout::Ticks(ticks) => defmt::write!(fmt, "{} ticks", ticks),
            Timeout::Forever => defmt::write!(fmt, "forever"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ForeverPolicy {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            ForeverPolicy::Disarm => defmt::write!(fmt, "disarm"),
            ForeverPolicy::ParkAtHorizon => defmt::write!(fmt, "park-at-horizon"),
        }
    }
}
