//! Sleep-state controller
//!
//! Standby powers the primary counter peripheral down: channel compare
//! values and the armed mask are lost, and the counter needs a
//! resynchronization window after power-up. The controller snapshots channel
//! state, hands the wake deadline to the always-on counter for the duration
//! of standby, and restores the primary counter on the way out.

use core::fmt;

use kip_hal::{
    Channel, ChannelMask, Cpu, LfClock, SocPower, SysCounter, WakeCounter, WakeLine, WakeSource,
    MAX_HORIZON, WAKE_TICK_RATIO,
};

use crate::{Constraints, PmError, PmResult, WakeListeners, WakeReason};

/// Bound on the post-standby resynchronization poll.
///
/// The primary counter resynchronizes within roughly one cycle of the
/// always-on reference clock; this bound is far above that, so hitting it
/// means the peripheral did not come back.
pub const RESYNC_POLL_LIMIT: u32 = 1024;

/// Sleep state requested by the kernel's idle policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    /// Normal execution; not entered through this controller
    Active,
    /// Core clock gated, peripherals live, any interrupt resumes
    Idle,
    /// Deepest state modeled here; primary counter loses channel state
    Standby,
    /// Full power-down, does not resume through this controller
    Off,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Active => write!(f, "active"),
            PowerState::Idle => write!(f, "idle"),
            PowerState::Standby => write!(f, "standby"),
            PowerState::Off => write!(f, "off"),
        }
    }
}

/// What a sleep request actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    /// Standby was entered and exited
    Standby,
    /// Fell back to (or was asked for) idle
    Idle,
    /// Returned without sleeping
    NoSleep,
}

impl fmt::Display for SleepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SleepOutcome::Standby => write!(f, "standby"),
            SleepOutcome::Idle => write!(f, "idle"),
            SleepOutcome::NoSleep => write!(f, "no sleep"),
        }
    }
}

/// Standby overhead constants, in primary counter units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandbyLatency {
    /// Entry plus exit overhead; deadlines closer than this stay out of
    /// standby
    total: u32,
    /// Exit overhead alone; the alarm is pulled in by this much so restore
    /// work finishes before the real deadline
    wake: u32,
}

impl StandbyLatency {
    /// Measured overhead of the reference platform
    pub const DEFAULT: StandbyLatency = StandbyLatency::new(1500, 185);

    /// Create a latency description. `wake` must not exceed `total`.
    pub const fn new(total: u32, wake: u32) -> Self {
        assert!(wake <= total);
        Self { total, wake }
    }

    /// Entry plus exit overhead
    pub const fn total(&self) -> u32 {
        self.total
    }

    /// Exit overhead alone
    pub const fn wake(&self) -> u32 {
        self.wake
    }
}

impl Default for StandbyLatency {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Primary-counter channel state captured across standby
struct ChannelSnapshot {
    mask: ChannelMask,
    compare: [u32; Channel::COUNT],
}

/// Sleep-state controller owning its peripheral handles
pub struct SleepController<C, W, L, F, U, P>
where
    C: SysCounter,
    W: WakeCounter,
    L: WakeLine,
    F: LfClock,
    U: Cpu,
    P: SocPower,
{
    /// Primary system counter
    counter: C,
    /// Always-on wake counter
    wake_counter: W,
    /// Shared wake interrupt line
    wake_line: L,
    /// Always-on reference clock status
    lf_clock: F,
    /// Core sleep/interrupt primitives
    cpu: U,
    /// Platform power hooks
    power: P,
    /// Standby overhead constants
    latency: StandbyLatency,
    /// Sleep-state veto bits
    constraints: Constraints,
    /// Standby wake listeners
    listeners: WakeListeners,
}

impl<C, W, L, F, U, P> SleepController<C, W, L, F, U, P>
where
    C: SysCounter,
    W: WakeCounter,
    L: WakeLine,
    F: LfClock,
    U: Cpu,
    P: SocPower,
{
    /// Create a controller from its peripheral handles and overhead
    /// constants
    pub const fn new(
        counter: C,
        wake_counter: W,
        wake_line: L,
        lf_clock: F,
        cpu: U,
        power: P,
        latency: StandbyLatency,
    ) -> Self {
        Self {
            counter,
            wake_counter,
            wake_line,
            lf_clock,
            cpu,
            power,
            latency,
            constraints: Constraints::new(),
            listeners: WakeListeners::new(),
        }
    }

    /// Constraint registry, for subsystems asserting disallow bits
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Configured overhead constants
    pub fn latency(&self) -> StandbyLatency {
        self.latency
    }

    /// Register a listener invoked after every completed standby cycle
    pub fn register_wake_listener(&self, listener: fn(WakeReason)) -> PmResult<()> {
        self.listeners.register(listener)
    }

    /// Enter the requested sleep state.
    ///
    /// `Standby` is a request, not a command: constraints, an unsettled
    /// reference clock, or a deadline too close for the standby round-trip
    /// all degrade the request to a shallower state, reported in the
    /// outcome. The substate identifier is carried for interface
    /// compatibility and unused.
    pub fn enter(&self, state: PowerState, _substate: u8) -> PmResult<SleepOutcome> {
        match state {
            PowerState::Active => Ok(SleepOutcome::NoSleep),
            PowerState::Idle => {
                self.cpu.wait_for_interrupt();
                Ok(SleepOutcome::Idle)
            }
            PowerState::Standby => self.enter_standby(),
            PowerState::Off => {
                self.power.shutdown();
                Ok(SleepOutcome::NoSleep)
            }
        }
    }

    /// Re-enable interrupts after a sleep decision, for any state.
    ///
    /// The idle policy runs with interrupts masked so a wake cannot slip
    /// between the sleep decision and the sleep instruction; this is the
    /// matching unmask.
    pub fn exit_postwork(&self, _state: PowerState, _substate: u8) {
        self.cpu.unlock_interrupts();
    }

    /// Standby-entry policy and sequence.
    ///
    /// Shallower fallbacks are chosen over failures everywhere except the
    /// post-wake resynchronization bound, the one condition that leaves the
    /// system without a trustworthy primary counter.
    fn enter_standby(&self) -> PmResult<SleepOutcome> {
        let mut standby_ok = self.constraints.standby_allowed();
        let mut idle_ok = self.constraints.idle_allowed();

        // An unsettled reference clock cannot be trusted to wake us, and
        // idle would stall without the standby wake path ever re-checking
        // the filter. Sit this decision out entirely.
        if standby_ok && self.lf_clock.needs_settling() && !self.lf_clock.settled() {
            standby_ok = false;
            idle_ok = false;
        }

        if !standby_ok {
            return Ok(self.shallow_sleep(idle_ok));
        }

        let (snapshot, soonest) = self.capture_deadlines();
        if soonest <= self.latency.total {
            return Ok(self.shallow_sleep(idle_ok));
        }
        let budget = soonest - self.latency.wake;

        // Reroute, sleep, restore, reroute back as one unit: the wake
        // interrupt must not be serviced against half-switched routing.
        critical_section::with(|_cs| self.standby_cycle(&snapshot, budget))?;

        self.power.reapply_clock_dependencies();
        self.listeners.notify(WakeReason::Standby);
        Ok(SleepOutcome::Standby)
    }

    /// Snapshot active channels and find the soonest pending deadline in
    /// finest-resolution units.
    fn capture_deadlines(&self) -> (ChannelSnapshot, u32) {
        let mask = self.counter.armed();
        let mut snapshot = ChannelSnapshot {
            mask,
            compare: [0; Channel::COUNT],
        };

        // Nothing pending; the only bound is the hardware horizon.
        if mask.is_empty() {
            return (snapshot, MAX_HORIZON);
        }

        let now = self.counter.now();
        let mut soonest = u32::MAX;
        for channel in Channel::all() {
            if !mask.contains(channel) {
                continue;
            }
            let compare = self.counter.compare(channel);
            snapshot.compare[channel.index()] = compare;

            let shift = channel.resolution().shift();
            let mut delta = compare.wrapping_sub(now << shift);
            // A delta past the horizon is a deadline already behind us.
            if delta > MAX_HORIZON {
                delta = 0;
            }
            delta >>= shift;
            if delta < soonest {
                soonest = delta;
            }
        }
        (snapshot, soonest)
    }

    /// Steps between the reroute and the channel restore, run under one
    /// critical section.
    fn standby_cycle(&self, snapshot: &ChannelSnapshot, budget: u32) -> PmResult<()> {
        self.wake_line.select(WakeSource::Alternate);
        self.wake_line.clear_pending();
        let alarm = self
            .wake_counter
            .now()
            .wrapping_add(budget / WAKE_TICK_RATIO);
        self.wake_counter.set_alarm(alarm);

        self.power.enter_standby();

        // The alarm may have fired, or something else woke us; either way
        // the alarm must be dead and its traces gone before the line is
        // handed back to the primary counter.
        self.wake_counter.clear_alarm();
        self.wake_counter.clear_event();
        self.wake_counter.sync();
        self.wake_line.clear_pending();
        self.wake_line.select(WakeSource::Primary);

        let mut polls: u32 = 0;
        while !self.counter.is_running() {
            polls += 1;
            if polls >= RESYNC_POLL_LIMIT {
                return Err(PmError::WakeResync);
            }
        }

        // Values before the mask, so no channel is ever enabled while its
        // compare register still holds reset garbage.
        for channel in Channel::all() {
            if snapshot.mask.contains(channel) {
                self.counter
                    .set_compare(channel, snapshot.compare[channel.index()]);
            }
        }
        self.counter.set_armed(snapshot.mask);
        Ok(())
    }

    fn shallow_sleep(&self, idle_ok: bool) -> SleepOutcome {
        if idle_ok {
            self.cpu.wait_for_interrupt();
            SleepOutcome::Idle
        } else {
            SleepOutcome::NoSleep
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PowerState {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            PowerState::Active => defmt::write!(fmt, "active"),
            PowerState::Idle => defmt::write!(fmt, "idle"),
            PowerState::Standby => defmt::write!(fmt, "standby"),
            PowerState::Off => defmt::write!(fmt, "off"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SleepOutcome {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            SleepOutcome::Standby => defmt::write!(fmt, "standby"),
            SleepOutcome::Idle => defmt::write!(fmt, "idle"),
            SleepOutcome::NoSleep => defmt::write!(fmt, "no sleep"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for StandbyLatency {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "StandbyLatency{{total: {}, wake: {}}}",
            self.total,
            self.wake
        );
    }
}
