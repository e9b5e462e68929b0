//! Scriptable fake SoC for host tests
//!
//! `MockSoc` implements every hardware trait in this crate against plain
//! state behind a critical-section mutex, and records state-changing
//! operations in a fixed-capacity log so tests can assert on ordering.
//! Status and counter reads are not logged.
//!
//! The constructor is const, so a test that needs to reach the mock from a
//! plain function pointer (a wake listener, for instance) can hold it in a
//! `static`.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Vec;

use crate::{
    Channel, ChannelMask, Cpu, LfClock, Resolution, SocPower, SysCounter, WakeCounter, WakeLine,
    WakeSource, WAKE_TICK_RATIO,
};

/// Capacity of the mock operation log
pub const MOCK_LOG_CAPACITY: usize = 128;

/// One recorded hardware operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOp {
    /// Compare value written to a primary counter channel
    SetCompare { channel: Channel, value: u32 },
    /// Single channel armed
    Arm(Channel),
    /// Single channel disarmed
    Disarm(Channel),
    /// Whole armed-channel mask written in one operation
    SetArmedMask(ChannelMask),
    /// Channel compare event cleared
    ClearChannelEvent(Channel),
    /// Channel resolution configured
    SetResolution { channel: Channel, resolution: Resolution },
    /// Debug-halt behavior configured
    DebugHalt(bool),
    /// Wake line routed to an event source
    SelectWake(WakeSource),
    /// Pending wake interrupt cleared at the interrupt controller
    ClearPending,
    /// Wake line enabled with a priority
    EnableWakeIrq(u8),
    /// Wake counter alarm written (the write arms)
    SetAlarm(u32),
    /// Wake counter alarm explicitly disarmed
    ClearAlarm,
    /// Wake counter event flag cleared
    ClearAlarmEvent,
    /// Synchronizing read-back from the always-on domain
    AlarmSync,
    /// Deepest-sleep entry sequence executed
    EnterStandby,
    /// Wait-for-interrupt executed
    Wfi,
    /// Interrupts re-enabled
    UnlockIrq,
    /// Full power-down path invoked
    Shutdown,
    /// Clock-dependent peripherals reconfigured after wake
    ReapplyClockDeps,
    /// Test-injected marker, see [`MockSoc::record`]
    Marker(u32),
}

struct MockState {
    sys_now: u32,
    compares: [u32; Channel::COUNT],
    imask: u32,
    wake_now: u32,
    alarm: Option<u32>,
    wake_source: WakeSource,
    lf_needs_settling: bool,
    lf_settled: bool,
    wipe_on_standby: bool,
    standby_advance: u32,
    resync_polls_after_standby: u32,
    resync_pending: u32,
    ops: Vec<MockOp, MOCK_LOG_CAPACITY>,
}

/// Fake SoC implementing all kip-hal traits over scriptable state
pub struct MockSoc {
    state: Mutex<RefCell<MockState>>,
}

impl MockSoc {
    /// Create a mock SoC in its power-on state: counters at zero, no channel
    /// armed, wake line routed to the primary source, reference clock
    /// settled, channel state wiped by standby.
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(MockState {
                sys_now: 0,
                compares: [0; Channel::COUNT],
                imask: 0,
                wake_now: 0,
                alarm: None,
                wake_source: WakeSource::Primary,
                lf_needs_settling: false,
                lf_settled: true,
                wipe_on_standby: true,
                standby_advance: 0,
                resync_polls_after_standby: 0,
                resync_pending: 0,
                ops: Vec::new(),
            })),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        critical_section::with(|cs| f(&mut self.state.borrow_ref_mut(cs)))
    }

    fn log(&self, op: MockOp) {
        self.with_state(|s| {
            let _ = s.ops.push(op);
        });
    }

    /// Set the primary counter value
    pub fn set_sys_now(&self, value: u32) {
        self.with_state(|s| s.sys_now = value);
    }

    /// Get the primary counter value
    pub fn sys_now(&self) -> u32 {
        self.with_state(|s| s.sys_now)
    }

    /// Set the wake counter value
    pub fn set_wake_now(&self, value: u32) {
        self.with_state(|s| s.wake_now = value);
    }

    /// Get the wake counter value
    pub fn wake_now(&self) -> u32 {
        self.with_state(|s| s.wake_now)
    }

    /// Advance both counters by `units` of primary counter time
    pub fn advance(&self, units: u32) {
        self.with_state(|s| {
            s.sys_now = s.sys_now.wrapping_add(units);
            s.wake_now = s.wake_now.wrapping_add(units / WAKE_TICK_RATIO);
        });
    }

    /// Script the reference clock status
    pub fn set_lf_clock(&self, needs_settling: bool, settled: bool) {
        self.with_state(|s| {
            s.lf_needs_settling = needs_settling;
            s.lf_settled = settled;
        });
    }

    /// Script whether standby wipes compare values and the armed mask
    pub fn set_wipe_on_standby(&self, wipe: bool) {
        self.with_state(|s| s.wipe_on_standby = wipe);
    }

    /// Script how far both counters advance across one standby period
    pub fn set_standby_advance(&self, units: u32) {
        self.with_state(|s| s.standby_advance = units);
    }

    /// Script how many running-status polls report "not yet synchronized"
    /// after each standby
    pub fn set_resync_polls(&self, polls: u32) {
        self.with_state(|s| s.resync_polls_after_standby = polls);
    }

    /// Current compare value of a channel
    pub fn compare_of(&self, channel: Channel) -> u32 {
        self.with_state(|s| s.compares[channel.index()])
    }

    /// Current armed-channel mask
    pub fn armed_mask(&self) -> ChannelMask {
        self.with_state(|s| ChannelMask::new(s.imask))
    }

    /// Currently armed alarm value, if any
    pub fn alarm(&self) -> Option<u32> {
        self.with_state(|s| s.alarm)
    }

    /// Currently selected wake source
    pub fn selected_wake(&self) -> WakeSource {
        self.with_state(|s| s.wake_source)
    }

    /// Snapshot of the operation log
    pub fn ops(&self) -> Vec<MockOp, MOCK_LOG_CAPACITY> {
        self.with_state(|s| s.ops.clone())
    }

    /// Discard the operation log, typically after test setup
    pub fn clear_ops(&self) {
        self.with_state(|s| s.ops.clear());
    }

    /// Append a marker to the operation log. Lets a test interleave its own
    /// milestones (for example from a wake listener) with the recorded
    /// hardware operations.
    pub fn record(&self, op: MockOp) {
        self.log(op);
    }
}

impl Default for MockSoc {
    fn default() -> Self {
        Self::new()
    }
}

impl SysCounter for MockSoc {
    fn now(&self) -> u32 {
        self.with_state(|s| s.sys_now)
    }

    fn compare(&self, channel: Channel) -> u32 {
        self.with_state(|s| s.compares[channel.index()])
    }

    fn set_compare(&self, channel: Channel, value: u32) {
        self.with_state(|s| {
            s.compares[channel.index()] = value;
            let _ = s.ops.push(MockOp::SetCompare { channel, value });
        });
    }

    fn armed(&self) -> ChannelMask {
        self.with_state(|s| ChannelMask::new(s.imask))
    }

    fn set_armed(&self, mask: ChannelMask) {
        self.with_state(|s| {
            s.imask = mask.bits();
            let _ = s.ops.push(MockOp::SetArmedMask(mask));
        });
    }

    fn arm(&self, channel: Channel) {
        self.with_state(|s| {
            s.imask |= channel.bit();
            let _ = s.ops.push(MockOp::Arm(channel));
        });
    }

    fn disarm(&self, channel: Channel) {
        self.with_state(|s| {
            s.imask &= !channel.bit();
            let _ = s.ops.push(MockOp::Disarm(channel));
        });
    }

    fn clear_event(&self, channel: Channel) {
        self.log(MockOp::ClearChannelEvent(channel));
    }

    fn set_resolution(&self, channel: Channel, resolution: Resolution) {
        self.log(MockOp::SetResolution { channel, resolution });
    }

    fn set_debug_halt(&self, halt: bool) {
        self.log(MockOp::DebugHalt(halt));
    }

    fn is_running(&self) -> bool {
        self.with_state(|s| {
            if s.resync_pending > 0 {
                s.resync_pending -= 1;
                false
            } else {
                true
            }
        })
    }
}

impl WakeCounter for MockSoc {
    fn now(&self) -> u32 {
        self.with_state(|s| s.wake_now)
    }

    fn set_alarm(&self, value: u32) {
        self.with_state(|s| {
            s.alarm = Some(value);
            let _ = s.ops.push(MockOp::SetAlarm(value));
        });
    }

    fn clear_alarm(&self) {
        self.with_state(|s| {
            s.alarm = None;
            let _ = s.ops.push(MockOp::ClearAlarm);
        });
    }

    fn clear_event(&self) {
        self.log(MockOp::ClearAlarmEvent);
    }

    fn sync(&self) {
        self.log(MockOp::AlarmSync);
    }
}

impl WakeLine for MockSoc {
    fn select(&self, source: WakeSource) {
        self.with_state(|s| {
            s.wake_source = source;
            let _ = s.ops.push(MockOp::SelectWake(source));
        });
    }

    fn clear_pending(&self) {
        self.log(MockOp::ClearPending);
    }

    fn enable(&self, priority: u8) {
        self.log(MockOp::EnableWakeIrq(priority));
    }
}

impl LfClock for MockSoc {
    fn needs_settling(&self) -> bool {
        self.with_state(|s| s.lf_needs_settling)
    }

    fn settled(&self) -> bool {
        self.with_state(|s| s.lf_settled)
    }
}

impl Cpu for MockSoc {
    fn wait_for_interrupt(&self) {
        self.log(MockOp::Wfi);
    }

    fn unlock_interrupts(&self) {
        self.log(MockOp::UnlockIrq);
    }
}

impl SocPower for MockSoc {
    fn enter_standby(&self) {
        self.with_state(|s| {
            let _ = s.ops.push(MockOp::EnterStandby);
            if s.wipe_on_standby {
                s.compares = [0; Channel::COUNT];
                s.imask = 0;
            }
            s.resync_pending = s.resync_polls_after_standby;
            s.sys_now = s.sys_now.wrapping_add(s.standby_advance);
            s.wake_now = s.wake_now.wrapping_add(s.standby_advance / WAKE_TICK_RATIO);
        });
    }

    fn shutdown(&self) {
        self.log(MockOp::Shutdown);
    }

    fn reapply_clock_dependencies(&self) {
        self.log(MockOp::ReapplyClockDeps);
    }
}
