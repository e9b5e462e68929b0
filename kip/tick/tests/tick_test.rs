//! Integration tests for the tick source against the mock SoC

use std::cell::RefCell;

use kip_hal::{Channel, MockOp, MockSoc, Resolution, WakeSource, MAX_HORIZON};
use kip_tick::{ForeverPolicy, TickConfig, TickSink, TickSource, Timeout, TICK_IRQ_PRIORITY};

struct RecordingSink {
    announced: RefCell<Vec<u32>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            announced: RefCell::new(Vec::new()),
        }
    }

    fn announced(&self) -> Vec<u32> {
        self.announced.borrow().clone()
    }
}

impl TickSink for RecordingSink {
    fn announce(&self, ticks: u32) {
        self.announced.borrow_mut().push(ticks);
    }
}

#[test]
fn test_init_sequence_and_default_deadline() {
    let soc = MockSoc::new();
    let sink = RecordingSink::new();
    soc.set_sys_now(1000);

    let tick = TickSource::new(&soc, &soc, &sink, TickConfig::new(1));
    tick.init();

    let expected = [
        MockOp::ClearChannelEvent(Channel::KERNEL),
        MockOp::SetResolution {
            channel: Channel::KERNEL,
            resolution: Resolution::Unit,
        },
        MockOp::DebugHalt(true),
        MockOp::SelectWake(WakeSource::Primary),
        MockOp::Arm(Channel::KERNEL),
        MockOp::SetCompare {
            channel: Channel::KERNEL,
            value: 1000 + MAX_HORIZON,
        },
        MockOp::EnableWakeIrq(TICK_IRQ_PRIORITY),
    ];
    assert_eq!(&soc.ops()[..], &expected[..]);

    // baseline was seeded from the live counter
    assert_eq!(tick.elapsed_ticks(), 0);
    assert_eq!(tick.cycle_count(), 1000);
    assert_eq!(tick.config().period(), 1);
}

#[test]
fn test_arm_timeout_aligns_deadline_to_tick_grid() {
    let soc = MockSoc::new();
    let sink = RecordingSink::new();
    let tick = TickSource::new(&soc, &soc, &sink, TickConfig::new(4));

    soc.set_sys_now(1003);
    tick.arm_timeout(Timeout::Ticks(5), false);

    // 1003 rounds down to 1000, plus 5 ticks of 4 units
    assert_eq!(soc.compare_of(Channel::KERNEL), 1020);
    assert!(soc.armed_mask().contains(Channel::KERNEL));

    let ops = soc.ops();
    assert_eq!(ops[0], MockOp::Arm(Channel::KERNEL));
    assert_eq!(
        ops[1],
        MockOp::SetCompare {
            channel: Channel::KERNEL,
            value: 1020,
        }
    );
}

#[test]
fn test_arm_timeout_clamps_overflowing_request() {
    let soc = MockSoc::new();
    let sink = RecordingSink::new();
    let tick = TickSource::new(&soc, &soc, &sink, TickConfig::new(4));

    tick.arm_timeout(Timeout::Ticks(i32::MAX), false);

    // clamp is the horizon rounded down to the tick grid
    let clamped = MAX_HORIZON - MAX_HORIZON % 4;
    assert_eq!(soc.compare_of(Channel::KERNEL), clamped);
}

#[test]
fn test_arm_timeout_clamps_negative_request() {
    let soc = MockSoc::new();
    let sink = RecordingSink::new();
    let tick = TickSource::new(&soc, &soc, &sink, TickConfig::new(4));

    tick.arm_timeout(Timeout::Ticks(-1), false);

    // -1 wraps to a huge unit count and lands in the clamp
    let clamped = MAX_HORIZON - MAX_HORIZON % 4;
    assert_eq!(soc.compare_of(Channel::KERNEL), clamped);
}

#[test]
fn test_arm_timeout_wraps_compare_value() {
    let soc = MockSoc::new();
    let sink = RecordingSink::new();
    let tick = TickSource::new(&soc, &soc, &sink, TickConfig::new(4));

    soc.set_sys_now(u32::MAX - 3);
    tick.arm_timeout(Timeout::Ticks(2), false);

    // aligned down to u32::MAX - 3 (already a grid multiple), plus 8 wraps
    assert_eq!(soc.compare_of(Channel::KERNEL), 4);
}

#[test]
fn test_forever_disarms_by_default() {
    let soc = MockSoc::new();
    let sink = RecordingSink::new();
    let tick = TickSource::new(&soc, &soc, &sink, TickConfig::new(4));

    tick.arm_timeout(Timeout::Ticks(10), false);
    assert!(soc.armed_mask().contains(Channel::KERNEL));

    tick.arm_timeout(Timeout::Forever, true);
    assert!(soc.armed_mask().is_empty());
    assert!(soc.ops().contains(&MockOp::Disarm(Channel::KERNEL)));

    // a later timed request brings the channel back
    tick.arm_timeout(Timeout::Ticks(1), false);
    assert!(soc.armed_mask().contains(Channel::KERNEL));
}

#[test]
fn test_forever_parks_at_horizon_when_configured() {
    let soc = MockSoc::new();
    let sink = RecordingSink::new();
    let config = TickConfig::new(4).with_forever_policy(ForeverPolicy::ParkAtHorizon);
    let tick = TickSource::new(&soc, &soc, &sink, config);

    soc.set_sys_now(1002);
    tick.arm_timeout(Timeout::Forever, true);

    let parked = 1000u32.wrapping_add(MAX_HORIZON - MAX_HORIZON % 4);
    assert_eq!(soc.compare_of(Channel::KERNEL), parked);
    assert!(soc.armed_mask().contains(Channel::KERNEL));
}

#[test]
fn test_compare_event_announces_then_rebaselines() {
    let soc = MockSoc::new();
    let sink = RecordingSink::new();
    let tick = TickSource::new(&soc, &soc, &sink, TickConfig::new(4));
    tick.init();
    soc.clear_ops();

    soc.set_sys_now(1001);
    tick.on_compare_event();

    assert_eq!(sink.announced(), vec![1001 / 4]);

    // the baseline moved to the value read during the event
    assert_eq!(tick.elapsed_ticks(), 0);
    soc.set_sys_now(1004);
    assert_eq!(tick.elapsed_ticks(), 1);

    // the handler never re-arms; scheduling stays with the kernel
    let ops = soc.ops();
    assert!(!ops.iter().any(|op| matches!(
        op,
        MockOp::Arm(_) | MockOp::SetCompare { .. }
    )));
}

#[test]
fn test_elapsed_ticks_is_read_only() {
    let soc = MockSoc::new();
    let sink = RecordingSink::new();
    let tick = TickSource::new(&soc, &soc, &sink, TickConfig::new(4));
    tick.init();

    soc.set_sys_now(40);
    assert_eq!(tick.elapsed_ticks(), 10);
    assert_eq!(tick.elapsed_ticks(), 10);

    // the event announces the same amount the reads reported
    tick.on_compare_event();
    assert_eq!(sink.announced(), vec![10]);
}

#[test]
fn test_consecutive_events_announce_deltas() {
    let soc = MockSoc::new();
    let sink = RecordingSink::new();
    let tick = TickSource::new(&soc, &soc, &sink, TickConfig::new(4));
    tick.init();

    soc.set_sys_now(400);
    tick.on_compare_event();
    soc.set_sys_now(1000);
    tick.on_compare_event();

    assert_eq!(sink.announced(), vec![100, 150]);
}
