//! Integration tests for the standby handoff sequence

use kip_hal::{Channel, ChannelMask, MockOp, MockSoc, SysCounter, WakeSource};
use kip_pm::{
    PmError, PowerState, SleepController, SleepOutcome, StandbyLatency, WakeReason, MAX_HORIZON,
    RESYNC_POLL_LIMIT, WAKE_TICK_RATIO,
};
use kip_tick::{TickConfig, TickSink, TickSource, Timeout};

type MockController<'a> =
    SleepController<&'a MockSoc, &'a MockSoc, &'a MockSoc, &'a MockSoc, &'a MockSoc, &'a MockSoc>;

fn controller(soc: &MockSoc, latency: StandbyLatency) -> MockController<'_> {
    SleepController::new(soc, soc, soc, soc, soc, soc, latency)
}

struct NullSink;

impl TickSink for NullSink {
    fn announce(&self, _ticks: u32) {}
}

#[test]
fn test_standby_operation_sequence() {
    let soc = MockSoc::new();
    let pm = controller(&soc, StandbyLatency::new(1500, 185));

    soc.set_compare(Channel::KERNEL, 500_000);
    soc.arm(Channel::KERNEL);
    soc.clear_ops();

    let outcome = pm.enter(PowerState::Standby, 0).unwrap();
    assert_eq!(outcome, SleepOutcome::Standby);

    let alarm = (500_000 - 185) / WAKE_TICK_RATIO;
    let mask = ChannelMask::EMPTY.with(Channel::KERNEL);
    let expected = [
        MockOp::SelectWake(WakeSource::Alternate),
        MockOp::ClearPending,
        MockOp::SetAlarm(alarm),
        MockOp::EnterStandby,
        MockOp::ClearAlarm,
        MockOp::ClearAlarmEvent,
        MockOp::AlarmSync,
        MockOp::ClearPending,
        MockOp::SelectWake(WakeSource::Primary),
        MockOp::SetCompare {
            channel: Channel::KERNEL,
            value: 500_000,
        },
        MockOp::SetArmedMask(mask),
        MockOp::ReapplyClockDeps,
    ];
    assert_eq!(&soc.ops()[..], &expected[..]);
}

#[test]
fn test_snapshot_restores_wiped_channel_state() {
    let cases: &[&[(u8, u32)]] = &[
        &[(0, 123_456)],
        &[(1, 500_000), (2, 1_200_000)],
        &[(0, 9_000), (3, 44_000), (4, 2_000_000)],
    ];

    for &case in cases {
        let soc = MockSoc::new();
        let pm = controller(&soc, StandbyLatency::new(100, 50));

        let mut mask = ChannelMask::EMPTY;
        for &(index, compare) in case {
            let channel = Channel::new(index).unwrap();
            soc.set_compare(channel, compare);
            soc.arm(channel);
            mask = mask.with(channel);
        }

        let outcome = pm.enter(PowerState::Standby, 0).unwrap();
        assert_eq!(outcome, SleepOutcome::Standby);

        // the mock wiped everything across standby; the controller put the
        // exact capture back
        assert_eq!(soc.armed_mask(), mask);
        for &(index, compare) in case {
            let channel = Channel::new(index).unwrap();
            assert_eq!(soc.compare_of(channel), compare);
        }
        for channel in Channel::all() {
            if !mask.contains(channel) {
                assert!(!soc.armed_mask().contains(channel));
            }
        }
    }
}

#[test]
fn test_restores_precede_mask_write() {
    let soc = MockSoc::new();
    let pm = controller(&soc, StandbyLatency::new(100, 50));

    for index in [1u8, 2, 4] {
        let channel = Channel::new(index).unwrap();
        soc.set_compare(channel, 10_000 * u32::from(index));
        soc.arm(channel);
    }
    soc.clear_ops();

    pm.enter(PowerState::Standby, 0).unwrap();

    let ops = soc.ops();
    let mask_at = ops
        .iter()
        .position(|op| matches!(op, MockOp::SetArmedMask(_)))
        .unwrap();
    let restores: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| matches!(op, MockOp::SetCompare { .. }))
        .map(|(at, _)| at)
        .collect();

    assert_eq!(restores.len(), 3);
    assert!(restores.iter().all(|&at| at < mask_at));
}

#[test]
fn test_soonest_deadline_normalizes_resolutions() {
    let soc = MockSoc::new();
    let pm = controller(&soc, StandbyLatency::new(200_000, 200_000));

    // channel 1 counts whole units, channel 2 counts quarter units:
    // min(500000, 1200000 >> 2) = 300000 whole units
    let ch1 = Channel::new(1).unwrap();
    let ch2 = Channel::new(2).unwrap();
    soc.set_compare(ch1, 500_000);
    soc.arm(ch1);
    soc.set_compare(ch2, 1_200_000);
    soc.arm(ch2);
    soc.clear_ops();

    let outcome = pm.enter(PowerState::Standby, 0).unwrap();
    assert_eq!(outcome, SleepOutcome::Standby);

    // 300000 clears the 200000 overhead; the 100000 budget lands on the
    // 8-times-slower wake counter as 12500
    assert!(soc.ops().contains(&MockOp::SetAlarm(12_500)));
}

#[test]
fn test_no_pending_deadline_uses_horizon() {
    let soc = MockSoc::new();
    soc.set_wake_now(100);
    let pm = controller(&soc, StandbyLatency::new(1500, 185));

    let outcome = pm.enter(PowerState::Standby, 0).unwrap();
    assert_eq!(outcome, SleepOutcome::Standby);

    let alarm = 100 + (MAX_HORIZON - 185) / WAKE_TICK_RATIO;
    assert!(soc.ops().contains(&MockOp::SetAlarm(alarm)));
    assert!(soc.armed_mask().is_empty());
}

#[test]
fn test_deadline_behind_now_counts_as_due() {
    let soc = MockSoc::new();
    let pm = controller(&soc, StandbyLatency::new(1500, 185));

    // compare is 500 units behind the counter; the wrapped delta overshoots
    // the horizon and clamps to zero
    soc.set_sys_now(1000);
    soc.set_compare(Channel::KERNEL, 500);
    soc.arm(Channel::KERNEL);
    soc.clear_ops();

    let outcome = pm.enter(PowerState::Standby, 0).unwrap();

    assert_eq!(outcome, SleepOutcome::Idle);
    assert!(!soc.ops().contains(&MockOp::EnterStandby));
}

#[test]
fn test_resync_within_bound_succeeds() {
    let soc = MockSoc::new();
    let pm = controller(&soc, StandbyLatency::new(100, 50));

    soc.set_compare(Channel::KERNEL, 40_000);
    soc.arm(Channel::KERNEL);
    soc.set_resync_polls(RESYNC_POLL_LIMIT - 1);

    let outcome = pm.enter(PowerState::Standby, 0).unwrap();

    assert_eq!(outcome, SleepOutcome::Standby);
    assert_eq!(soc.compare_of(Channel::KERNEL), 40_000);
}

#[test]
fn test_resync_bound_exceeded_surfaces_error() {
    let soc = MockSoc::new();
    let pm = controller(&soc, StandbyLatency::new(100, 50));

    soc.set_compare(Channel::KERNEL, 40_000);
    soc.arm(Channel::KERNEL);
    soc.set_resync_polls(RESYNC_POLL_LIMIT);

    let result = pm.enter(PowerState::Standby, 0);

    assert_eq!(result, Err(PmError::WakeResync));

    // no restore happened against an untrustworthy counter, and dependent
    // subsystems were not told the clock base is valid
    let ops = soc.ops();
    assert!(soc.armed_mask().is_empty());
    assert!(!ops.contains(&MockOp::ReapplyClockDeps));
    assert!(!ops.iter().any(|op| matches!(op, MockOp::SetArmedMask(_))));
}

static ORDERING_SOC: MockSoc = MockSoc::new();

fn mark_wake(_reason: WakeReason) {
    ORDERING_SOC.record(MockOp::Marker(7));
}

#[test]
fn test_clock_dependencies_reapplied_before_listeners() {
    let pm = controller(&ORDERING_SOC, StandbyLatency::new(100, 50));
    pm.register_wake_listener(mark_wake).unwrap();

    let outcome = pm.enter(PowerState::Standby, 0).unwrap();
    assert_eq!(outcome, SleepOutcome::Standby);

    let ops = ORDERING_SOC.ops();
    let reapply_at = ops
        .iter()
        .position(|op| *op == MockOp::ReapplyClockDeps)
        .unwrap();
    let marker_at = ops
        .iter()
        .position(|op| *op == MockOp::Marker(7))
        .unwrap();
    let standby_at = ops
        .iter()
        .position(|op| *op == MockOp::EnterStandby)
        .unwrap();

    assert!(standby_at < reapply_at);
    assert!(reapply_at < marker_at);
}

#[test]
fn test_tick_source_rides_through_standby() {
    let soc = MockSoc::new();
    let sink = NullSink;
    let tick = TickSource::new(&soc, &soc, &sink, TickConfig::new(4));
    let pm = controller(&soc, StandbyLatency::new(1500, 185));

    tick.init();
    tick.arm_timeout(Timeout::Ticks(125_000), false);
    assert_eq!(soc.compare_of(Channel::KERNEL), 500_000);

    soc.set_standby_advance(400_000);
    let outcome = pm.enter(PowerState::Standby, 0).unwrap();
    assert_eq!(outcome, SleepOutcome::Standby);

    // the deadline armed before sleep is back, against the advanced counter
    assert_eq!(soc.compare_of(Channel::KERNEL), 500_000);
    assert!(soc.armed_mask().contains(Channel::KERNEL));
    assert_eq!(tick.elapsed_ticks(), 100_000);

    // and the tick source is immediately usable for the next deadline
    tick.arm_timeout(Timeout::Ticks(50), false);
    assert_eq!(soc.compare_of(Channel::KERNEL), 400_000 + 200);
}
