use crate::timer::{TickFlag, TimerId, TimerWheel};

// ===== Countdown behavior =====

#[test]
fn test_timer_counts_down_and_expires() {
    let mut wheel = TimerWheel::new(10);
    wheel.start(TimerId::SyncInterval, 300); // 3 ticks at 10 Hz

    for _ in 0..2 {
        wheel.tick();
        assert!(!wheel.expired(TimerId::SyncInterval));
    }
    wheel.tick();
    assert!(wheel.expired(TimerId::SyncInterval));
}

#[test]
fn test_expired_fires_exactly_once() {
    let mut wheel = TimerWheel::new(10);
    wheel.start(TimerId::AnnounceInterval, 100);
    wheel.tick();

    assert!(wheel.expired(TimerId::AnnounceInterval));
    assert!(!wheel.expired(TimerId::AnnounceInterval));

    // More ticks on the retired timer change nothing.
    wheel.tick();
    wheel.tick();
    assert!(!wheel.expired(TimerId::AnnounceInterval));
}

#[test]
fn test_stopped_timer_never_expires() {
    let mut wheel = TimerWheel::new(10);
    wheel.start(TimerId::DelayReqInterval, 100);
    wheel.stop(TimerId::DelayReqInterval);

    for _ in 0..10 {
        wheel.tick();
        assert!(!wheel.expired(TimerId::DelayReqInterval));
    }
}

#[test]
fn test_subtick_interval_runs_one_tick() {
    let mut wheel = TimerWheel::new(10);
    // 10 ms is below the 100 ms tick period; still runs a full tick.
    wheel.start(TimerId::AnnounceReceipt, 10);
    assert!(!wheel.expired(TimerId::AnnounceReceipt));
    wheel.tick();
    assert!(wheel.expired(TimerId::AnnounceReceipt));
}

#[test]
fn test_restart_rearms_expired_timer() {
    let mut wheel = TimerWheel::new(10);
    wheel.start(TimerId::SyncInterval, 100);
    wheel.tick();
    assert!(wheel.expired(TimerId::SyncInterval));

    wheel.start(TimerId::SyncInterval, 100);
    assert!(wheel.is_running(TimerId::SyncInterval));
    wheel.tick();
    assert!(wheel.expired(TimerId::SyncInterval));
}

#[test]
fn test_timers_are_independent() {
    let mut wheel = TimerWheel::new(10);
    wheel.start(TimerId::AnnounceInterval, 100);
    wheel.start(TimerId::SyncInterval, 200);

    wheel.tick();
    assert!(wheel.expired(TimerId::AnnounceInterval));
    assert!(!wheel.expired(TimerId::SyncInterval));

    wheel.tick();
    assert!(wheel.expired(TimerId::SyncInterval));
}

// ===== Tick flag =====

#[test]
fn test_tick_flag_take_consumes() {
    let flag = TickFlag::new();
    assert!(!flag.take());

    flag.raise();
    assert!(flag.take());
    assert!(!flag.take());
}

#[test]
fn test_tick_flag_coalesces_raises() {
    let flag = TickFlag::new();
    flag.raise();
    flag.raise();
    assert!(flag.take());
    assert!(!flag.take());
}
