//! Countdown timer wheel driven by a fixed-rate protocol tick.
//!
//! Each timer is a single `i32` counter: positive while running, zero
//! when it has just expired, and −1 when inactive. The wheel is
//! decremented once per protocol tick; expiry is observed exactly once
//! through [`TimerWheel::expired`].

use std::sync::atomic::{AtomicBool, Ordering};

/// Default protocol tick rate in Hz.
pub const PTP_TICK_RATE_HZ: u32 = 10;

/// The protocol timers a port runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum TimerId {
    /// Fires when no Announce arrived from the elected master in time.
    AnnounceReceipt = 0,
    /// Paces Announce emission while master.
    AnnounceInterval = 1,
    /// Paces Sync emission while master.
    SyncInterval = 2,
    /// Paces `Delay_Req` emission while slave.
    DelayReqInterval = 3,
}

/// Number of timer slots.
pub const TIMER_COUNT: usize = 4;

/// Fixed-size wheel of countdown timers.
#[derive(Debug)]
pub struct TimerWheel {
    tick_hz: u32,
    slots: [i32; TIMER_COUNT],
}

impl TimerWheel {
    /// Create a wheel with all timers inactive.
    #[must_use]
    pub fn new(tick_hz: u32) -> Self {
        Self {
            tick_hz: tick_hz.max(1),
            slots: [-1; TIMER_COUNT],
        }
    }

    /// Start (or restart) a timer with the given interval.
    ///
    /// Intervals shorter than one tick still run for a full tick.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        reason = "tick counts for protocol intervals are far below i32::MAX"
    )]
    pub fn start(&mut self, id: TimerId, interval_ms: u32) {
        let ticks = u64::from(interval_ms) * u64::from(self.tick_hz) / 1000;
        self.slots[id as usize] = (ticks as i32).max(1);
    }

    /// Deactivate a timer.
    pub fn stop(&mut self, id: TimerId) {
        self.slots[id as usize] = -1;
    }

    /// Whether the timer just expired.
    ///
    /// Returns true at most once per `start`: observing the expiry
    /// also retires the timer (`0 → −1`).
    pub fn expired(&mut self, id: TimerId) -> bool {
        let slot = &mut self.slots[id as usize];
        if *slot == 0 {
            *slot = -1;
            true
        } else {
            false
        }
    }

    /// Advance the wheel by one tick: every running timer counts down
    /// by one, clamping at zero.
    pub fn tick(&mut self) {
        for slot in &mut self.slots {
            if *slot > 0 {
                *slot -= 1;
            }
        }
    }

    /// Whether a timer is currently counting down.
    #[must_use]
    pub fn is_running(&self, id: TimerId) -> bool {
        self.slots[id as usize] > 0
    }
}

/// Tick-pending flag shared between the tick source and the poll loop.
///
/// The tick source (a periodic interrupt, or a runtime interval task)
/// only raises the flag; all protocol work happens in loop context
/// when [`TickFlag::take`] observes it.
#[derive(Debug, Default)]
pub struct TickFlag(AtomicBool);

impl TickFlag {
    /// Create a lowered flag.
    #[must_use]
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Mark a tick as pending. Safe to call from interrupt context.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Consume a pending tick, returning whether one was pending.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}
