//! Clock servo: offset/delay filtering and the PI controller that
//! steers the local clock.
//!
//! The controller works entirely in signed 32-bit nanoseconds with
//! saturation; the 1/2 proportional and 1/8 integral gains are
//! deliberate fixed-point choices, and the integral term is clamped to
//! [`ADJ_FREQ_MAX`] to prevent wind-up. Offsets beyond the slew range
//! are corrected with a hard step, the only path that resets servo
//! state.

use crate::clock::{LocalClock, TickCounter};
use crate::timestamp::TimeInternal;

/// Maximum magnitude of the accumulated drift term, in ns per update.
pub const ADJ_FREQ_MAX: i32 = 500_000;

/// Offsets above this magnitude (10 ms) are stepped instead of slewed.
pub const OFFSET_STEP_THRESHOLD_NS: i32 = 10_000_000;

/// Exponential smoothing filter with an adaptive window.
///
/// The effective shift grows with the sample count (`⌊log₂ n⌋`) until
/// it reaches the configured maximum, so early samples pass through
/// quickly and the window widens as the estimate settles.
#[derive(Debug, Clone)]
pub struct OffsetFilter {
    n: u32,
    s: u32,
    y: i32,
}

impl OffsetFilter {
    /// Default maximum smoothing shift.
    pub const DEFAULT_SHIFT: u32 = 4;

    /// Create a fresh filter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            n: 0,
            s: Self::DEFAULT_SHIFT,
            y: 0,
        }
    }

    /// Feed one sample and return the smoothed value.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "the smoothed value is a convex combination of i32 samples"
    )]
    pub fn feed(&mut self, sample: i32) -> i32 {
        self.n = self.n.saturating_add(1);
        let log2_n = 31 - self.n.leading_zeros();
        let shift = self.s.min(log2_n);
        let weighted =
            i64::from(self.y) * ((1i64 << shift) - 1) + i64::from(sample);
        self.y = (weighted >> shift) as i32;
        self.y
    }

    /// Discard history; the next sample passes through unsmoothed.
    pub fn reset(&mut self) {
        self.n = 0;
        self.y = 0;
    }

    /// Number of samples seen since the last reset.
    #[must_use]
    pub fn sample_count(&self) -> u32 {
        self.n
    }

    /// Current smoothed value.
    #[must_use]
    pub fn value(&self) -> i32 {
        self.y
    }
}

impl Default for OffsetFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a servo update slewed or stepped the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoAction {
    /// The clock was slewed by the given (signed) adjustment.
    Slewed(i32),
    /// The offset exceeded the slew range; the clock was stepped and
    /// the servo reinitialized.
    Stepped,
}

/// PI servo tracking offset-from-master and mean path delay.
#[derive(Debug)]
pub struct ClockServo {
    offset_from_master: TimeInternal,
    mean_path_delay: TimeInternal,
    /// T1 of the last Sync (precise value once `Follow_Up` arrives).
    sync_origin_time: TimeInternal,
    /// T2, local ingress time of the last Sync.
    sync_ingress_time: TimeInternal,
    /// Whether a Sync has been cached since the last reset.
    sync_cached: bool,
    observed_drift: i32,
    offset_filter: OffsetFilter,
    delay_filter: OffsetFilter,
}

impl ClockServo {
    /// Create a servo in its initial state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            offset_from_master: TimeInternal::ZERO,
            mean_path_delay: TimeInternal::ZERO,
            sync_origin_time: TimeInternal::ZERO,
            sync_ingress_time: TimeInternal::ZERO,
            sync_cached: false,
            observed_drift: 0,
            offset_filter: OffsetFilter::new(),
            delay_filter: OffsetFilter::new(),
        }
    }

    /// Reset all estimates, filters, and the drift accumulator.
    pub fn init(&mut self) {
        *self = Self::new();
    }

    /// Process a completed Sync: `t1` is the master's origin timestamp,
    /// `t2` the local ingress time. Both are cached for the next path
    /// delay measurement.
    pub fn update_offset(&mut self, t1: TimeInternal, t2: TimeInternal) {
        self.sync_origin_time = t1;
        self.sync_ingress_time = t2;
        self.sync_cached = true;

        let mut offset = (t2 - t1) - self.mean_path_delay;
        if offset.seconds == 0 {
            offset.nanoseconds = self.offset_filter.feed(offset.nanoseconds);
        } else {
            // A whole-second offset means the clock jumped; smoothing
            // across the jump would poison the estimate.
            self.offset_filter.reset();
        }
        self.offset_from_master = offset;

        tracing::debug!(
            offset = %self.offset_from_master,
            path_delay = %self.mean_path_delay,
            "servo offset update"
        );
    }

    /// Process a completed delay exchange: `t3` is the local
    /// `Delay_Req` egress time, `t4` the master's ingress time.
    ///
    /// The master-to-slave leg is taken from the cached Sync
    /// timestamps, the slave-to-master leg from this exchange.
    pub fn update_delay(&mut self, t3: TimeInternal, t4: TimeInternal) {
        if !self.sync_cached {
            // The master-to-slave leg needs a Sync on the current
            // timescale; after a step the cached one is stale.
            tracing::debug!("no cached sync, skipping delay update");
            return;
        }
        let master_to_slave = self.sync_ingress_time - self.sync_origin_time;
        let slave_to_master = t4 - t3;
        let mut delay = (master_to_slave + slave_to_master).halved();
        if delay.seconds == 0 {
            delay.nanoseconds = self.delay_filter.feed(delay.nanoseconds);
        } else {
            self.delay_filter.reset();
        }
        self.mean_path_delay = delay;

        tracing::debug!(path_delay = %self.mean_path_delay, "servo delay update");
    }

    /// Apply the current offset estimate to the clock.
    ///
    /// Offsets outside the slew range produce a hard step and a servo
    /// reinitialization; everything else feeds the PI controller and
    /// slews.
    pub fn update_clock<C: TickCounter>(&mut self, clock: &mut LocalClock<C>) -> ServoAction {
        let offset = self.offset_from_master;

        if offset.seconds != 0 || offset.nanoseconds.abs() > OFFSET_STEP_THRESHOLD_NS {
            let now = clock.get_time();
            clock.set_time(now - offset);
            tracing::warn!(offset = %offset, "offset beyond slew range, stepping clock");
            self.init();
            return ServoAction::Stepped;
        }

        let offset_ns = offset.nanoseconds;
        self.observed_drift = self
            .observed_drift
            .saturating_add(offset_ns / 8)
            .clamp(-ADJ_FREQ_MAX, ADJ_FREQ_MAX);
        let adj = (offset_ns / 2).saturating_add(self.observed_drift);
        clock.adj_time(adj.saturating_neg());

        tracing::debug!(adj, drift = self.observed_drift, "servo slew");
        ServoAction::Slewed(adj)
    }

    /// Current offset from master.
    #[must_use]
    pub fn offset_from_master(&self) -> TimeInternal {
        self.offset_from_master
    }

    /// Current mean path delay.
    #[must_use]
    pub fn mean_path_delay(&self) -> TimeInternal {
        self.mean_path_delay
    }

    /// Current accumulated drift term.
    #[must_use]
    pub fn observed_drift(&self) -> i32 {
        self.observed_drift
    }

    /// Number of offset samples accepted since the last reset.
    #[must_use]
    pub fn offset_sample_count(&self) -> u32 {
        self.offset_filter.sample_count()
    }
}

impl Default for ClockServo {
    fn default() -> Self {
        Self::new()
    }
}
