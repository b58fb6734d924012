//! Local clock: tick counter abstraction and the software clock on top.
//!
//! The hardware side is a free-running 64-bit monotonic counter with a
//! known frequency. The software clock turns counter reads into
//! [`TimeInternal`] values and supports two correction paths: a hard
//! step (counter rewrite) and a continuous slew (software offset).

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::error::PtpError;
use crate::timestamp::TimeInternal;

/// A free-running 64-bit monotonic tick counter.
///
/// Implementations must guarantee that `read` is monotonic while the
/// counter runs, and that a single `read` returns a consistent value
/// even when the underlying hardware exposes the counter as two 32-bit
/// registers (see [`read_split_counter`]).
pub trait TickCounter {
    /// Start the counter. Called once before any other operation.
    ///
    /// # Errors
    /// Returns [`PtpError::Hardware`] when the counter cannot be started.
    fn init(&mut self) -> Result<(), PtpError>;

    /// Read the current tick count.
    fn read(&self) -> u64;

    /// Stop the counter, load a new value, and restart it.
    fn write(&mut self, ticks: u64);

    /// Counter frequency in ticks per second.
    fn frequency_hz(&self) -> u64;
}

/// A counter exposed as two 32-bit halves that cannot be read atomically.
pub trait SplitRegisters {
    /// Read the high 32 bits.
    fn read_high(&self) -> u32;
    /// Read the low 32 bits.
    fn read_low(&self) -> u32;
}

/// Consistent 64-bit read over split 32-bit registers.
///
/// Reads high, then low, then high again, retrying whenever the high
/// word rolled over between the two high reads.
#[must_use]
pub fn read_split_counter<R: SplitRegisters>(regs: &R) -> u64 {
    loop {
        let high = regs.read_high();
        let low = regs.read_low();
        if regs.read_high() == high {
            return (u64::from(high) << 32) | u64::from(low);
        }
    }
}

/// Hosted tick counter backed by [`Instant`] at nanosecond resolution.
///
/// The counter base is seeded from the Unix epoch at `init` so that
/// `get_time` starts out as wall-clock time; masters and free-running
/// clocks then advertise a meaningful epoch.
#[derive(Debug)]
pub struct SystemTickCounter {
    origin: Instant,
    base_ticks: u64,
}

impl SystemTickCounter {
    /// Nominal frequency: one tick per nanosecond.
    pub const FREQUENCY_HZ: u64 = 1_000_000_000;

    /// Create a counter; ticks start at zero until `init` seeds the base.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            base_ticks: 0,
        }
    }
}

impl Default for SystemTickCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TickCounter for SystemTickCounter {
    fn init(&mut self) -> Result<(), PtpError> {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| PtpError::Hardware("system time before Unix epoch"))?;
        self.base_ticks = u64::try_from(since_epoch.as_nanos())
            .map_err(|_| PtpError::Hardware("system time out of counter range"))?;
        self.origin = Instant::now();
        Ok(())
    }

    fn read(&self) -> u64 {
        let elapsed = self.origin.elapsed().as_nanos();
        self.base_ticks
            .wrapping_add(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }

    fn write(&mut self, ticks: u64) {
        self.base_ticks = ticks;
        self.origin = Instant::now();
    }

    fn frequency_hz(&self) -> u64 {
        Self::FREQUENCY_HZ
    }
}

/// Software clock over a tick counter.
///
/// `get_time` is strictly increasing across successive calls separated
/// by real time, unless interrupted by `set_time` or an out-of-range
/// slew.
#[derive(Debug)]
pub struct LocalClock<C: TickCounter> {
    counter: C,
    software_offset_ns: i64,
}

impl<C: TickCounter> LocalClock<C> {
    /// Initialize the counter and wrap it in a clock.
    ///
    /// # Errors
    /// Propagates [`PtpError::Hardware`] from counter initialization.
    pub fn new(mut counter: C) -> Result<Self, PtpError> {
        counter.init()?;
        Ok(Self {
            counter,
            software_offset_ns: 0,
        })
    }

    /// Read the current time: counter ticks scaled to nanoseconds plus
    /// the software offset.
    #[must_use]
    #[allow(
        clippy::cast_possible_wrap,
        reason = "counter nanoseconds stay far below i128::MAX"
    )]
    pub fn get_time(&self) -> TimeInternal {
        let ticks = u128::from(self.counter.read());
        let hz = u128::from(self.counter.frequency_hz());
        let raw_ns = ticks * 1_000_000_000 / hz;
        TimeInternal::from_nanos(raw_ns as i128 + i128::from(self.software_offset_ns))
    }

    /// Hard step: rewrite the counter to the given time and zero the
    /// software offset.
    #[allow(
        clippy::cast_sign_loss,
        clippy::cast_possible_truncation,
        reason = "clamped non-negative and bounded by the counter range"
    )]
    pub fn set_time(&mut self, time: TimeInternal) {
        let total_ns = time.normalized().total_nanos().max(0);
        let hz = u128::from(self.counter.frequency_hz());
        let ticks = (total_ns as u128 * hz / 1_000_000_000) as u64;
        self.counter.write(ticks);
        self.software_offset_ns = 0;
    }

    /// Slew: fold `delta_ns` into the software offset so subsequent
    /// reads incorporate it continuously.
    pub fn adj_time(&mut self, delta_ns: i32) {
        self.software_offset_ns = self.software_offset_ns.saturating_add(i64::from(delta_ns));
    }

    /// Current software offset in nanoseconds.
    #[must_use]
    pub fn software_offset_ns(&self) -> i64 {
        self.software_offset_ns
    }

    /// Access the underlying counter.
    #[must_use]
    pub fn counter(&self) -> &C {
        &self.counter
    }
}
