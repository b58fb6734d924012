use std::cell::Cell;

use super::support::SimCounter;
use crate::clock::{read_split_counter, LocalClock, SplitRegisters};
use crate::timestamp::TimeInternal;

// ===== LocalClock =====

#[test]
fn test_get_time_scales_ticks() {
    let counter = SimCounter::new(2_500_000_000);
    let clock = LocalClock::new(counter).unwrap();
    assert_eq!(clock.get_time(), TimeInternal::new(2, 500_000_000));
}

#[test]
fn test_get_time_monotonic_while_running() {
    let counter = SimCounter::new(0);
    let handle = counter.clone();
    let clock = LocalClock::new(counter).unwrap();

    let first = clock.get_time();
    handle.advance(1);
    let second = clock.get_time();
    assert!(second.total_nanos() > first.total_nanos());
}

#[test]
fn test_adj_time_slews_subsequent_reads() {
    let counter = SimCounter::new(1_000_000_000);
    let mut clock = LocalClock::new(counter).unwrap();

    clock.adj_time(-250);
    assert_eq!(clock.software_offset_ns(), -250);
    assert_eq!(clock.get_time().total_nanos(), 1_000_000_000 - 250);

    clock.adj_time(-250);
    assert_eq!(clock.software_offset_ns(), -500);
}

#[test]
fn test_set_time_steps_and_zeroes_offset() {
    let counter = SimCounter::new(7_000_000_000);
    let handle = counter.clone();
    let mut clock = LocalClock::new(counter).unwrap();
    clock.adj_time(123);

    clock.set_time(TimeInternal::new(100, 42));

    assert_eq!(clock.software_offset_ns(), 0);
    assert_eq!(handle.now_ns(), 100_000_000_042);
    assert_eq!(clock.get_time(), TimeInternal::new(100, 42));
}

#[test]
fn test_set_time_negative_clamps_to_zero() {
    let counter = SimCounter::new(5);
    let mut clock = LocalClock::new(counter).unwrap();
    clock.set_time(TimeInternal::new(-3, 0));
    assert_eq!(clock.get_time(), TimeInternal::ZERO);
}

// ===== Split-register reads =====

/// Registers that roll the high word over on the first low read,
/// emulating a carry racing the bus.
struct RollingRegisters {
    reads: Cell<u32>,
}

impl SplitRegisters for RollingRegisters {
    fn read_high(&self) -> u32 {
        let n = self.reads.get();
        self.reads.set(n + 1);
        // First high read sees the pre-carry value, every later read
        // the post-carry value.
        if n == 0 { 0x0000_0001 } else { 0x0000_0002 }
    }

    fn read_low(&self) -> u32 {
        0x0000_0010
    }
}

#[test]
fn test_split_read_retries_on_high_rollover() {
    let regs = RollingRegisters {
        reads: Cell::new(0),
    };
    let value = read_split_counter(&regs);
    // The first attempt (high=1, then high=2) is discarded; the retry
    // reads a stable high word.
    assert_eq!(value, 0x0000_0002_0000_0010);
}

/// Stable registers return on the first attempt.
struct StableRegisters;

impl SplitRegisters for StableRegisters {
    fn read_high(&self) -> u32 {
        0xDEAD
    }

    fn read_low(&self) -> u32 {
        0xBEEF
    }
}

#[test]
fn test_split_read_stable() {
    assert_eq!(read_split_counter(&StableRegisters), 0x0000_DEAD_0000_BEEF);
}
