//! Shared fixtures for protocol tests: a controllable tick counter and
//! message builders.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::clock::TickCounter;
use crate::error::PtpError;
use crate::message::{AnnounceBody, ClockIdentity, ClockQuality, PortIdentity, PtpMessage};
use crate::timestamp::PtpTimestamp;

/// Tick counter whose value is driven by the test, one tick per
/// nanosecond. Cloning shares the underlying counter so a test can
/// advance time while the port owns the counter.
#[derive(Debug, Clone, Default)]
pub struct SimCounter(Arc<AtomicU64>);

impl SimCounter {
    pub fn new(start_ns: u64) -> Self {
        Self(Arc::new(AtomicU64::new(start_ns)))
    }

    pub fn advance(&self, delta_ns: u64) {
        self.0.fetch_add(delta_ns, Ordering::SeqCst);
    }

    pub fn set(&self, ns: u64) {
        self.0.store(ns, Ordering::SeqCst);
    }

    pub fn now_ns(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl TickCounter for SimCounter {
    fn init(&mut self) -> Result<(), PtpError> {
        Ok(())
    }

    fn read(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn write(&mut self, ticks: u64) {
        self.0.store(ticks, Ordering::SeqCst);
    }

    fn frequency_hz(&self) -> u64 {
        1_000_000_000
    }
}

/// Port identity for a remote clock with the identity byte repeated.
pub fn remote_port(id_byte: u8) -> PortIdentity {
    PortIdentity::new(ClockIdentity([id_byte; 8]), 1)
}

/// A default-quality Announce from the given sender, advertising
/// itself as grandmaster.
pub fn announce_from(sender: PortIdentity, priority1: u8, clock_class: u8) -> Vec<u8> {
    let body = AnnounceBody {
        origin_timestamp: PtpTimestamp::ZERO,
        current_utc_offset: 37,
        grandmaster_priority1: priority1,
        grandmaster_clock_quality: ClockQuality {
            clock_class,
            clock_accuracy: 0xFE,
            offset_scaled_log_variance: 0xFFFF,
        },
        grandmaster_priority2: 128,
        grandmaster_identity: sender.clock_identity,
        steps_removed: 0,
        time_source: 0x20,
    };
    PtpMessage::announce(sender, 0, body).encode()
}

/// A Sync from the given sender.
pub fn sync_from(sender: PortIdentity, sequence_id: u16, t1: PtpTimestamp, two_step: bool) -> Vec<u8> {
    let mut message = PtpMessage::sync(sender, sequence_id, t1);
    if two_step {
        message.header.flags |= crate::message::FLAG_TWO_STEP;
    }
    message.encode()
}

/// A `Follow_Up` from the given sender.
pub fn follow_up_from(sender: PortIdentity, sequence_id: u16, precise_t1: PtpTimestamp) -> Vec<u8> {
    PtpMessage::follow_up(sender, sequence_id, precise_t1).encode()
}
