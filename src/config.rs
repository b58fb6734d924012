//! Startup configuration for a clock endpoint.

use crate::message::ClockQuality;
use crate::timer::PTP_TICK_RATE_HZ;

/// Configuration supplied when a port is created.
///
/// Intervals are log₂ seconds as carried in the `logMessageInterval`
/// header field (0 = 1 s, 1 = 2 s, −1 = 0.5 s).
#[derive(Debug, Clone)]
pub struct PtpConfig {
    /// MAC address the clock identity is derived from.
    pub mac_address: [u8; 6],
    /// PTP domain number.
    pub domain_number: u8,
    /// When true the best-master election never selects this clock as master.
    pub slave_only: bool,
    /// Send two-step Sync (`Follow_Up` carries the precise timestamp).
    pub two_step: bool,
    /// Own clock quality advertised in Announce messages.
    pub clock_quality: ClockQuality,
    /// Announce priority1 (lower wins).
    pub priority1: u8,
    /// Announce priority2.
    pub priority2: u8,
    /// Announce interval, log₂ seconds.
    pub log_announce_interval: i8,
    /// Sync interval, log₂ seconds.
    pub log_sync_interval: i8,
    /// Minimum `Delay_Req` interval, log₂ seconds.
    pub log_min_delay_req_interval: i8,
    /// Announce intervals without a master before the receipt timeout fires.
    pub announce_receipt_timeout: u8,
    /// Protocol tick rate driving the timer wheel, in Hz.
    pub tick_rate_hz: u32,
}

impl Default for PtpConfig {
    fn default() -> Self {
        Self {
            mac_address: [0; 6],
            domain_number: 0,
            slave_only: false,
            two_step: true,
            clock_quality: ClockQuality::default(),
            priority1: 128,
            priority2: 128,
            log_announce_interval: 1,
            log_sync_interval: 0,
            log_min_delay_req_interval: 0,
            announce_receipt_timeout: 3,
            tick_rate_hz: PTP_TICK_RATE_HZ,
        }
    }
}

impl PtpConfig {
    /// A slave-only preset: never master-capable, lowest priorities.
    #[must_use]
    pub fn slave_only(mac_address: [u8; 6]) -> Self {
        Self {
            mac_address,
            slave_only: true,
            clock_quality: ClockQuality {
                clock_class: 255,
                clock_accuracy: 0xFE,
                offset_scaled_log_variance: 0xFFFF,
            },
            priority1: 255,
            priority2: 255,
            ..Self::default()
        }
    }
}
