//! The four PTP data sets an ordinary clock maintains.
//!
//! These mirror IEEE 1588-2008 Tables 8–11. The clock owns all four as
//! plain records for its whole lifetime; nothing is shared or boxed.

use crate::config::PtpConfig;
use crate::message::{ClockIdentity, ClockQuality, PortIdentity, PTP_VERSION_2};
use crate::port::PortState;

/// Time source: internal oscillator (no external reference).
pub const TIME_SOURCE_INTERNAL_OSCILLATOR: u8 = 0xA0;

/// Static attributes of the local clock (Table 8).
#[derive(Debug, Clone)]
pub struct DefaultDS {
    /// Whether this clock emits two-step Sync.
    pub two_step: bool,
    /// Own clock identity (EUI-64 from the MAC address).
    pub clock_identity: ClockIdentity,
    /// Number of PTP ports (always 1 for an ordinary clock).
    pub number_of_ports: u16,
    /// Own clock quality.
    pub clock_quality: ClockQuality,
    /// Own priority1.
    pub priority1: u8,
    /// Own priority2.
    pub priority2: u8,
    /// Domain this clock participates in.
    pub domain_number: u8,
    /// When true the clock never becomes master.
    pub slave_only: bool,
}

impl DefaultDS {
    /// Build from startup configuration.
    #[must_use]
    pub fn from_config(config: &PtpConfig) -> Self {
        Self {
            two_step: config.two_step,
            clock_identity: ClockIdentity::from_mac_address(config.mac_address),
            number_of_ports: 1,
            clock_quality: config.clock_quality,
            priority1: config.priority1,
            priority2: config.priority2,
            domain_number: config.domain_number,
            slave_only: config.slave_only,
        }
    }
}

/// Per-port attributes and state (Table 10).
#[derive(Debug, Clone)]
pub struct PortDS {
    /// Identity of this port (clock identity + port number 1).
    pub port_identity: PortIdentity,
    /// Current state of the port state machine.
    pub port_state: PortState,
    /// Announce interval, log₂ seconds.
    pub log_announce_interval: i8,
    /// Sync interval, log₂ seconds.
    pub log_sync_interval: i8,
    /// Minimum `Delay_Req` interval, log₂ seconds.
    pub log_min_delay_req_interval: i8,
    /// Announce intervals without a master before the timeout fires.
    pub announce_receipt_timeout: u8,
    /// Delay mechanism (always end-to-end here).
    pub delay_mechanism: DelayMechanism,
    /// PTP version number.
    pub version_number: u8,
}

/// Path delay measurement mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayMechanism {
    /// End-to-end delay request-response.
    E2E,
}

impl PortDS {
    /// Build from startup configuration.
    #[must_use]
    pub fn from_config(config: &PtpConfig) -> Self {
        Self {
            port_identity: PortIdentity::new(
                ClockIdentity::from_mac_address(config.mac_address),
                1,
            ),
            port_state: PortState::Initializing,
            log_announce_interval: config.log_announce_interval,
            log_sync_interval: config.log_sync_interval,
            log_min_delay_req_interval: config.log_min_delay_req_interval,
            announce_receipt_timeout: config.announce_receipt_timeout,
            delay_mechanism: DelayMechanism::E2E,
            version_number: PTP_VERSION_2,
        }
    }

    /// Announce interval in milliseconds.
    #[must_use]
    pub fn announce_interval_ms(&self) -> u32 {
        log_interval_to_ms(self.log_announce_interval)
    }

    /// Sync interval in milliseconds.
    #[must_use]
    pub fn sync_interval_ms(&self) -> u32 {
        log_interval_to_ms(self.log_sync_interval)
    }

    /// `Delay_Req` interval in milliseconds.
    #[must_use]
    pub fn delay_req_interval_ms(&self) -> u32 {
        log_interval_to_ms(self.log_min_delay_req_interval)
    }

    /// Announce receipt timeout in milliseconds.
    #[must_use]
    pub fn announce_receipt_timeout_ms(&self) -> u32 {
        u32::from(self.announce_receipt_timeout) * self.announce_interval_ms()
    }
}

/// Convert a log₂-seconds interval to milliseconds.
///
/// The exponent is clamped so the shift stays in range; anything that
/// would round to zero becomes one millisecond.
#[must_use]
pub fn log_interval_to_ms(log_interval: i8) -> u32 {
    let clamped = log_interval.clamp(-9, 21);
    if clamped >= 0 {
        1000u32 << clamped
    } else {
        (1000u32 >> (-clamped)).max(1)
    }
}

/// Attributes of the elected parent and grandmaster (Table 9).
#[derive(Debug, Clone)]
pub struct ParentDS {
    /// Port identity of the parent (the master this port listens to).
    pub parent_port_identity: PortIdentity,
    /// Grandmaster clock identity.
    pub grandmaster_identity: ClockIdentity,
    /// Grandmaster clock quality.
    pub grandmaster_clock_quality: ClockQuality,
    /// Grandmaster priority1.
    pub grandmaster_priority1: u8,
    /// Grandmaster priority2.
    pub grandmaster_priority2: u8,
}

impl ParentDS {
    /// A parent data set describing the local clock itself: the state
    /// before any master is known, and the state while master.
    #[must_use]
    pub fn new_self(default_ds: &DefaultDS) -> Self {
        Self {
            parent_port_identity: PortIdentity::new(default_ds.clock_identity, 0),
            grandmaster_identity: default_ds.clock_identity,
            grandmaster_clock_quality: default_ds.clock_quality,
            grandmaster_priority1: default_ds.priority1,
            grandmaster_priority2: default_ds.priority2,
        }
    }

    /// Whether a remote parent has been elected yet.
    #[must_use]
    pub fn has_remote_parent(&self) -> bool {
        self.parent_port_identity.port_number != 0
    }
}

/// Timescale properties of the grandmaster (Table 11).
#[derive(Debug, Clone)]
pub struct TimePropertiesDS {
    /// Offset between TAI and UTC in seconds.
    pub current_utc_offset: i16,
    /// Whether `current_utc_offset` is known to be correct.
    pub current_utc_offset_valid: bool,
    /// The last minute of the day has 59 seconds.
    pub leap59: bool,
    /// The last minute of the day has 61 seconds.
    pub leap61: bool,
    /// Time is traceable to a primary reference.
    pub time_traceable: bool,
    /// Frequency is traceable to a primary reference.
    pub frequency_traceable: bool,
    /// The timescale is PTP (TAI) rather than arbitrary.
    pub ptp_timescale: bool,
    /// Source of time of the grandmaster.
    pub time_source: u8,
}

impl Default for TimePropertiesDS {
    fn default() -> Self {
        Self {
            current_utc_offset: 0,
            current_utc_offset_valid: false,
            leap59: false,
            leap61: false,
            time_traceable: false,
            frequency_traceable: false,
            ptp_timescale: true,
            time_source: TIME_SOURCE_INTERNAL_OSCILLATOR,
        }
    }
}
