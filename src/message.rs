//! PTP message types, parsing, and encoding.
//!
//! Implements the IEEE 1588-2008 message format: the common 34-byte
//! header plus the five message bodies an ordinary clock exchanges
//! (Sync, `Delay_Req`, `Follow_Up`, `Delay_Resp`, Announce). All wire
//! integers are big-endian and are read and written field-by-field
//! through a byte buffer — no host-alignment assumptions.

use byteorder::{BigEndian, ByteOrder};

use crate::timestamp::PtpTimestamp;

/// Supported PTP version.
pub const PTP_VERSION_2: u8 = 2;

/// Two-step flag in the header flags field.
pub const FLAG_TWO_STEP: u16 = 0x0200;

/// leap61 flag.
pub const FLAG_LEAP61: u16 = 0x0001;
/// leap59 flag.
pub const FLAG_LEAP59: u16 = 0x0002;
/// currentUtcOffsetValid flag.
pub const FLAG_UTC_OFFSET_VALID: u16 = 0x0004;
/// ptpTimescale flag.
pub const FLAG_PTP_TIMESCALE: u16 = 0x0008;
/// timeTraceable flag.
pub const FLAG_TIME_TRACEABLE: u16 = 0x0010;
/// frequencyTraceable flag.
pub const FLAG_FREQUENCY_TRACEABLE: u16 = 0x0020;

/// PTP message type identifiers (IEEE 1588 Section 13.3.2.2).
///
/// Only the five types an end-to-end ordinary clock handles are
/// represented; peer-delay, signaling, and management messages are
/// rejected by [`PtpMessageType::from_nibble`] and dropped upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PtpMessageType {
    /// Sync (master → slave), carries T1.
    Sync = 0x00,
    /// Delay request (slave → master), sent at T3.
    DelayReq = 0x01,
    /// Follow-up (master → slave), carries precise T1.
    FollowUp = 0x08,
    /// Delay response (master → slave), carries T4.
    DelayResp = 0x09,
    /// Announce (master → slave), grandmaster properties.
    Announce = 0x0B,
}

impl PtpMessageType {
    /// Parse from the lower 4 bits of a byte.
    pub fn from_nibble(value: u8) -> Result<Self, PtpParseError> {
        match value & 0x0F {
            0x00 => Ok(Self::Sync),
            0x01 => Ok(Self::DelayReq),
            0x08 => Ok(Self::FollowUp),
            0x09 => Ok(Self::DelayResp),
            0x0B => Ok(Self::Announce),
            other => Err(PtpParseError::UnknownMessageType(other)),
        }
    }

    /// Whether this message type is an event message (requires timestamping).
    #[must_use]
    pub fn is_event(&self) -> bool {
        matches!(self, Self::Sync | Self::DelayReq)
    }

    /// Whether this message type is a general message.
    #[must_use]
    pub fn is_general(&self) -> bool {
        !self.is_event()
    }

    /// The (deprecated but still transmitted) v1 control field value.
    #[must_use]
    pub fn control_field(&self) -> u8 {
        match self {
            Self::Sync => 0x00,
            Self::DelayReq => 0x01,
            Self::FollowUp => 0x02,
            Self::DelayResp => 0x03,
            Self::Announce => 0x05,
        }
    }
}

impl std::fmt::Display for PtpMessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync => write!(f, "Sync"),
            Self::DelayReq => write!(f, "Delay_Req"),
            Self::FollowUp => write!(f, "Follow_Up"),
            Self::DelayResp => write!(f, "Delay_Resp"),
            Self::Announce => write!(f, "Announce"),
        }
    }
}

/// PTP clock identity (EUI-64, 8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ClockIdentity(pub [u8; 8]);

impl ClockIdentity {
    /// Derive an EUI-64 identity from a 48-bit MAC address by inserting
    /// `FF FE` between the third and fourth byte.
    #[must_use]
    pub fn from_mac_address(mac: [u8; 6]) -> Self {
        Self([mac[0], mac[1], mac[2], 0xFF, 0xFE, mac[3], mac[4], mac[5]])
    }
}

impl std::fmt::Display for ClockIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// PTP port identity: 8-byte clock identity + 2-byte port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PortIdentity {
    /// Clock identity of the sending clock.
    pub clock_identity: ClockIdentity,
    /// Port number (1-based; 0 marks an unoccupied slot).
    pub port_number: u16,
}

impl PortIdentity {
    /// Wire size in bytes.
    pub const SIZE: usize = 10;

    /// Create a new port identity.
    #[must_use]
    pub fn new(clock_identity: ClockIdentity, port_number: u16) -> Self {
        Self {
            clock_identity,
            port_number,
        }
    }

    /// Encode as 10 bytes (8-byte clock identity + 2-byte port number, BE).
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(&self.clock_identity.0);
        BigEndian::write_u16(&mut buf[8..10], self.port_number);
        buf
    }

    /// Decode from 10 bytes.
    #[must_use]
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut id = [0u8; 8];
        id.copy_from_slice(&data[0..8]);
        Some(Self {
            clock_identity: ClockIdentity(id),
            port_number: BigEndian::read_u16(&data[8..10]),
        })
    }
}

/// Clock quality triple.
///
/// The derived ordering is lexicographic over (class, accuracy,
/// variance); lower values mean a better clock, which is exactly the
/// comparison order the best-master election uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockQuality {
    /// Clock class (248 = master-capable default, 255 = slave-only).
    pub clock_class: u8,
    /// Clock accuracy enumeration (0xFE = unknown).
    pub clock_accuracy: u8,
    /// Offset scaled log variance.
    pub offset_scaled_log_variance: u16,
}

impl Default for ClockQuality {
    fn default() -> Self {
        Self {
            clock_class: 248,
            clock_accuracy: 0xFE,
            offset_scaled_log_variance: 0xFFFF,
        }
    }
}

impl ClockQuality {
    /// Wire size in bytes.
    pub const SIZE: usize = 4;

    /// Encode as 4 bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.clock_class;
        buf[1] = self.clock_accuracy;
        BigEndian::write_u16(&mut buf[2..4], self.offset_scaled_log_variance);
        buf
    }

    /// Decode from 4 bytes.
    #[must_use]
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            clock_class: data[0],
            clock_accuracy: data[1],
            offset_scaled_log_variance: BigEndian::read_u16(&data[2..4]),
        })
    }
}

/// Common PTP message header (34 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PtpHeader {
    /// Message type (lower 4 bits of byte 0).
    pub message_type: PtpMessageType,
    /// PTP version (lower 4 bits of byte 1, always 2 here).
    pub version: u8,
    /// Total message length including the header.
    pub message_length: u16,
    /// Domain number.
    pub domain_number: u8,
    /// Flags field.
    pub flags: u16,
    /// Correction field (nanoseconds × 2¹⁶, signed).
    pub correction_field: i64,
    /// Source port identity.
    pub source_port_identity: PortIdentity,
    /// Sequence ID.
    pub sequence_id: u16,
    /// Control field (deprecated in v2, still transmitted).
    pub control_field: u8,
    /// Log message interval.
    pub log_message_interval: i8,
}

impl PtpHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 34;

    /// Create a new header with per-type defaults.
    ///
    /// `message_length` is filled in on encode.
    #[must_use]
    pub fn new(message_type: PtpMessageType, source: PortIdentity, sequence_id: u16) -> Self {
        Self {
            message_type,
            version: PTP_VERSION_2,
            message_length: 0,
            domain_number: 0,
            flags: 0,
            correction_field: 0,
            source_port_identity: source,
            sequence_id,
            control_field: message_type.control_field(),
            log_message_interval: 0x7F,
        }
    }

    /// Encode to 34 bytes; `body_length` determines the length field.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "message lengths are below 2^16 by construction; i8 reinterpreted as its wire byte"
    )]
    pub fn encode(&self, body_length: usize) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.message_type as u8 & 0x0F;
        buf[1] = self.version & 0x0F;
        BigEndian::write_u16(&mut buf[2..4], (Self::SIZE + body_length) as u16);
        buf[4] = self.domain_number;
        // byte 5 reserved
        BigEndian::write_u16(&mut buf[6..8], self.flags);
        BigEndian::write_i64(&mut buf[8..16], self.correction_field);
        // bytes 16-19 reserved
        buf[20..30].copy_from_slice(&self.source_port_identity.encode());
        BigEndian::write_u16(&mut buf[30..32], self.sequence_id);
        buf[32] = self.control_field;
        buf[33] = self.log_message_interval as u8;
        buf
    }

    /// Decode from bytes.
    ///
    /// Rejects truncated buffers, unknown message types, and any
    /// version other than 2.
    #[allow(
        clippy::cast_possible_wrap,
        reason = "log interval is a signed byte on the wire"
    )]
    pub fn decode(data: &[u8]) -> Result<Self, PtpParseError> {
        if data.len() < Self::SIZE {
            return Err(PtpParseError::TooShort {
                needed: Self::SIZE,
                have: data.len(),
            });
        }
        let message_type = PtpMessageType::from_nibble(data[0])?;
        let version = data[1] & 0x0F;
        if version != PTP_VERSION_2 {
            return Err(PtpParseError::UnsupportedVersion(version));
        }
        let source_port_identity =
            PortIdentity::decode(&data[20..30]).ok_or(PtpParseError::TooShort {
                needed: 30,
                have: data.len(),
            })?;
        Ok(Self {
            message_type,
            version,
            message_length: BigEndian::read_u16(&data[2..4]),
            domain_number: data[4],
            flags: BigEndian::read_u16(&data[6..8]),
            correction_field: BigEndian::read_i64(&data[8..16]),
            source_port_identity,
            sequence_id: BigEndian::read_u16(&data[30..32]),
            control_field: data[32],
            log_message_interval: data[33] as i8,
        })
    }

    /// Whether the two-step flag is set (a `Follow_Up` will carry the
    /// precise timestamp).
    #[must_use]
    pub fn is_two_step(&self) -> bool {
        (self.flags & FLAG_TWO_STEP) != 0
    }
}

/// Announce message body (30 bytes after the common header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnounceBody {
    /// Origin timestamp (zeroed on emit).
    pub origin_timestamp: PtpTimestamp,
    /// Current UTC offset in seconds.
    pub current_utc_offset: i16,
    /// Grandmaster priority1.
    pub grandmaster_priority1: u8,
    /// Grandmaster clock quality.
    pub grandmaster_clock_quality: ClockQuality,
    /// Grandmaster priority2.
    pub grandmaster_priority2: u8,
    /// Grandmaster clock identity.
    pub grandmaster_identity: ClockIdentity,
    /// Number of boundary clocks between this port and the grandmaster.
    pub steps_removed: u16,
    /// Time source of the grandmaster.
    pub time_source: u8,
}

impl AnnounceBody {
    /// Body size in bytes.
    pub const SIZE: usize = 30;

    /// Encode the body.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..10].copy_from_slice(&self.origin_timestamp.encode());
        BigEndian::write_i16(&mut buf[10..12], self.current_utc_offset);
        // byte 12 reserved
        buf[13] = self.grandmaster_priority1;
        buf[14..18].copy_from_slice(&self.grandmaster_clock_quality.encode());
        buf[18] = self.grandmaster_priority2;
        buf[19..27].copy_from_slice(&self.grandmaster_identity.0);
        BigEndian::write_u16(&mut buf[27..29], self.steps_removed);
        buf[29] = self.time_source;
        buf
    }

    /// Decode the body.
    #[must_use]
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let origin_timestamp = PtpTimestamp::decode(&data[0..10])?;
        let current_utc_offset = BigEndian::read_i16(&data[10..12]);
        let grandmaster_priority1 = data[13];
        let grandmaster_clock_quality = ClockQuality::decode(&data[14..18])?;
        let grandmaster_priority2 = data[18];
        let mut identity = [0u8; 8];
        identity.copy_from_slice(&data[19..27]);
        Some(Self {
            origin_timestamp,
            current_utc_offset,
            grandmaster_priority1,
            grandmaster_clock_quality,
            grandmaster_priority2,
            grandmaster_identity: ClockIdentity(identity),
            steps_removed: BigEndian::read_u16(&data[27..29]),
            time_source: data[29],
        })
    }
}

/// A parsed PTP message: header plus typed body.
#[derive(Debug, Clone)]
pub struct PtpMessage {
    /// Message header.
    pub header: PtpHeader,
    /// Message body.
    pub body: PtpMessageBody,
}

/// PTP message body variants.
#[derive(Debug, Clone)]
pub enum PtpMessageBody {
    /// Sync: origin timestamp (T1, approximate if two-step).
    Sync {
        /// Origin timestamp.
        origin_timestamp: PtpTimestamp,
    },
    /// Follow-up: precise origin timestamp (T1).
    FollowUp {
        /// Precise origin timestamp from the associated Sync.
        precise_origin_timestamp: PtpTimestamp,
    },
    /// Delay request: origin timestamp (T3, zeroed on emit).
    DelayReq {
        /// Origin timestamp.
        origin_timestamp: PtpTimestamp,
    },
    /// Delay response: receive timestamp (T4) and requesting port identity.
    DelayResp {
        /// When the master received the `Delay_Req`.
        receive_timestamp: PtpTimestamp,
        /// Port identity of the requester.
        requesting_port_identity: PortIdentity,
    },
    /// Announce: grandmaster properties.
    Announce(AnnounceBody),
}

impl PtpMessage {
    /// Body size for Sync / `Follow_Up` / `Delay_Req` (10-byte timestamp).
    pub const TIMESTAMP_BODY_SIZE: usize = 10;
    /// Body size for `Delay_Resp` (timestamp + port identity).
    pub const DELAY_RESP_BODY_SIZE: usize = 20;

    /// Total wire length of Sync / `Follow_Up` / `Delay_Req`.
    pub const TIMESTAMP_MESSAGE_LENGTH: usize = PtpHeader::SIZE + Self::TIMESTAMP_BODY_SIZE;
    /// Total wire length of `Delay_Resp`.
    pub const DELAY_RESP_MESSAGE_LENGTH: usize = PtpHeader::SIZE + Self::DELAY_RESP_BODY_SIZE;
    /// Total wire length of Announce.
    pub const ANNOUNCE_MESSAGE_LENGTH: usize = PtpHeader::SIZE + AnnounceBody::SIZE;

    /// Parse a complete PTP message from bytes.
    pub fn decode(data: &[u8]) -> Result<Self, PtpParseError> {
        let header = PtpHeader::decode(data)?;
        let body_data = &data[PtpHeader::SIZE..];

        let too_short = |needed: usize| PtpParseError::TooShort {
            needed: PtpHeader::SIZE + needed,
            have: data.len(),
        };

        let body = match header.message_type {
            PtpMessageType::Sync => PtpMessageBody::Sync {
                origin_timestamp: PtpTimestamp::decode(body_data)
                    .ok_or_else(|| too_short(Self::TIMESTAMP_BODY_SIZE))?,
            },
            PtpMessageType::FollowUp => PtpMessageBody::FollowUp {
                precise_origin_timestamp: PtpTimestamp::decode(body_data)
                    .ok_or_else(|| too_short(Self::TIMESTAMP_BODY_SIZE))?,
            },
            PtpMessageType::DelayReq => PtpMessageBody::DelayReq {
                origin_timestamp: PtpTimestamp::decode(body_data)
                    .ok_or_else(|| too_short(Self::TIMESTAMP_BODY_SIZE))?,
            },
            PtpMessageType::DelayResp => {
                let receive_timestamp = PtpTimestamp::decode(body_data)
                    .ok_or_else(|| too_short(Self::DELAY_RESP_BODY_SIZE))?;
                let requesting_port_identity = body_data
                    .get(10..20)
                    .and_then(PortIdentity::decode)
                    .ok_or_else(|| too_short(Self::DELAY_RESP_BODY_SIZE))?;
                PtpMessageBody::DelayResp {
                    receive_timestamp,
                    requesting_port_identity,
                }
            }
            PtpMessageType::Announce => PtpMessageBody::Announce(
                AnnounceBody::decode(body_data).ok_or_else(|| too_short(AnnounceBody::SIZE))?,
            ),
        };

        Ok(Self { header, body })
    }

    /// Encode to bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let body_bytes = self.encode_body();
        let header_bytes = self.header.encode(body_bytes.len());
        let mut buf = Vec::with_capacity(PtpHeader::SIZE + body_bytes.len());
        buf.extend_from_slice(&header_bytes);
        buf.extend_from_slice(&body_bytes);
        buf
    }

    fn encode_body(&self) -> Vec<u8> {
        match &self.body {
            PtpMessageBody::Sync { origin_timestamp }
            | PtpMessageBody::FollowUp {
                precise_origin_timestamp: origin_timestamp,
            }
            | PtpMessageBody::DelayReq { origin_timestamp } => {
                origin_timestamp.encode().to_vec()
            }
            PtpMessageBody::DelayResp {
                receive_timestamp,
                requesting_port_identity,
            } => {
                let mut buf = Vec::with_capacity(Self::DELAY_RESP_BODY_SIZE);
                buf.extend_from_slice(&receive_timestamp.encode());
                buf.extend_from_slice(&requesting_port_identity.encode());
                buf
            }
            PtpMessageBody::Announce(body) => body.encode().to_vec(),
        }
    }

    /// Create a Sync message.
    #[must_use]
    pub fn sync(source: PortIdentity, sequence_id: u16, timestamp: PtpTimestamp) -> Self {
        let mut header = PtpHeader::new(PtpMessageType::Sync, source, sequence_id);
        header.log_message_interval = 0;
        Self {
            header,
            body: PtpMessageBody::Sync {
                origin_timestamp: timestamp,
            },
        }
    }

    /// Create a Follow-up message.
    #[must_use]
    pub fn follow_up(
        source: PortIdentity,
        sequence_id: u16,
        precise_timestamp: PtpTimestamp,
    ) -> Self {
        let mut header = PtpHeader::new(PtpMessageType::FollowUp, source, sequence_id);
        header.log_message_interval = 0;
        Self {
            header,
            body: PtpMessageBody::FollowUp {
                precise_origin_timestamp: precise_timestamp,
            },
        }
    }

    /// Create a Delay request message.
    ///
    /// The origin timestamp is zeroed on the wire; the sender records
    /// the actual egress time locally.
    #[must_use]
    pub fn delay_req(source: PortIdentity, sequence_id: u16) -> Self {
        Self {
            header: PtpHeader::new(PtpMessageType::DelayReq, source, sequence_id),
            body: PtpMessageBody::DelayReq {
                origin_timestamp: PtpTimestamp::ZERO,
            },
        }
    }

    /// Create a Delay response message echoing the requester.
    #[must_use]
    pub fn delay_resp(
        source: PortIdentity,
        sequence_id: u16,
        receive_timestamp: PtpTimestamp,
        requesting_port: PortIdentity,
    ) -> Self {
        Self {
            header: PtpHeader::new(PtpMessageType::DelayResp, source, sequence_id),
            body: PtpMessageBody::DelayResp {
                receive_timestamp,
                requesting_port_identity: requesting_port,
            },
        }
    }

    /// Create an Announce message.
    #[must_use]
    pub fn announce(source: PortIdentity, sequence_id: u16, body: AnnounceBody) -> Self {
        Self {
            header: PtpHeader::new(PtpMessageType::Announce, source, sequence_id),
            body: PtpMessageBody::Announce(body),
        }
    }
}

/// Errors from PTP message parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PtpParseError {
    /// Packet too short for its message type.
    #[error("packet too short: need {needed} bytes, have {have}")]
    TooShort {
        /// Minimum bytes needed.
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },
    /// Message type outside the end-to-end ordinary-clock set.
    #[error("unknown PTP message type: 0x{0:02X}")]
    UnknownMessageType(u8),
    /// Version field other than 2.
    #[error("unsupported PTP version: {0}")]
    UnsupportedVersion(u8),
}
