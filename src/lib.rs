//! # ptpsync
//!
//! A pure Rust IEEE 1588-2008 (PTPv2) ordinary-clock endpoint.
//!
//! The crate implements the core of a single-port PTP clock over
//! IPv4/UDP multicast: the bit-exact wire codec, the Best Master Clock
//! election with foreign-master bookkeeping, the port state machine,
//! and a PI servo that slews or steps a local clock toward the elected
//! grandmaster.
//!
//! ## Clock synchronization flow
//!
//! ```text
//! Master                          Slave
//!   |--- Sync (T1) ----------------->|  (slave records T2)
//!   |--- Follow_Up (precise T1) ---->|
//!   |                                |
//!   |<---- Delay_Req (T3) ---------- |
//!   |---- Delay_Resp (T4) --------->|
//!   |                                |
//!   |  offset = (T2 - T1) - delay   |
//!   |  delay = ((T2-T1)+(T4-T3))/2  |
//! ```
//!
//! ## Architecture
//!
//! The protocol core ([`Port`]) is synchronous and performs no I/O:
//! packets go in through [`Port::handle_message`], the periodic tick
//! through [`Port::protocol_tick`], and encoded messages come back out
//! of an outbound queue. The `net` module (behind the default
//! `tokio-runtime` feature) supplies the UDP multicast transport and a
//! single-task run loop on top.
//!
//! ## Example
//!
//! ```rust,no_run
//! use ptpsync::{Port, PtpConfig, SystemTickCounter};
//! use ptpsync::net::UdpTransport;
//!
//! # async fn example() -> Result<(), ptpsync::PtpError> {
//! let config = PtpConfig::slave_only([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
//! let mut port = Port::new(&config, SystemTickCounter::new())?;
//! let transport = UdpTransport::bind("192.168.1.10".parse().unwrap()).await?;
//!
//! let (_tx, rx) = tokio::sync::watch::channel(false);
//! ptpsync::net::run(&mut port, &transport, rx).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bmc;
pub mod clock;
pub mod config;
pub mod datasets;
pub mod error;
pub mod message;
pub mod port;
pub mod servo;
pub mod timer;
pub mod timestamp;

#[cfg(feature = "tokio-runtime")]
pub mod net;

#[cfg(test)]
mod tests;

// Re-exports for convenient access.
pub use clock::{LocalClock, SystemTickCounter, TickCounter};
pub use config::PtpConfig;
pub use error::PtpError;
pub use message::{
    ClockIdentity, ClockQuality, PortIdentity, PtpHeader, PtpMessage, PtpMessageBody,
    PtpMessageType, PtpParseError,
};
pub use port::{Port, PortState, PortStats};
pub use servo::{ClockServo, ServoAction};
pub use timer::{TickFlag, TimerId, TimerWheel};
pub use timestamp::{PtpTimestamp, TimeInternal};
