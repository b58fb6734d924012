//! UDP transport: PTP multicast sockets and the endpoint run loop.
//!
//! Standard PTP over IPv4 uses two UDP ports on the primary multicast
//! group `224.0.1.129`:
//!
//! - **319**: event messages (Sync, `Delay_Req`) — timestamped on receipt.
//! - **320**: general messages (`Follow_Up`, `Delay_Resp`, Announce).
//!
//! The run loop is a single task: it interleaves receiving on both
//! sockets, driving the protocol tick, and flushing the port's
//! outbound queue. Handlers run to completion between awaits, so the
//! protocol core never sees concurrent access.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::clock::TickCounter;
use crate::error::PtpError;
use crate::port::{Outbound, Port, TransportClass};
use crate::timer::TickFlag;

/// Standard PTP event port (Sync, `Delay_Req`).
pub const PTP_EVENT_PORT: u16 = 319;

/// Standard PTP general port (`Follow_Up`, `Delay_Resp`, Announce).
pub const PTP_GENERAL_PORT: u16 = 320;

/// Primary PTP multicast group.
pub const PTP_PRIMARY_MULTICAST: Ipv4Addr = Ipv4Addr::new(224, 0, 1, 129);

/// Peer-delay multicast group. Joined for completeness; the end-to-end
/// delay mechanism never sends to it.
pub const PTP_PEER_MULTICAST: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 107);

/// Receive buffer size. The largest handled message (Announce) is 64
/// bytes; oversized datagrams are truncated and dropped by the codec.
const RECV_BUF_SIZE: usize = 256;

/// The pair of PTP multicast sockets.
pub struct UdpTransport {
    event_socket: UdpSocket,
    general_socket: UdpSocket,
    event_target: SocketAddrV4,
    general_target: SocketAddrV4,
}

impl UdpTransport {
    /// Bind the standard PTP ports and join the multicast groups on
    /// the given interface.
    ///
    /// # Errors
    /// Returns [`PtpError::Transport`] when binding or joining fails;
    /// the caller should treat this as fatal and fault the port.
    pub async fn bind(interface: Ipv4Addr) -> Result<Self, PtpError> {
        Self::bind_with_ports(interface, PTP_EVENT_PORT, PTP_GENERAL_PORT).await
    }

    /// Bind on non-standard ports (loopback tests).
    ///
    /// # Errors
    /// Returns [`PtpError::Transport`] when binding or joining fails.
    pub async fn bind_with_ports(
        interface: Ipv4Addr,
        event_port: u16,
        general_port: u16,
    ) -> Result<Self, PtpError> {
        let event_socket = Self::multicast_socket(interface, event_port, "event bind").await?;
        let general_socket =
            Self::multicast_socket(interface, general_port, "general bind").await?;
        Ok(Self {
            event_socket,
            general_socket,
            event_target: SocketAddrV4::new(PTP_PRIMARY_MULTICAST, event_port),
            general_target: SocketAddrV4::new(PTP_PRIMARY_MULTICAST, general_port),
        })
    }

    async fn multicast_socket(
        interface: Ipv4Addr,
        port: u16,
        op: &'static str,
    ) -> Result<UdpSocket, PtpError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map_err(|e| PtpError::transport(op, e))?;
        socket
            .join_multicast_v4(PTP_PRIMARY_MULTICAST, interface)
            .map_err(|e| PtpError::transport("primary multicast join", e))?;
        socket
            .join_multicast_v4(PTP_PEER_MULTICAST, interface)
            .map_err(|e| PtpError::transport("peer multicast join", e))?;
        Ok(socket)
    }

    /// Send an event message to the primary multicast group.
    ///
    /// # Errors
    /// Returns [`PtpError::Transport`] on send failure.
    pub async fn send_event(&self, payload: &[u8]) -> Result<(), PtpError> {
        self.event_socket
            .send_to(payload, self.event_target)
            .await
            .map_err(|e| PtpError::transport("event send", e))?;
        Ok(())
    }

    /// Send a general message to the primary multicast group.
    ///
    /// # Errors
    /// Returns [`PtpError::Transport`] on send failure.
    pub async fn send_general(&self, payload: &[u8]) -> Result<(), PtpError> {
        self.general_socket
            .send_to(payload, self.general_target)
            .await
            .map_err(|e| PtpError::transport("general send", e))?;
        Ok(())
    }

    async fn flush(&self, queued: Vec<Outbound>) -> Result<(), PtpError> {
        for outbound in queued {
            match outbound.class {
                TransportClass::Event => self.send_event(&outbound.payload).await?,
                TransportClass::General => self.send_general(&outbound.payload).await?,
            }
        }
        Ok(())
    }
}

/// Drive a port over the transport until shutdown.
///
/// A single cooperative loop: received packets are dispatched to the
/// port, the tick interval raises the tick flag and the loop consumes
/// it by running `protocol_tick`, and the outbound queue is flushed
/// after every step. A transport failure faults the port and returns.
///
/// # Errors
/// Returns [`PtpError::Transport`] when sending or receiving fails.
pub async fn run<C: TickCounter>(
    port: &mut Port<C>,
    transport: &UdpTransport,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> Result<(), PtpError> {
    let mut event_buf = [0u8; RECV_BUF_SIZE];
    let mut general_buf = [0u8; RECV_BUF_SIZE];
    let tick_flag = TickFlag::new();
    let tick_period = Duration::from_millis(1000 / u64::from(crate::timer::PTP_TICK_RATE_HZ));
    let mut tick = tokio::time::interval(tick_period);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!("endpoint run loop starting");

    loop {
        tokio::select! {
            result = transport.event_socket.recv_from(&mut event_buf) => {
                let (len, _src) = result.map_err(|e| {
                    port.fault();
                    PtpError::transport("event recv", e)
                })?;
                port.handle_message(&event_buf[..len]);
            }

            result = transport.general_socket.recv_from(&mut general_buf) => {
                let (len, _src) = result.map_err(|e| {
                    port.fault();
                    PtpError::transport("general recv", e)
                })?;
                port.handle_message(&general_buf[..len]);
            }

            _ = tick.tick() => {
                tick_flag.raise();
                if tick_flag.take() {
                    port.protocol_tick();
                }
            }

            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!("endpoint shutting down");
                    return Ok(());
                }
            }
        }

        let queued = port.take_outbound();
        if let Err(err) = transport.flush(queued).await {
            port.fault();
            return Err(err);
        }
    }
}
