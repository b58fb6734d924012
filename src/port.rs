//! Port protocol engine: state machine, message handlers, and
//! timer-driven message issuance.
//!
//! The engine is synchronous and performs no I/O. Inbound packets are
//! fed to [`Port::handle_message`]; outbound messages accumulate in a
//! queue the runner drains with [`Port::take_outbound`]; the periodic
//! protocol tick advances the timer wheel through
//! [`Port::protocol_tick`]. All handlers run to completion.

use crate::bmc::{self, ForeignMasterTable, RecommendedState};
use crate::clock::{LocalClock, TickCounter};
use crate::config::PtpConfig;
use crate::datasets::{DefaultDS, ParentDS, PortDS, TimePropertiesDS};
use crate::error::PtpError;
use crate::message::{
    AnnounceBody, PortIdentity, PtpHeader, PtpMessage, PtpMessageBody, PtpParseError,
    FLAG_FREQUENCY_TRACEABLE, FLAG_LEAP59, FLAG_LEAP61, FLAG_PTP_TIMESCALE, FLAG_TIME_TRACEABLE,
    FLAG_TWO_STEP, FLAG_UTC_OFFSET_VALID,
};
use crate::servo::ClockServo;
use crate::timer::{TimerId, TimerWheel};
use crate::timestamp::{PtpTimestamp, TimeInternal};

/// Offset magnitude below which an uncalibrated port is considered
/// locked and promoted to slave (1 µs).
pub const UNCALIBRATED_LOCK_THRESHOLD_NS: i64 = 1_000;

/// Port state machine states (IEEE 1588-2008 Table 10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    /// Data sets and timers are being initialized.
    Initializing,
    /// An unrecoverable transport or hardware fault occurred.
    Faulty,
    /// The port is administratively disabled.
    Disabled,
    /// Waiting for Announce messages to elect a master.
    Listening,
    /// About to become master (qualification).
    PreMaster,
    /// This port is the master on the link.
    Master,
    /// A better master exists but this port is not its slave.
    Passive,
    /// A master is elected but the offset has not converged yet.
    Uncalibrated,
    /// Synchronized to the elected master.
    Slave,
}

impl PortState {
    /// Whether the port is in the slave family (slave or converging).
    #[must_use]
    pub fn is_slave_family(&self) -> bool {
        matches!(self, Self::Slave | Self::Uncalibrated)
    }
}

impl std::fmt::Display for PortState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initializing => "INITIALIZING",
            Self::Faulty => "FAULTY",
            Self::Disabled => "DISABLED",
            Self::Listening => "LISTENING",
            Self::PreMaster => "PRE_MASTER",
            Self::Master => "MASTER",
            Self::Passive => "PASSIVE",
            Self::Uncalibrated => "UNCALIBRATED",
            Self::Slave => "SLAVE",
        };
        f.write_str(name)
    }
}

/// Which transport channel an outbound message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportClass {
    /// Event channel (UDP 319): Sync, `Delay_Req`.
    Event,
    /// General channel (UDP 320): Announce, `Follow_Up`, `Delay_Resp`.
    General,
}

/// An encoded message waiting to be sent.
#[derive(Debug, Clone)]
pub struct Outbound {
    /// Destination channel.
    pub class: TransportClass,
    /// Encoded message bytes.
    pub payload: Vec<u8>,
}

/// Receive and drop counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortStats {
    /// Announce messages accepted.
    pub announce_rx: u64,
    /// Sync messages accepted.
    pub sync_rx: u64,
    /// `Follow_Up` messages accepted.
    pub follow_up_rx: u64,
    /// `Delay_Req` messages accepted.
    pub delay_req_rx: u64,
    /// `Delay_Resp` messages accepted.
    pub delay_resp_rx: u64,
    /// Truncated or wrong-version packets dropped.
    pub malformed_drops: u64,
    /// Packets from a different domain dropped.
    pub wrong_domain_drops: u64,
    /// Messages outside their expected exchange dropped.
    pub out_of_order_drops: u64,
    /// Announces dropped because the foreign-master table was full.
    pub foreign_table_full_drops: u64,
}

/// A single-port PTP ordinary clock endpoint.
pub struct Port<C: TickCounter> {
    default_ds: DefaultDS,
    port_ds: PortDS,
    parent_ds: ParentDS,
    time_properties_ds: TimePropertiesDS,
    foreign_masters: ForeignMasterTable,
    servo: ClockServo,
    timers: TimerWheel,
    clock: LocalClock<C>,
    stats: PortStats,
    recommended: Option<RecommendedState>,
    announce_sequence: u16,
    sync_sequence: u16,
    delay_req_sequence: u16,
    /// Sequence id of the `Delay_Req` awaiting its `Delay_Resp`.
    outstanding_delay_req: Option<u16>,
    waiting_for_follow_up: bool,
    last_sync_header: Option<PtpHeader>,
    /// T2 of the pending two-step Sync.
    sync_receive_time: TimeInternal,
    /// T3 of the outstanding `Delay_Req`.
    delay_req_send_time: TimeInternal,
    outbound: Vec<Outbound>,
}

impl<C: TickCounter> Port<C> {
    /// Create a port: initialize data sets, timers, and the servo, then
    /// move to LISTENING.
    ///
    /// # Errors
    /// Returns [`PtpError::Hardware`] when the tick counter cannot be
    /// started; the port never leaves initialization in that case.
    pub fn new(config: &PtpConfig, counter: C) -> Result<Self, PtpError> {
        let clock = LocalClock::new(counter)?;
        let default_ds = DefaultDS::from_config(config);
        let parent_ds = ParentDS::new_self(&default_ds);
        let mut port = Self {
            port_ds: PortDS::from_config(config),
            default_ds,
            parent_ds,
            time_properties_ds: TimePropertiesDS::default(),
            foreign_masters: ForeignMasterTable::new(),
            servo: ClockServo::new(),
            timers: TimerWheel::new(config.tick_rate_hz),
            clock,
            stats: PortStats::default(),
            recommended: None,
            announce_sequence: 0,
            sync_sequence: 0,
            delay_req_sequence: 0,
            outstanding_delay_req: None,
            waiting_for_follow_up: false,
            last_sync_header: None,
            sync_receive_time: TimeInternal::ZERO,
            delay_req_send_time: TimeInternal::ZERO,
            outbound: Vec::new(),
        };
        tracing::info!(
            identity = %port.default_ds.clock_identity,
            domain = port.default_ds.domain_number,
            slave_only = port.default_ds.slave_only,
            "port initialized"
        );
        port.transition_to(PortState::Listening);
        Ok(port)
    }

    /// Current port state.
    #[must_use]
    pub fn state(&self) -> PortState {
        self.port_ds.port_state
    }

    /// Receive and drop counters.
    #[must_use]
    pub fn stats(&self) -> &PortStats {
        &self.stats
    }

    /// The servo driving the local clock.
    #[must_use]
    pub fn servo(&self) -> &ClockServo {
        &self.servo
    }

    /// The local clock.
    #[must_use]
    pub fn clock(&self) -> &LocalClock<C> {
        &self.clock
    }

    /// Static attributes of this clock.
    #[must_use]
    pub fn default_ds(&self) -> &DefaultDS {
        &self.default_ds
    }

    /// Attributes of the elected parent.
    #[must_use]
    pub fn parent_ds(&self) -> &ParentDS {
        &self.parent_ds
    }

    /// Per-port attributes.
    #[must_use]
    pub fn port_ds(&self) -> &PortDS {
        &self.port_ds
    }

    /// Timescale properties of the current grandmaster.
    #[must_use]
    pub fn time_properties_ds(&self) -> &TimePropertiesDS {
        &self.time_properties_ds
    }

    /// The foreign-master table.
    #[must_use]
    pub fn foreign_masters(&self) -> &ForeignMasterTable {
        &self.foreign_masters
    }

    /// Drain the queued outbound messages.
    pub fn take_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbound)
    }

    /// Record an unrecoverable transport or hardware fault.
    pub fn fault(&mut self) {
        self.recommended = None;
        self.transition_to(PortState::Faulty);
    }

    /// Dispatch one received packet.
    ///
    /// The ingress timestamp for event messages is captured here, so
    /// the latency bound on T2 is the dispatch latency. Bad packets
    /// are dropped with a counter increment and never abort the port.
    pub fn handle_message(&mut self, data: &[u8]) {
        if matches!(self.state(), PortState::Faulty | PortState::Disabled) {
            return;
        }
        let ingress = self.clock.get_time();

        let message = match PtpMessage::decode(data) {
            Ok(message) => message,
            Err(PtpParseError::UnknownMessageType(t)) => {
                // Peer-delay, signaling, and management traffic shares
                // the multicast groups; not ours to handle.
                tracing::trace!(message_type = t, "ignoring out-of-scope message");
                return;
            }
            Err(err) => {
                self.stats.malformed_drops += 1;
                tracing::debug!(len = data.len(), %err, "dropping malformed packet");
                return;
            }
        };

        if message.header.domain_number != self.default_ds.domain_number {
            self.stats.wrong_domain_drops += 1;
            return;
        }
        if message.header.source_port_identity.clock_identity == self.default_ds.clock_identity {
            // Our own multicast traffic looped back.
            return;
        }

        let header = message.header;
        match message.body {
            PtpMessageBody::Announce(body) => self.handle_announce(header, &body),
            PtpMessageBody::Sync { origin_timestamp } => {
                self.handle_sync(header, origin_timestamp, ingress);
            }
            PtpMessageBody::FollowUp {
                precise_origin_timestamp,
            } => self.handle_follow_up(header, precise_origin_timestamp),
            PtpMessageBody::DelayReq { .. } => self.handle_delay_req(header, ingress),
            PtpMessageBody::DelayResp {
                receive_timestamp,
                requesting_port_identity,
            } => self.handle_delay_resp(header, receive_timestamp, requesting_port_identity),
        }
    }

    /// Advance the protocol by one tick.
    ///
    /// Applies any pending recommended state, counts the timer wheel
    /// down, then runs the expiry-gated actions for the current state.
    pub fn protocol_tick(&mut self) {
        if matches!(self.state(), PortState::Faulty | PortState::Disabled) {
            return;
        }
        if let Some(recommended) = self.recommended.take() {
            self.apply_recommended(recommended);
        }

        self.timers.tick();

        match self.state() {
            PortState::Master => {
                if self.timers.expired(TimerId::AnnounceInterval) {
                    self.emit_announce();
                    self.timers
                        .start(TimerId::AnnounceInterval, self.port_ds.announce_interval_ms());
                }
                if self.timers.expired(TimerId::SyncInterval) {
                    self.emit_sync();
                    self.timers
                        .start(TimerId::SyncInterval, self.port_ds.sync_interval_ms());
                }
            }
            PortState::Slave | PortState::Uncalibrated => {
                if self.timers.expired(TimerId::DelayReqInterval) {
                    self.emit_delay_req();
                    self.timers.start(
                        TimerId::DelayReqInterval,
                        self.port_ds.delay_req_interval_ms(),
                    );
                }
                if self.timers.expired(TimerId::AnnounceReceipt) {
                    self.announce_receipt_timeout();
                }
            }
            PortState::Listening => {
                if self.timers.expired(TimerId::AnnounceReceipt) {
                    self.announce_receipt_timeout();
                }
            }
            _ => {}
        }

        self.maybe_promote();
    }

    // --- Inbound handlers ---

    fn handle_announce(&mut self, header: PtpHeader, body: &AnnounceBody) {
        self.stats.announce_rx += 1;

        if !self.foreign_masters.register(header, *body) {
            self.stats.foreign_table_full_drops += 1;
            tracing::debug!(
                sender = %header.source_port_identity.clock_identity,
                "foreign-master table full, dropping new master"
            );
        }

        let recommended = bmc::state_decision(
            &self.default_ds,
            self.port_ds.port_identity,
            &self.foreign_masters,
        );
        self.recommended = Some(recommended);

        self.timers.start(
            TimerId::AnnounceReceipt,
            self.port_ds.announce_receipt_timeout_ms(),
        );
    }

    fn handle_sync(&mut self, header: PtpHeader, origin: PtpTimestamp, ingress: TimeInternal) {
        if !self.state().is_slave_family() {
            return;
        }
        // Until a parent is elected, accept Sync from anyone.
        if self.parent_ds.has_remote_parent()
            && header.source_port_identity != self.parent_ds.parent_port_identity
        {
            self.stats.out_of_order_drops += 1;
            return;
        }
        self.stats.sync_rx += 1;

        if header.is_two_step() {
            // A stale pending Sync is simply overwritten.
            self.waiting_for_follow_up = true;
            self.last_sync_header = Some(header);
            self.sync_receive_time = ingress;
        } else {
            self.waiting_for_follow_up = false;
            self.servo.update_offset(origin.into(), ingress);
            self.run_servo();
        }
    }

    fn handle_follow_up(&mut self, header: PtpHeader, precise_origin: PtpTimestamp) {
        if !self.state().is_slave_family() {
            return;
        }
        let matches_pending = self.waiting_for_follow_up
            && self.last_sync_header.is_some_and(|sync| {
                sync.sequence_id == header.sequence_id
                    && sync.source_port_identity == header.source_port_identity
            });
        if !matches_pending {
            self.stats.out_of_order_drops += 1;
            return;
        }
        self.stats.follow_up_rx += 1;
        self.waiting_for_follow_up = false;

        self.servo
            .update_offset(precise_origin.into(), self.sync_receive_time);
        self.run_servo();
    }

    fn handle_delay_req(&mut self, header: PtpHeader, ingress: TimeInternal) {
        if self.state() != PortState::Master {
            return;
        }
        self.stats.delay_req_rx += 1;

        let mut response = PtpMessage::delay_resp(
            self.port_ds.port_identity,
            header.sequence_id,
            ingress.into(),
            header.source_port_identity,
        );
        response.header.domain_number = self.default_ds.domain_number;
        response.header.log_message_interval = self.port_ds.log_min_delay_req_interval;
        self.queue(TransportClass::General, &response);
    }

    fn handle_delay_resp(
        &mut self,
        header: PtpHeader,
        receive_timestamp: PtpTimestamp,
        requesting_port: PortIdentity,
    ) {
        if !self.state().is_slave_family() {
            return;
        }
        if requesting_port != self.port_ds.port_identity {
            // Answer to somebody else's request.
            return;
        }
        if self.outstanding_delay_req != Some(header.sequence_id) {
            self.stats.out_of_order_drops += 1;
            return;
        }
        self.outstanding_delay_req = None;
        self.stats.delay_resp_rx += 1;

        self.servo
            .update_delay(self.delay_req_send_time, receive_timestamp.into());
        self.run_servo();
    }

    /// Steer the clock from the current servo estimates. A hard step
    /// invalidates every in-flight exchange: their timestamps belong
    /// to the pre-step timescale.
    fn run_servo(&mut self) {
        if self.servo.update_clock(&mut self.clock) == crate::servo::ServoAction::Stepped {
            self.waiting_for_follow_up = false;
            self.last_sync_header = None;
            self.outstanding_delay_req = None;
        }
        self.maybe_promote();
    }

    // --- BMC application and transitions ---

    fn apply_recommended(&mut self, recommended: RecommendedState) {
        match recommended {
            RecommendedState::Master => {
                if self.state() != PortState::Master {
                    self.transition_to(PortState::Master);
                }
            }
            RecommendedState::Listening => {
                if self.state() != PortState::Listening {
                    self.transition_to(PortState::Listening);
                }
            }
            RecommendedState::Slave(record) => {
                let new_parent = record.sender != self.parent_ds.parent_port_identity;
                bmc::update_as_slave(&record, &mut self.parent_ds, &mut self.time_properties_ds);
                if new_parent || !self.state().is_slave_family() {
                    self.transition_to(PortState::Uncalibrated);
                }
            }
        }
    }

    /// No Announce from the elected master within the timeout: rerun
    /// the election. A slave-only clock falls back to LISTENING; a
    /// master-capable clock claims the link.
    fn announce_receipt_timeout(&mut self) {
        tracing::info!(state = %self.state(), "announce receipt timeout");
        if self.default_ds.slave_only {
            self.transition_to(PortState::Listening);
        } else {
            self.transition_to(PortState::Master);
        }
    }

    fn maybe_promote(&mut self) {
        if self.state() == PortState::Uncalibrated
            && self
                .servo
                .offset_from_master()
                .is_within_nanos(UNCALIBRATED_LOCK_THRESHOLD_NS)
        {
            self.transition_to(PortState::Slave);
        }
    }

    fn transition_to(&mut self, next: PortState) {
        let current = self.state();

        // Exit actions.
        if current == PortState::Master && next != PortState::Master {
            self.timers.stop(TimerId::AnnounceInterval);
            self.timers.stop(TimerId::SyncInterval);
        }
        if current.is_slave_family() && !next.is_slave_family() {
            self.timers.stop(TimerId::DelayReqInterval);
        }

        self.port_ds.port_state = next;
        tracing::info!(from = %current, to = %next, "port state change");

        // Entry actions.
        match next {
            PortState::Listening => {
                self.timers.start(
                    TimerId::AnnounceReceipt,
                    self.port_ds.announce_receipt_timeout_ms(),
                );
                self.timers.stop(TimerId::SyncInterval);
                self.timers.stop(TimerId::DelayReqInterval);
            }
            PortState::Master => {
                bmc::update_local_as_master(
                    &self.default_ds,
                    &mut self.parent_ds,
                    &mut self.time_properties_ds,
                );
                self.timers
                    .start(TimerId::AnnounceInterval, self.port_ds.announce_interval_ms());
                self.timers
                    .start(TimerId::SyncInterval, self.port_ds.sync_interval_ms());
            }
            PortState::Uncalibrated => {
                self.timers.start(
                    TimerId::DelayReqInterval,
                    self.port_ds.delay_req_interval_ms(),
                );
                self.timers.start(
                    TimerId::AnnounceReceipt,
                    self.port_ds.announce_receipt_timeout_ms(),
                );
                self.servo.init();
            }
            PortState::Faulty => {
                self.timers.stop(TimerId::AnnounceReceipt);
                self.timers.stop(TimerId::AnnounceInterval);
                self.timers.stop(TimerId::SyncInterval);
                self.timers.stop(TimerId::DelayReqInterval);
            }
            _ => {}
        }
    }

    // --- Outbound emission ---

    fn emit_announce(&mut self) {
        let body = AnnounceBody {
            origin_timestamp: PtpTimestamp::ZERO,
            current_utc_offset: self.time_properties_ds.current_utc_offset,
            grandmaster_priority1: self.parent_ds.grandmaster_priority1,
            grandmaster_clock_quality: self.parent_ds.grandmaster_clock_quality,
            grandmaster_priority2: self.parent_ds.grandmaster_priority2,
            grandmaster_identity: self.parent_ds.grandmaster_identity,
            steps_removed: 0,
            time_source: self.time_properties_ds.time_source,
        };
        let mut message =
            PtpMessage::announce(self.port_ds.port_identity, self.announce_sequence, body);
        message.header.domain_number = self.default_ds.domain_number;
        message.header.log_message_interval = self.port_ds.log_announce_interval;
        message.header.flags = self.time_properties_flags();
        self.announce_sequence = self.announce_sequence.wrapping_add(1);
        self.queue(TransportClass::General, &message);
    }

    fn emit_sync(&mut self) {
        let t1 = self.clock.get_time();
        let sequence = self.sync_sequence;
        self.sync_sequence = self.sync_sequence.wrapping_add(1);

        let mut sync = PtpMessage::sync(self.port_ds.port_identity, sequence, t1.into());
        sync.header.domain_number = self.default_ds.domain_number;
        sync.header.log_message_interval = self.port_ds.log_sync_interval;
        if self.default_ds.two_step {
            sync.header.flags |= FLAG_TWO_STEP;
        }
        self.queue(TransportClass::Event, &sync);

        if self.default_ds.two_step {
            // The Follow_Up carries the precise T1 under the Sync's
            // sequence id.
            let mut follow_up =
                PtpMessage::follow_up(self.port_ds.port_identity, sequence, t1.into());
            follow_up.header.domain_number = self.default_ds.domain_number;
            follow_up.header.log_message_interval = self.port_ds.log_sync_interval;
            self.queue(TransportClass::General, &follow_up);
        }
    }

    fn emit_delay_req(&mut self) {
        let sequence = self.delay_req_sequence;
        self.delay_req_sequence = self.delay_req_sequence.wrapping_add(1);
        self.outstanding_delay_req = Some(sequence);
        self.delay_req_send_time = self.clock.get_time();

        let mut message = PtpMessage::delay_req(self.port_ds.port_identity, sequence);
        message.header.domain_number = self.default_ds.domain_number;
        self.queue(TransportClass::Event, &message);
    }

    fn time_properties_flags(&self) -> u16 {
        let tp = &self.time_properties_ds;
        let mut flags = 0;
        if tp.leap61 {
            flags |= FLAG_LEAP61;
        }
        if tp.leap59 {
            flags |= FLAG_LEAP59;
        }
        if tp.current_utc_offset_valid {
            flags |= FLAG_UTC_OFFSET_VALID;
        }
        if tp.ptp_timescale {
            flags |= FLAG_PTP_TIMESCALE;
        }
        if tp.time_traceable {
            flags |= FLAG_TIME_TRACEABLE;
        }
        if tp.frequency_traceable {
            flags |= FLAG_FREQUENCY_TRACEABLE;
        }
        flags
    }

    fn queue(&mut self, class: TransportClass, message: &PtpMessage) {
        self.outbound.push(Outbound {
            class,
            payload: message.encode(),
        });
    }
}
