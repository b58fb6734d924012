//! Best Master Clock algorithm: foreign-master bookkeeping, dataset
//! comparison, and the recommended-state decision.
//!
//! Comparison follows the IEEE 1588-2008 Figure 27/28 precedence:
//! priority1, clock quality, priority2, grandmaster identity, then a
//! topology tiebreak on `stepsRemoved` and sender identity.

use std::cmp::Ordering;

use crate::datasets::{DefaultDS, ParentDS, TimePropertiesDS, TIME_SOURCE_INTERNAL_OSCILLATOR};
use crate::message::{
    AnnounceBody, ClockIdentity, PortIdentity, PtpHeader, FLAG_FREQUENCY_TRACEABLE, FLAG_LEAP59,
    FLAG_LEAP61, FLAG_PTP_TIMESCALE, FLAG_TIME_TRACEABLE, FLAG_UTC_OFFSET_VALID,
};
use crate::timestamp::PtpTimestamp;

/// Capacity of the foreign-master table.
pub const FOREIGN_MASTER_CAPACITY: usize = 5;

/// One remembered foreign master: the sender and its latest Announce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignMasterRecord {
    /// Port identity the Announce came from.
    pub sender: PortIdentity,
    /// Header of the last Announce.
    pub header: PtpHeader,
    /// Body of the last Announce.
    pub announce: AnnounceBody,
}

/// Fixed-capacity table of foreign masters.
///
/// A sender already present is overwritten in place; a new sender
/// takes the first free slot. Once full, Announces from unknown
/// senders are dropped — records live for the process lifetime.
#[derive(Debug, Default)]
pub struct ForeignMasterTable {
    records: [Option<ForeignMasterRecord>; FOREIGN_MASTER_CAPACITY],
}

impl ForeignMasterTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an Announce. Returns false when the table is full and
    /// the sender is new (the update is dropped).
    pub fn register(&mut self, header: PtpHeader, announce: AnnounceBody) -> bool {
        let sender = header.source_port_identity;
        let record = ForeignMasterRecord {
            sender,
            header,
            announce,
        };

        if let Some(slot) = self
            .records
            .iter_mut()
            .find(|r| r.as_ref().is_some_and(|r| r.sender == sender))
        {
            *slot = Some(record);
            return true;
        }
        if let Some(slot) = self.records.iter_mut().find(|r| r.is_none()) {
            *slot = Some(record);
            return true;
        }
        false
    }

    /// The best record in the table, if any.
    #[must_use]
    pub fn best(&self, own_identity: ClockIdentity) -> Option<&ForeignMasterRecord> {
        self.records
            .iter()
            .flatten()
            .reduce(|best, candidate| {
                if compare_datasets(own_identity, candidate, best) == Ordering::Greater {
                    candidate
                } else {
                    best
                }
            })
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.iter().flatten().count()
    }

    /// Whether no foreign master has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.iter().all(Option::is_none)
    }
}

/// Compare two Announce records.
///
/// Returns [`Ordering::Greater`] when `a` describes the better master.
/// Antisymmetric: swapping the arguments reverses the result.
#[must_use]
pub fn compare_datasets(
    own_identity: ClockIdentity,
    a: &ForeignMasterRecord,
    b: &ForeignMasterRecord,
) -> Ordering {
    // Lower values win at every precedence level, so each comparison
    // is reversed into "greater = better".
    let by_grandmaster = (b.announce.grandmaster_priority1)
        .cmp(&a.announce.grandmaster_priority1)
        .then_with(|| {
            b.announce
                .grandmaster_clock_quality
                .cmp(&a.announce.grandmaster_clock_quality)
        })
        .then_with(|| {
            b.announce
                .grandmaster_priority2
                .cmp(&a.announce.grandmaster_priority2)
        })
        .then_with(|| {
            b.announce
                .grandmaster_identity
                .cmp(&a.announce.grandmaster_identity)
        });
    if by_grandmaster != Ordering::Equal {
        return by_grandmaster;
    }

    // Same grandmaster: break the tie by topology.
    let a_steps = a.announce.steps_removed;
    let b_steps = b.announce.steps_removed;
    if a_steps.abs_diff(b_steps) > 1 {
        return b_steps.cmp(&a_steps);
    }
    match a_steps.cmp(&b_steps) {
        Ordering::Less => {
            // The shorter path wins unless it leads back to ourselves.
            if a.sender.clock_identity == own_identity {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        Ordering::Greater => {
            if b.sender.clock_identity == own_identity {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        Ordering::Equal => b.sender.cmp(&a.sender),
    }
}

/// Outcome of the state decision algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecommendedState {
    /// The local clock is the best: become master (decision M1).
    Master,
    /// A foreign master won: synchronize to it (decision S1).
    Slave(ForeignMasterRecord),
    /// No master is known and the clock is slave-only: keep listening.
    Listening,
}

/// Run the state decision over the foreign-master table.
#[must_use]
pub fn state_decision(
    default_ds: &DefaultDS,
    own_port: PortIdentity,
    table: &ForeignMasterTable,
) -> RecommendedState {
    let own_identity = default_ds.clock_identity;
    let Some(best) = table.best(own_identity) else {
        return if default_ds.slave_only {
            RecommendedState::Listening
        } else {
            RecommendedState::Master
        };
    };

    let local = local_pseudo_record(default_ds, own_port);
    if !default_ds.slave_only
        && compare_datasets(own_identity, &local, best) == Ordering::Greater
    {
        RecommendedState::Master
    } else {
        RecommendedState::Slave(best.clone())
    }
}

/// The local clock presented as an Announce record for comparison.
fn local_pseudo_record(default_ds: &DefaultDS, own_port: PortIdentity) -> ForeignMasterRecord {
    let announce = AnnounceBody {
        origin_timestamp: PtpTimestamp::ZERO,
        current_utc_offset: 0,
        grandmaster_priority1: default_ds.priority1,
        grandmaster_clock_quality: default_ds.clock_quality,
        grandmaster_priority2: default_ds.priority2,
        grandmaster_identity: default_ds.clock_identity,
        steps_removed: 0,
        time_source: TIME_SOURCE_INTERNAL_OSCILLATOR,
    };
    let header = PtpHeader::new(
        crate::message::PtpMessageType::Announce,
        own_port,
        0,
    );
    ForeignMasterRecord {
        sender: own_port,
        header,
        announce,
    }
}

/// Decision M1: the local clock becomes its own grandmaster.
pub fn update_local_as_master(
    default_ds: &DefaultDS,
    parent_ds: &mut ParentDS,
    time_properties_ds: &mut TimePropertiesDS,
) {
    *parent_ds = ParentDS::new_self(default_ds);
    *time_properties_ds = TimePropertiesDS {
        current_utc_offset: 0,
        current_utc_offset_valid: false,
        leap59: false,
        leap61: false,
        time_traceable: false,
        frequency_traceable: false,
        ptp_timescale: true,
        time_source: TIME_SOURCE_INTERNAL_OSCILLATOR,
    };
}

/// Decision S1: adopt the winning foreign master as parent.
pub fn update_as_slave(
    record: &ForeignMasterRecord,
    parent_ds: &mut ParentDS,
    time_properties_ds: &mut TimePropertiesDS,
) {
    parent_ds.parent_port_identity = record.sender;
    parent_ds.grandmaster_identity = record.announce.grandmaster_identity;
    parent_ds.grandmaster_clock_quality = record.announce.grandmaster_clock_quality;
    parent_ds.grandmaster_priority1 = record.announce.grandmaster_priority1;
    parent_ds.grandmaster_priority2 = record.announce.grandmaster_priority2;

    let flags = record.header.flags;
    *time_properties_ds = TimePropertiesDS {
        current_utc_offset: record.announce.current_utc_offset,
        current_utc_offset_valid: flags & FLAG_UTC_OFFSET_VALID != 0,
        leap59: flags & FLAG_LEAP59 != 0,
        leap61: flags & FLAG_LEAP61 != 0,
        time_traceable: flags & FLAG_TIME_TRACEABLE != 0,
        frequency_traceable: flags & FLAG_FREQUENCY_TRACEABLE != 0,
        ptp_timescale: flags & FLAG_PTP_TIMESCALE != 0,
        time_source: record.announce.time_source,
    };
}
