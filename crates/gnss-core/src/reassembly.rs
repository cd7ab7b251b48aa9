//! Reassembly of multi-part satellites-in-view reports.
//!
//! A receiver spreads its satellites-in-view list over several GSV sentences
//! ("part 1 of 3", "part 2 of 3", ...). The [`Reassembler`] keeps one
//! in-flight sequence per talker (and signal) and hands back the full,
//! ordered satellite list once every part has arrived.
//!
//! Sequence lifecycle:
//!
//! ```text
//! NoSequence --part 1--> Collecting(1 of m) --next part--> ... --last part--> Complete (cleared)
//! Collecting(n of m) --part 1--> Collecting(1 of m')
//! ```
//!
//! Parts that are not the immediate successor of the last accepted part are
//! dropped. Resynchronization happens through the next part 1. A sequence
//! that stops receiving parts is removed by [`Reassembler::expire`].

use crate::model::{SatelliteObservation, SequenceKey, VisibilityReport};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;

/// Why a part was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Part index or total is zero, or the index exceeds the total.
    InvalidIndex,
    /// No sequence is in flight and the part is not part 1.
    NoSequence,
    /// The part is not the successor of the last accepted part.
    OutOfOrder { expected: u8 },
    /// The part announces a different total than its sequence.
    TotalMismatch { expected_total: u8 },
}

/// An in-flight sequence that was thrown away before completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscardedSequence {
    pub received: u8,
    pub total: u8,
}

/// State of the sequence after a part was offered.
#[derive(Debug, Clone, PartialEq)]
pub enum OfferStatus {
    /// The part was buffered, more parts are expected.
    Pending { received: u8, total: u8 },
    /// The sequence is complete. Satellites are in part order with
    /// zero PRNs removed.
    Completed(Vec<SatelliteObservation>),
    /// The part was ignored.
    Dropped(DropReason),
}

/// Result of [`Reassembler::offer`].
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub key: SequenceKey,
    pub status: OfferStatus,
    /// Set when this part caused an incomplete sequence to be abandoned.
    pub discarded: Option<DiscardedSequence>,
}

impl Offer {
    pub fn is_completed(&self) -> bool {
        matches!(self.status, OfferStatus::Completed(_))
    }
}

/// Parts received so far for one talker.
#[derive(Debug, Clone)]
struct VisibilitySequence {
    /// Total announced by part 1
    total: u8,
    /// Satellites per part, index 0 holds part 1
    parts: Vec<Vec<SatelliteObservation>>,
    /// When the last part was accepted
    updated: DateTime<Utc>,
}

impl VisibilitySequence {
    fn start(total: u8, satellites: Vec<SatelliteObservation>, now: DateTime<Utc>) -> Self {
        let mut parts = Vec::with_capacity(usize::from(total));
        parts.push(satellites);
        Self {
            total,
            parts,
            updated: now,
        }
    }

    fn received(&self) -> u8 {
        // Bounded by total, which is a u8.
        self.parts.len() as u8
    }

    fn next_part(&self) -> u8 {
        self.received() + 1
    }

    fn is_complete(&self) -> bool {
        self.parts.len() == usize::from(self.total)
    }

    fn discarded(&self) -> DiscardedSequence {
        DiscardedSequence {
            received: self.received(),
            total: self.total,
        }
    }

    fn into_satellites(self) -> Vec<SatelliteObservation> {
        self.parts
            .into_iter()
            .flatten()
            .filter(|sat| sat.prn > 0)
            .collect()
    }
}

/// Per-talker reassembly state machine.
#[derive(Debug, Clone, Default)]
pub struct Reassembler {
    sequences: HashMap<SequenceKey, VisibilitySequence>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer one part of a satellites-in-view report received at `now`.
    pub fn offer(&mut self, report: VisibilityReport, now: DateTime<Utc>) -> Offer {
        let key = report.key();
        let VisibilityReport {
            part,
            total_parts: total,
            satellites,
            ..
        } = report;

        if part == 0 || total == 0 || part > total {
            return Offer {
                key,
                status: OfferStatus::Dropped(DropReason::InvalidIndex),
                discarded: None,
            };
        }

        if part == 1 {
            let discarded = self.sequences.remove(&key).map(|seq| seq.discarded());
            let sequence = VisibilitySequence::start(total, satellites, now);
            return self.advance(key, sequence, discarded);
        }

        let Some(sequence) = self.sequences.remove(&key) else {
            return Offer {
                key,
                status: OfferStatus::Dropped(DropReason::NoSequence),
                discarded: None,
            };
        };

        if sequence.total != total {
            // Never mix totals: the old run is abandoned, the new one can only
            // start with its own part 1.
            return Offer {
                key,
                status: OfferStatus::Dropped(DropReason::TotalMismatch {
                    expected_total: sequence.total,
                }),
                discarded: Some(sequence.discarded()),
            };
        }

        if part != sequence.next_part() {
            let expected = sequence.next_part();
            self.sequences.insert(key.clone(), sequence);
            return Offer {
                key,
                status: OfferStatus::Dropped(DropReason::OutOfOrder { expected }),
                discarded: None,
            };
        }

        let mut sequence = sequence;
        sequence.parts.push(satellites);
        sequence.updated = now;
        self.advance(key, sequence, None)
    }

    fn advance(
        &mut self,
        key: SequenceKey,
        sequence: VisibilitySequence,
        discarded: Option<DiscardedSequence>,
    ) -> Offer {
        let status = if sequence.is_complete() {
            OfferStatus::Completed(sequence.into_satellites())
        } else {
            let status = OfferStatus::Pending {
                received: sequence.received(),
                total: sequence.total,
            };
            self.sequences.insert(key.clone(), sequence);
            status
        };

        Offer {
            key,
            status,
            discarded,
        }
    }

    /// Progress of the in-flight sequence for `key` as (received, total).
    pub fn in_flight(&self, key: &SequenceKey) -> Option<(u8, u8)> {
        self.sequences
            .get(key)
            .map(|seq| (seq.received(), seq.total))
    }

    /// Number of sequences currently being collected.
    pub fn pending_count(&self) -> usize {
        self.sequences.len()
    }

    /// Drop in-flight sequences whose last part is older than `threshold`.
    ///
    /// Returned in key order.
    pub fn expire(
        &mut self,
        now: DateTime<Utc>,
        threshold: TimeDelta,
    ) -> Vec<(SequenceKey, DiscardedSequence)> {
        let mut expired = Vec::new();
        self.sequences.retain(|key, seq| {
            let keep = now.signed_duration_since(seq.updated) <= threshold;
            if !keep {
                expired.push((key.clone(), seq.discarded()));
            }
            keep
        });
        expired.sort_by(|a, b| a.0.cmp(&b.0));
        expired
    }

    /// Drop every in-flight sequence.
    pub fn clear(&mut self) {
        self.sequences.clear();
    }
}
