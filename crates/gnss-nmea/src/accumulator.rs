//! Sentence accumulator.
//!
//! The [`Accumulator`] is the single entry point for a stream of NMEA lines.
//! It decodes each line, routes the record to the store or the
//! satellites-in-view reassembler, and finishes every update with an eviction
//! pass. Nothing in here blocks, sleeps or fails: malformed input is reported
//! as an [`AccumulatorEvent`] and processing continues with the next line.

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use gnss_core::{
    AccumulatorConfig, MemoryStore, Offer, OfferStatus, Reassembler, SatelliteStore, Snapshot,
    VisibilityReport,
};

use crate::decoder::{NmeaDecoder, Record, SentenceDecoder};
use crate::events::AccumulatorEvent;
use crate::statistics::AccumulatorStats;

/// Accumulates decoded sentences into a live receiver snapshot.
///
/// One accumulator expects a single writer. Wrap it in a
/// [`SharedAccumulator`](crate::SharedAccumulator) to share it between tasks.
#[derive(Debug)]
pub struct Accumulator<D = NmeaDecoder, S = MemoryStore> {
    config: AccumulatorConfig,
    decoder: D,
    store: S,
    reassembler: Reassembler,
    stats: AccumulatorStats,
}

impl Accumulator {
    /// Create an accumulator with the NMEA decoder and an in-memory store.
    pub fn new(config: AccumulatorConfig) -> Self {
        let decoder = NmeaDecoder::new(config.require_start_marker);
        let store = MemoryStore::new(&config);
        Self::with_parts(config, decoder, store)
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new(AccumulatorConfig::default())
    }
}

impl<D: SentenceDecoder, S: SatelliteStore> Accumulator<D, S> {
    /// Create an accumulator from a custom decoder and store.
    pub fn with_parts(config: AccumulatorConfig, decoder: D, store: S) -> Self {
        Self {
            config,
            decoder,
            store,
            reassembler: Reassembler::new(),
            stats: AccumulatorStats::default(),
        }
    }

    /// Process one line using the current wall-clock time.
    pub fn process(&mut self, line: &str) -> Vec<AccumulatorEvent> {
        self.process_at(line, Utc::now())
    }

    /// Process one line as if received at `now`.
    pub fn process_at(&mut self, line: &str, now: DateTime<Utc>) -> Vec<AccumulatorEvent> {
        self.stats.sentences += 1;
        let mut events = Vec::new();

        match self.decoder.decode(line) {
            Ok(record) => {
                trace!(kind = record.kind(), "Decoded sentence");
                self.apply(record, now, &mut events);
                self.evict(now, &mut events);
            }
            Err(error) => {
                self.stats.decode_errors += 1;
                warn!("Failed to decode sentence {:?}: {}", line, error);
                events.push(AccumulatorEvent::DecodeFailed {
                    line: line.to_string(),
                    error,
                });
            }
        }

        events
    }

    /// Apply an already decoded record as if received at `now`.
    pub fn apply_record(&mut self, record: Record, now: DateTime<Utc>) -> Vec<AccumulatorEvent> {
        let mut events = Vec::new();
        self.apply(record, now, &mut events);
        self.evict(now, &mut events);
        events
    }

    fn apply(&mut self, record: Record, now: DateTime<Utc>, events: &mut Vec<AccumulatorEvent>) {
        match record {
            Record::Position(position) => self.store.set_position(position),
            Record::ErrorEstimate(estimate) => self.store.set_error_estimate(estimate),
            Record::ActiveSatellites(active) => self.store.mark_in_use(&active.prns, now),
            Record::Visibility(report) => self.offer_visibility(report, now, events),
        }
    }

    fn offer_visibility(
        &mut self,
        report: VisibilityReport,
        now: DateTime<Utc>,
        events: &mut Vec<AccumulatorEvent>,
    ) {
        let (part, total) = (report.part, report.total_parts);
        let Offer {
            key,
            status,
            discarded,
        } = self.reassembler.offer(report, now);

        if let Some(discarded) = discarded {
            self.stats.resyncs += 1;
            debug!(
                "Discarded incomplete {} sequence ({} of {} parts)",
                key, discarded.received, discarded.total
            );
            events.push(AccumulatorEvent::SequenceResynced {
                key: key.clone(),
                discarded,
            });
        }

        match status {
            OfferStatus::Pending { received, total } => {
                self.stats.parts_accepted += 1;
                trace!("Buffered {} part {} of {}", key, received, total);
            }
            OfferStatus::Completed(satellites) => {
                self.stats.parts_accepted += 1;
                self.stats.sequences_completed += 1;
                debug!("Completed {} sequence with {} satellites", key, satellites.len());
                self.store.merge_visibility(&key, satellites, now);
            }
            OfferStatus::Dropped(reason) => {
                self.stats.parts_dropped += 1;
                debug!("Dropped {} part {} of {}: {:?}", key, part, total, reason);
                events.push(AccumulatorEvent::PartDropped {
                    key,
                    part,
                    total,
                    reason,
                });
            }
        }
    }

    fn evict(&mut self, now: DateTime<Utc>, events: &mut Vec<AccumulatorEvent>) {
        let expired = self
            .reassembler
            .expire(now, self.config.stale_threshold());
        for (key, discarded) in expired {
            self.stats.sequences_expired += 1;
            debug!(
                "Expired incomplete {} sequence ({} of {} parts)",
                key, discarded.received, discarded.total
            );
            events.push(AccumulatorEvent::SequenceExpired { key, discarded });
        }

        let eviction = self.store.evict(now);
        if eviction.is_empty() {
            return;
        }

        self.stats.evicted += eviction.len() as u64;
        debug!(
            "Evicted {} in-use and {} visible stale satellites",
            eviction.in_use.len(),
            eviction.visible.len()
        );
        events.push(AccumulatorEvent::StaleEvicted(eviction));
    }

    /// Snapshot of the current state, with stale entries hidden.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_at(Utc::now())
    }

    /// Snapshot as seen at `now`.
    pub fn snapshot_at(&self, now: DateTime<Utc>) -> Snapshot {
        self.store.read(now)
    }

    pub fn stats(&self) -> AccumulatorStats {
        self.stats
    }

    pub fn config(&self) -> &AccumulatorConfig {
        &self.config
    }

    /// Number of satellites-in-view sequences still being collected.
    pub fn pending_sequences(&self) -> usize {
        self.reassembler.pending_count()
    }

    /// Forget all state, as after a reconnect. Statistics are kept.
    pub fn reset(&mut self) {
        self.store.clear();
        self.reassembler.clear();
        debug!("Accumulator reset");
    }
}
