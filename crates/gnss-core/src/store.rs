//! Receiver state store.
//!
//! The store holds the latest position fix and error estimate, the visible
//! satellites per talker and the satellites used in the fix. Satellite entries
//! carry a last-seen timestamp and are aged out by [`SatelliteStore::evict`].

use crate::config::{AccumulatorConfig, VisibilityRetention};
use crate::model::{
    ErrorEstimate, Position, SatelliteObservation, SatelliteView, SequenceKey, Snapshot,
    VisibleSatellite,
};
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::{BTreeMap, HashMap};

/// Identifies one visible satellite: the reporting stream plus its number.
pub type VisibleKey = (SequenceKey, u32);

/// Entries removed by one eviction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Eviction {
    /// Satellite numbers dropped from the in-use set
    pub in_use: Vec<u32>,
    /// Visible satellites dropped
    pub visible: Vec<VisibleKey>,
}

impl Eviction {
    pub fn is_empty(&self) -> bool {
        self.in_use.is_empty() && self.visible.is_empty()
    }

    pub fn len(&self) -> usize {
        self.in_use.len() + self.visible.len()
    }
}

/// Trait for receiver state storage implementations.
pub trait SatelliteStore: Send + Sync {
    /// Replace the current position fix.
    fn set_position(&mut self, position: Position);

    /// Replace the current error estimate.
    fn set_error_estimate(&mut self, estimate: ErrorEstimate);

    /// Refresh the last-seen time of each listed satellite number.
    ///
    /// Numbers not listed keep their previous timestamp.
    fn mark_in_use(&mut self, prns: &[u32], now: DateTime<Utc>);

    /// Replace every visible satellite of `key` with a completed report.
    fn merge_visibility(
        &mut self,
        key: &SequenceKey,
        satellites: Vec<SatelliteObservation>,
        now: DateTime<Utc>,
    );

    /// Remove entries older than the stale threshold.
    fn evict(&mut self, now: DateTime<Utc>) -> Eviction;

    /// Project the live state into a snapshot as seen at `now`.
    fn read(&self, now: DateTime<Utc>) -> Snapshot;

    /// Forget everything.
    fn clear(&mut self);
}

/// In-memory store implementation.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    position: Option<Position>,
    error_estimate: Option<ErrorEstimate>,
    visible: HashMap<VisibleKey, VisibleSatellite>,
    /// Satellite number to last-seen time
    in_use: BTreeMap<u32, DateTime<Utc>>,
    stale_threshold: TimeDelta,
    retention: VisibilityRetention,
}

impl MemoryStore {
    /// Create an empty store with the given staleness settings.
    pub fn new(config: &AccumulatorConfig) -> Self {
        Self {
            position: None,
            error_estimate: None,
            visible: HashMap::new(),
            in_use: BTreeMap::new(),
            stale_threshold: config.stale_threshold(),
            retention: config.visible_retention,
        }
    }

    fn is_stale(&self, last_seen: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(last_seen) > self.stale_threshold
    }

    fn visible_expires(&self) -> bool {
        self.retention == VisibilityRetention::Timed
    }

    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    pub fn in_use_count(&self) -> usize {
        self.in_use.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(&AccumulatorConfig::default())
    }
}

impl SatelliteStore for MemoryStore {
    fn set_position(&mut self, position: Position) {
        self.position = Some(position);
    }

    fn set_error_estimate(&mut self, estimate: ErrorEstimate) {
        self.error_estimate = Some(estimate);
    }

    fn mark_in_use(&mut self, prns: &[u32], now: DateTime<Utc>) {
        for &prn in prns.iter().filter(|&&prn| prn > 0) {
            self.in_use.insert(prn, now);
        }
    }

    fn merge_visibility(
        &mut self,
        key: &SequenceKey,
        satellites: Vec<SatelliteObservation>,
        now: DateTime<Utc>,
    ) {
        // A talker's visibility is replaced as a whole so satellites that
        // dropped out of view do not linger.
        self.visible.retain(|(seq, _), _| seq != key);

        for observation in satellites.into_iter().filter(|sat| sat.prn > 0) {
            let prn = observation.prn;
            let sat = VisibleSatellite::from_observation(key, observation, now);
            self.visible.insert((key.clone(), prn), sat);
        }
    }

    fn evict(&mut self, now: DateTime<Utc>) -> Eviction {
        let mut eviction = Eviction::default();
        let threshold = self.stale_threshold;
        let stale = |last_seen: DateTime<Utc>| now.signed_duration_since(last_seen) > threshold;

        self.in_use.retain(|prn, last_seen| {
            let keep = !stale(*last_seen);
            if !keep {
                eviction.in_use.push(*prn);
            }
            keep
        });

        if self.visible_expires() {
            self.visible.retain(|key, sat| {
                let keep = !stale(sat.last_seen);
                if !keep {
                    eviction.visible.push(key.clone());
                }
                keep
            });
            eviction.visible.sort();
        }

        eviction
    }

    fn read(&self, now: DateTime<Utc>) -> Snapshot {
        let mut visible: Vec<VisibleSatellite> = self
            .visible
            .values()
            .filter(|sat| !self.visible_expires() || !self.is_stale(sat.last_seen, now))
            .cloned()
            .collect();
        visible.sort_by(|a, b| {
            a.prn
                .cmp(&b.prn)
                .then_with(|| a.talker.cmp(&b.talker))
                .then_with(|| a.signal.cmp(&b.signal))
        });

        let in_use = self
            .in_use
            .iter()
            .filter(|(_, last_seen)| !self.is_stale(**last_seen, now))
            .map(|(prn, _)| *prn)
            .collect();

        Snapshot {
            position: self.position.clone(),
            error_estimate: self.error_estimate.clone(),
            satellites: SatelliteView { visible, in_use },
        }
    }

    fn clear(&mut self) {
        self.position = None;
        self.error_estimate = None;
        self.visible.clear();
        self.in_use.clear();
    }
}
