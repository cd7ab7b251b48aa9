//! Shared accumulator handle.
//!
//! Several tasks may need the same accumulator: one feeding lines, others
//! reading snapshots. [`SharedAccumulator`] is a cheap-to-clone handle around
//! a single lock. A whole `process` call runs under the write lock, so a
//! reader never sees a talker's visibility half replaced.
//!
//! Readers that want to be told about changes call
//! [`SharedAccumulator::subscribe`] and wait on the returned receiver. Only
//! the latest snapshot is kept, so a slow subscriber skips intermediate ones.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use gnss_core::{AccumulatorConfig, Snapshot};
use tokio::sync::watch;

use crate::accumulator::Accumulator;
use crate::events::AccumulatorEvent;
use crate::statistics::AccumulatorStats;

/// Reference-counted, lock-protected [`Accumulator`].
#[derive(Debug, Clone)]
pub struct SharedAccumulator {
    inner: Arc<RwLock<Accumulator>>,
    /// Latest published snapshot
    updates: Arc<watch::Sender<Snapshot>>,
}

impl SharedAccumulator {
    pub fn new(config: AccumulatorConfig) -> Self {
        Self::from_accumulator(Accumulator::new(config))
    }

    pub fn from_accumulator(accumulator: Accumulator) -> Self {
        let (updates, _) = watch::channel(accumulator.snapshot());
        Self {
            inner: Arc::new(RwLock::new(accumulator)),
            updates: Arc::new(updates),
        }
    }

    // A panic while holding the lock cannot leave the accumulator in a state
    // worse than a dropped sentence, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Accumulator> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Accumulator> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Notify subscribers if `snapshot` differs from the last one sent.
    fn publish(&self, snapshot: Snapshot) {
        self.updates.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    pub fn process(&self, line: &str) -> Vec<AccumulatorEvent> {
        self.process_at(line, Utc::now())
    }

    pub fn process_at(&self, line: &str, now: DateTime<Utc>) -> Vec<AccumulatorEvent> {
        // Published under the write lock so subscribers see updates in order.
        let mut accumulator = self.write();
        let events = accumulator.process_at(line, now);
        self.publish(accumulator.snapshot_at(now));
        events
    }

    /// Receive a new snapshot every time a processed line changes it.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.read().snapshot()
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> Snapshot {
        self.read().snapshot_at(now)
    }

    pub fn stats(&self) -> AccumulatorStats {
        self.read().stats()
    }

    pub fn reset(&self) {
        let mut accumulator = self.write();
        accumulator.reset();
        self.publish(accumulator.snapshot());
    }
}

impl Default for SharedAccumulator {
    fn default() -> Self {
        Self::new(AccumulatorConfig::default())
    }
}
