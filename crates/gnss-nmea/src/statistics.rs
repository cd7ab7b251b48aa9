//! Accumulator statistics.
//!
//! Counters are updated by the accumulator while it processes sentences and
//! can be read at any time through `Accumulator::stats`.

use serde::{Deserialize, Serialize};

/// Running counters for one accumulator instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccumulatorStats {
    /// Lines handed to `process`
    pub sentences: u64,

    /// Lines that failed to decode
    pub decode_errors: u64,

    /// Satellites-in-view parts accepted into a sequence
    pub parts_accepted: u64,

    /// Satellites-in-view parts ignored
    pub parts_dropped: u64,

    /// Incomplete sequences thrown away
    pub resyncs: u64,

    /// Incomplete sequences that went quiet
    pub sequences_expired: u64,

    /// Sequences merged into the snapshot
    pub sequences_completed: u64,

    /// Satellite entries removed as stale
    pub evicted: u64,
}

impl AccumulatorStats {
    /// Fraction of lines that decoded, 1.0 when nothing was processed.
    pub fn decode_success_rate(&self) -> f64 {
        if self.sentences == 0 {
            return 1.0;
        }
        (self.sentences - self.decode_errors) as f64 / self.sentences as f64
    }
}
