//! Observability events emitted while processing sentences.
//!
//! None of these are failures of the accumulator. They are returned from
//! `process` and mirrored as `tracing` events so callers can count, log or
//! ignore them.

use crate::decoder::DecodeError;
use gnss_core::{DiscardedSequence, DropReason, Eviction, SequenceKey};

#[derive(Debug, Clone, PartialEq)]
pub enum AccumulatorEvent {
    /// A line could not be decoded. The snapshot is unchanged.
    DecodeFailed { line: String, error: DecodeError },

    /// An incomplete satellites-in-view sequence was thrown away, either
    /// because a new part 1 arrived or because the announced total changed.
    SequenceResynced {
        key: SequenceKey,
        discarded: DiscardedSequence,
    },

    /// An incomplete satellites-in-view sequence received no part within the
    /// stale threshold and was thrown away.
    SequenceExpired {
        key: SequenceKey,
        discarded: DiscardedSequence,
    },

    /// A satellites-in-view part was ignored.
    PartDropped {
        key: SequenceKey,
        part: u8,
        total: u8,
        reason: DropReason,
    },

    /// Stale entries were removed during an eviction pass.
    StaleEvicted(Eviction),
}

impl AccumulatorEvent {
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, AccumulatorEvent::DecodeFailed { .. })
    }
}
