//! # gnss-core
//!
//! Core GNSS receiver data model and state store.
//!
//! This crate provides:
//! - Data model types (Position, ErrorEstimate, satellite observations, Snapshot)
//! - Reassembly of multi-part satellites-in-view reports
//! - In-memory store with staleness eviction
//! - Accumulator configuration
//!
//! This crate is intentionally runtime-agnostic and contains no async code or
//! I/O. Timestamps are always supplied by the caller.

pub mod config;
pub mod model;
pub mod reassembly;
pub mod store;

pub use config::{AccumulatorConfig, ConfigError, VisibilityRetention};
pub use model::*;
pub use reassembly::{DiscardedSequence, DropReason, Offer, OfferStatus, Reassembler};
pub use store::{Eviction, MemoryStore, SatelliteStore, VisibleKey};
