//! # gnss-nmea
//!
//! NMEA 0183 front end for the GNSS receiver state.
//!
//! This crate provides:
//! - A decoder for GGA, GST, GSA and GSV sentences
//! - The [`Accumulator`] that turns a line stream into a live [`Snapshot`]
//! - A shared, lock-protected handle for multi-task use
//! - Processing statistics and observability events

pub mod accumulator;
pub mod decoder;
pub mod events;
pub mod shared;
pub mod statistics;

pub use accumulator::Accumulator;
pub use decoder::{parse_sentence, ActiveSatelliteList, DecodeError, NmeaDecoder, Record, SentenceDecoder};
pub use events::AccumulatorEvent;
pub use shared::SharedAccumulator;
pub use statistics::AccumulatorStats;

pub use gnss_core::{AccumulatorConfig, Snapshot};
