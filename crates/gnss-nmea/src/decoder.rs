//! NMEA 0183 sentence decoder.
//!
//! Turns one line of text into a [`Record`]. Only the sentences the
//! accumulator consumes are understood:
//!
//! | Sentence | Record                        |
//! |----------|-------------------------------|
//! | GGA      | [`Record::Position`]          |
//! | GST      | [`Record::ErrorEstimate`]     |
//! | GSA      | [`Record::ActiveSatellites`]  |
//! | GSV      | [`Record::Visibility`]        |
//!
//! The `*hh` checksum suffix is stripped but not verified.

use chrono::NaiveTime;
use gnss_core::{
    ErrorEstimate, Position, SatelliteObservation, Talker, VisibilityReport,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Largest part count a GSV sequence may announce.
pub const MAX_GSV_PARTS: u8 = 99;

/// Errors that can occur while decoding a sentence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// The line is empty after trimming.
    #[error("Empty sentence")]
    Empty,

    /// The line does not start with '$' or '!'.
    #[error("Missing sentence start marker")]
    MissingStartMarker,

    /// The address field is not a two-letter talker plus sentence type.
    #[error("Malformed address field '{0}'")]
    BadAddress(String),

    /// The sentence type is valid NMEA but not handled here.
    #[error("Unsupported sentence type '{0}'")]
    Unsupported(String),

    /// The sentence has fewer fields than its type requires.
    #[error("{sentence} sentence has {found} fields, expected at least {expected}")]
    TooFewFields {
        sentence: &'static str,
        found: usize,
        expected: usize,
    },

    /// A field could not be parsed.
    #[error("Invalid {field} in {sentence}: '{value}'")]
    InvalidField {
        sentence: &'static str,
        field: &'static str,
        value: String,
    },
}

/// Satellites used in the fix (GSA).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSatelliteList {
    pub talker: Talker,

    /// 'M' manual or 'A' automatic 2D/3D selection
    pub selection_mode: Option<char>,

    /// 1 = no fix, 2 = 2D, 3 = 3D
    pub fix_type: Option<u8>,

    /// Satellite numbers, empty and zero slots removed
    pub prns: Vec<u32>,

    pub pdop: Option<f64>,
    pub hdop: Option<f64>,
    pub vdop: Option<f64>,

    /// NMEA 4.1 GNSS system id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_id: Option<u8>,
}

/// A decoded sentence.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Position(Position),
    ErrorEstimate(ErrorEstimate),
    ActiveSatellites(ActiveSatelliteList),
    Visibility(VisibilityReport),
}

impl Record {
    /// Short name of the record kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Position(_) => "position",
            Record::ErrorEstimate(_) => "error-estimate",
            Record::ActiveSatellites(_) => "active-satellites",
            Record::Visibility(_) => "visibility",
        }
    }
}

/// Turns one line of text into a record.
///
/// Implementations must not panic on malformed input.
pub trait SentenceDecoder: Send + Sync {
    fn decode(&self, line: &str) -> Result<Record, DecodeError>;
}

/// Decoder for NMEA 0183 GGA, GST, GSA and GSV sentences.
#[derive(Debug, Clone)]
pub struct NmeaDecoder {
    require_start_marker: bool,
}

impl NmeaDecoder {
    pub fn new(require_start_marker: bool) -> Self {
        Self {
            require_start_marker,
        }
    }
}

impl Default for NmeaDecoder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SentenceDecoder for NmeaDecoder {
    fn decode(&self, line: &str) -> Result<Record, DecodeError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(DecodeError::Empty);
        }

        let body = match line.strip_prefix(['$', '!']) {
            Some(rest) => rest,
            None if self.require_start_marker => return Err(DecodeError::MissingStartMarker),
            None => line,
        };
        let body = body.split_once('*').map_or(body, |(data, _checksum)| data);

        let fields: Vec<&str> = body.split(',').collect();
        let address = fields[0];
        if address.len() != 5 || !address.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(DecodeError::BadAddress(address.to_string()));
        }
        let (talker, sentence) = address.split_at(2);
        let talker = Talker::new(talker);

        match sentence {
            "GGA" => parse_gga(&fields).map(Record::Position),
            "GST" => parse_gst(&fields).map(Record::ErrorEstimate),
            "GSA" => parse_gsa(talker, &fields).map(Record::ActiveSatellites),
            "GSV" => parse_gsv(talker, &fields).map(Record::Visibility),
            other => Err(DecodeError::Unsupported(other.to_string())),
        }
    }
}

/// Decode a line with the default [`NmeaDecoder`].
pub fn parse_sentence(line: &str) -> Result<Record, DecodeError> {
    NmeaDecoder::default().decode(line)
}

// ============================================================================
// Sentence parsers
// ============================================================================

fn require_fields(
    sentence: &'static str,
    fields: &[&str],
    expected: usize,
) -> Result<(), DecodeError> {
    if fields.len() < expected {
        return Err(DecodeError::TooFewFields {
            sentence,
            found: fields.len(),
            expected,
        });
    }
    Ok(())
}

/// GGA: time, lat, N/S, lon, E/W, quality, satellites, hdop, altitude, M, ...
fn parse_gga(fields: &[&str]) -> Result<Position, DecodeError> {
    const S: &str = "GGA";
    require_fields(S, fields, 10)?;

    Ok(Position {
        time: parse_time(S, fields[1])?,
        latitude: parse_coordinate(S, "latitude", fields[2], fields[3], 'N', 'S')?,
        longitude: parse_coordinate(S, "longitude", fields[4], fields[5], 'E', 'W')?,
        fix_quality: parse_opt(S, "fix quality", fields[6])?.unwrap_or(0),
        satellites_used: parse_opt(S, "satellites used", fields[7])?.unwrap_or(0),
        hdop: parse_float(S, "hdop", fields[8])?,
        altitude: parse_float(S, "altitude", fields[9])?,
    })
}

/// GST: time, rms, semi-major, semi-minor, orientation, lat err, lon err, alt err
fn parse_gst(fields: &[&str]) -> Result<ErrorEstimate, DecodeError> {
    const S: &str = "GST";
    require_fields(S, fields, 9)?;

    Ok(ErrorEstimate {
        time: parse_time(S, fields[1])?,
        rms: parse_float(S, "rms", fields[2])?,
        latitude_error: parse_float(S, "latitude error", fields[6])?,
        longitude_error: parse_float(S, "longitude error", fields[7])?,
        altitude_error: parse_float(S, "altitude error", fields[8])?,
    })
}

/// GSA: mode, fix type, 12 satellite slots, pdop, hdop, vdop[, system id]
fn parse_gsa(talker: Talker, fields: &[&str]) -> Result<ActiveSatelliteList, DecodeError> {
    const S: &str = "GSA";
    require_fields(S, fields, 18)?;

    let mut prns = Vec::with_capacity(12);
    for slot in &fields[3..15] {
        if let Some(prn) = parse_opt::<u32>(S, "satellite number", slot)? {
            if prn > 0 {
                prns.push(prn);
            }
        }
    }

    Ok(ActiveSatelliteList {
        talker,
        selection_mode: fields[1].chars().next(),
        fix_type: parse_opt(S, "fix type", fields[2])?,
        prns,
        pdop: parse_float(S, "pdop", fields[15])?,
        hdop: parse_float(S, "hdop", fields[16])?,
        vdop: parse_float(S, "vdop", fields[17])?,
        system_id: match fields.get(18) {
            Some(id) => parse_hex(S, "system id", id)?,
            None => None,
        },
    })
}

/// GSV: total parts, part, satellites in view, {prn, elevation, azimuth, snr}*[, signal id]
fn parse_gsv(talker: Talker, fields: &[&str]) -> Result<VisibilityReport, DecodeError> {
    const S: &str = "GSV";
    require_fields(S, fields, 4)?;

    let total_parts = parse_part_number(S, "total parts", fields[1])?;
    let part = parse_part_number(S, "part index", fields[2])?;
    let satellites_in_view = parse_opt(S, "satellites in view", fields[3])?;

    let mut blocks = &fields[4..];
    let signal = match blocks.len() % 4 {
        0 => None,
        1 => match blocks.split_last() {
            Some((id, rest)) => {
                blocks = rest;
                parse_hex(S, "signal id", id)?
            }
            None => None,
        },
        _ => {
            return Err(DecodeError::InvalidField {
                sentence: S,
                field: "satellite block",
                value: blocks.join(","),
            })
        }
    };

    let satellites = blocks
        .chunks_exact(4)
        .map(|block| -> Result<SatelliteObservation, DecodeError> {
            Ok(SatelliteObservation {
                prn: parse_opt(S, "satellite number", block[0])?.unwrap_or(0),
                elevation: parse_float(S, "elevation", block[1])?,
                azimuth: parse_float(S, "azimuth", block[2])?,
                snr: parse_float(S, "snr", block[3])?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(VisibilityReport {
        talker,
        signal,
        part,
        total_parts,
        satellites_in_view,
        satellites,
    })
}

// ============================================================================
// Field parsers
// ============================================================================

fn invalid(sentence: &'static str, field: &'static str, value: &str) -> DecodeError {
    DecodeError::InvalidField {
        sentence,
        field,
        value: value.to_string(),
    }
}

/// Parse an optional field. Empty means `None`.
fn parse_opt<T: FromStr>(
    sentence: &'static str,
    field: &'static str,
    value: &str,
) -> Result<Option<T>, DecodeError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| invalid(sentence, field, value))
}

/// Parse an optional number, rejecting NaN and infinities.
fn parse_float(
    sentence: &'static str,
    field: &'static str,
    value: &str,
) -> Result<Option<f64>, DecodeError> {
    match parse_opt::<f64>(sentence, field, value)? {
        Some(number) if !number.is_finite() => Err(invalid(sentence, field, value)),
        number => Ok(number),
    }
}

fn parse_required<T: FromStr>(
    sentence: &'static str,
    field: &'static str,
    value: &str,
) -> Result<T, DecodeError> {
    parse_opt(sentence, field, value)?.ok_or_else(|| invalid(sentence, field, value))
}

/// Parse a GSV part count or index, capped at [`MAX_GSV_PARTS`].
fn parse_part_number(
    sentence: &'static str,
    field: &'static str,
    value: &str,
) -> Result<u8, DecodeError> {
    let number: u8 = parse_required(sentence, field, value)?;
    if number > MAX_GSV_PARTS {
        return Err(invalid(sentence, field, value));
    }
    Ok(number)
}

fn parse_hex(
    sentence: &'static str,
    field: &'static str,
    value: &str,
) -> Result<Option<u8>, DecodeError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    u8::from_str_radix(value, 16)
        .map(Some)
        .map_err(|_| invalid(sentence, field, value))
}

/// Parse "hhmmss" or "hhmmss.sss" UTC time.
fn parse_time(sentence: &'static str, value: &str) -> Result<Option<NaiveTime>, DecodeError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value.len() < 6 || !value.is_ascii() {
        return Err(invalid(sentence, "time", value));
    }

    let hours: u32 = parse_required(sentence, "time", &value[0..2])?;
    let minutes: u32 = parse_required(sentence, "time", &value[2..4])?;
    let seconds: f64 = parse_required(sentence, "time", &value[4..])?;
    if !(0.0..61.0).contains(&seconds) {
        return Err(invalid(sentence, "time", value));
    }

    let whole = seconds.trunc() as u32;
    let nanos = ((seconds - seconds.trunc()) * 1e9).round() as u32;
    NaiveTime::from_hms_nano_opt(hours, minutes, whole, nanos.min(999_999_999))
        .map(Some)
        .ok_or_else(|| invalid(sentence, "time", value))
}

/// Parse a "dddmm.mmmm" coordinate with its hemisphere into signed degrees.
fn parse_coordinate(
    sentence: &'static str,
    field: &'static str,
    value: &str,
    hemisphere: &str,
    positive: char,
    negative: char,
) -> Result<Option<f64>, DecodeError> {
    let Some(raw) = parse_float(sentence, field, value)? else {
        return Ok(None);
    };

    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    if raw < 0.0 || minutes >= 60.0 {
        return Err(invalid(sentence, field, value));
    }
    let decimal = degrees + minutes / 60.0;

    match hemisphere.trim().chars().next() {
        Some(c) if c == positive => Ok(Some(decimal)),
        Some(c) if c == negative => Ok(Some(-decimal)),
        _ => Err(invalid(sentence, field, hemisphere)),
    }
}
