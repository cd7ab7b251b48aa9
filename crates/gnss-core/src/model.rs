//! GNSS receiver data model types.
//!
//! These types describe what a receiver reports over NMEA 0183:
//! - Position fixes and their error estimates
//! - Satellite observations grouped by talker
//! - The aggregate snapshot handed out to consumers

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Two-letter NMEA talker identifier (e.g. "GP", "GL", "GA", "GB", "GN").
///
/// The talker reported by the receiver is authoritative for keying satellite
/// data. Use [`Talker::constellation`] to map it to a GNSS system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Talker(String);

impl Talker {
    /// Create a talker from its code. The code is upper-cased.
    pub fn new(code: &str) -> Self {
        Self(code.to_ascii_uppercase())
    }

    /// The talker code as received.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The constellation this talker speaks for, if it names a single one.
    ///
    /// Returns `None` for "GN" (multi-constellation) and unknown talkers.
    pub fn constellation(&self) -> Option<Constellation> {
        match self.0.as_str() {
            "GP" => Some(Constellation::Gps),
            "GL" => Some(Constellation::Glonass),
            "GA" => Some(Constellation::Galileo),
            "GB" | "BD" => Some(Constellation::BeiDou),
            "GQ" | "QZ" => Some(Constellation::Qzss),
            "GI" => Some(Constellation::Navic),
            _ => None,
        }
    }
}

impl fmt::Display for Talker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Talker {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// A satellite navigation system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constellation {
    Gps,
    Sbas,
    Glonass,
    Galileo,
    BeiDou,
    Qzss,
    Navic,
}

impl Constellation {
    /// Infer the constellation from an NMEA satellite number.
    ///
    /// Only meaningful when the talker does not identify a single system
    /// ("GN" or unknown). Ranges follow the NMEA 0183 v4 numbering:
    /// GPS 1-32, SBAS 33-64 and 120-158, GLONASS 65-96, Galileo 301-336,
    /// BeiDou 201-264 and 401-437, QZSS 193-199.
    pub fn from_prn(prn: u32) -> Option<Self> {
        match prn {
            1..=32 => Some(Self::Gps),
            33..=64 | 120..=158 => Some(Self::Sbas),
            65..=96 => Some(Self::Glonass),
            193..=199 => Some(Self::Qzss),
            201..=264 | 401..=437 => Some(Self::BeiDou),
            301..=336 => Some(Self::Galileo),
            _ => None,
        }
    }
}

/// GGA fix quality indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FixQuality {
    Invalid,
    Gps,
    Dgps,
    Pps,
    Rtk,
    FloatRtk,
    Estimated,
    Manual,
    Simulation,
    Unknown(u8),
}

impl From<u8> for FixQuality {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Invalid,
            1 => Self::Gps,
            2 => Self::Dgps,
            3 => Self::Pps,
            4 => Self::Rtk,
            5 => Self::FloatRtk,
            6 => Self::Estimated,
            7 => Self::Manual,
            8 => Self::Simulation,
            other => Self::Unknown(other),
        }
    }
}

/// Latest position fix (GGA). Replaced wholesale on every new fix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// UTC time of the fix as reported by the receiver
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,

    /// Latitude in signed decimal degrees (north positive)
    pub latitude: Option<f64>,

    /// Longitude in signed decimal degrees (east positive)
    pub longitude: Option<f64>,

    /// Altitude above mean sea level in meters
    pub altitude: Option<f64>,

    /// Raw GGA fix quality code
    pub fix_quality: u8,

    /// Number of satellites used in the fix
    pub satellites_used: u32,

    /// Horizontal dilution of precision
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hdop: Option<f64>,
}

impl Position {
    pub fn quality(&self) -> FixQuality {
        FixQuality::from(self.fix_quality)
    }

    /// True when the receiver reports a usable fix with coordinates.
    pub fn has_fix(&self) -> bool {
        self.fix_quality != 0 && self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Position error estimate (GST), 1-sigma in meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEstimate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,

    /// RMS of the pseudorange residuals
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rms: Option<f64>,

    pub latitude_error: Option<f64>,
    pub longitude_error: Option<f64>,
    pub altitude_error: Option<f64>,
}

/// One satellite entry from a satellites-in-view report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SatelliteObservation {
    /// Satellite number. Zero means the field was empty.
    pub prn: u32,

    /// Elevation in degrees (0-90)
    pub elevation: Option<f64>,

    /// Azimuth in degrees from true north (0-359)
    pub azimuth: Option<f64>,

    /// Signal to noise ratio in dB-Hz. `None` when tracked but not measured.
    pub snr: Option<f64>,
}

/// Identifies one stream of satellites-in-view reports.
///
/// NMEA 4.1 receivers tag each GSV series with a signal id so that several
/// bands from the same talker can interleave. Older receivers omit it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SequenceKey {
    pub talker: Talker,
    pub signal: Option<u8>,
}

impl SequenceKey {
    pub fn new(talker: Talker, signal: Option<u8>) -> Self {
        Self { talker, signal }
    }
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.signal {
            Some(signal) => write!(f, "{}-{}", self.talker, signal),
            None => write!(f, "{}", self.talker),
        }
    }
}

/// One part of a multi-sentence satellites-in-view report (GSV).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityReport {
    pub talker: Talker,

    /// NMEA 4.1 signal id, if present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<u8>,

    /// 1-based index of this part
    pub part: u8,

    /// Number of parts announced for the whole report
    pub total_parts: u8,

    /// Total satellites in view announced by the receiver
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satellites_in_view: Option<u32>,

    pub satellites: Vec<SatelliteObservation>,
}

impl VisibilityReport {
    pub fn key(&self) -> SequenceKey {
        SequenceKey::new(self.talker.clone(), self.signal)
    }
}

/// A visible satellite as held by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleSatellite {
    /// Talker that reported this satellite
    pub talker: Talker,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<u8>,

    /// Constellation from the talker, or inferred from the PRN for "GN"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constellation: Option<Constellation>,

    pub prn: u32,
    pub elevation: Option<f64>,
    pub azimuth: Option<f64>,
    pub snr: Option<f64>,

    pub last_seen: DateTime<Utc>,
}

impl VisibleSatellite {
    pub fn from_observation(
        key: &SequenceKey,
        observation: SatelliteObservation,
        now: DateTime<Utc>,
    ) -> Self {
        let constellation = key
            .talker
            .constellation()
            .or_else(|| Constellation::from_prn(observation.prn));

        Self {
            talker: key.talker.clone(),
            signal: key.signal,
            constellation,
            prn: observation.prn,
            elevation: observation.elevation,
            azimuth: observation.azimuth,
            snr: observation.snr,
            last_seen: now,
        }
    }
}

/// Satellite portion of a [`Snapshot`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SatelliteView {
    /// Visible satellites sorted ascending by PRN
    pub visible: Vec<VisibleSatellite>,

    /// Satellite numbers used in the fix, sorted ascending
    pub in_use: Vec<u32>,
}

/// Read-only view of the receiver state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub position: Option<Position>,
    pub error_estimate: Option<ErrorEstimate>,
    pub satellites: SatelliteView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_talker_constellation() {
        assert_eq!(Talker::new("GP").constellation(), Some(Constellation::Gps));
        assert_eq!(Talker::new("gl").constellation(), Some(Constellation::Glonass));
        assert_eq!(Talker::new("BD").constellation(), Some(Constellation::BeiDou));
        assert_eq!(Talker::new("GN").constellation(), None);
    }

    #[test]
    fn test_constellation_from_prn() {
        assert_eq!(Constellation::from_prn(7), Some(Constellation::Gps));
        assert_eq!(Constellation::from_prn(48), Some(Constellation::Sbas));
        assert_eq!(Constellation::from_prn(70), Some(Constellation::Glonass));
        assert_eq!(Constellation::from_prn(305), Some(Constellation::Galileo));
        assert_eq!(Constellation::from_prn(0), None);
    }

    #[test]
    fn test_visible_satellite_trusts_talker() {
        // PRN 70 is in the GLONASS range but the talker says GPS.
        let key = SequenceKey::new(Talker::new("GP"), None);
        let obs = SatelliteObservation {
            prn: 70,
            elevation: Some(10.0),
            azimuth: Some(20.0),
            snr: None,
        };
        let sat = VisibleSatellite::from_observation(&key, obs, Utc::now());
        assert_eq!(sat.constellation, Some(Constellation::Gps));
    }

    #[test]
    fn test_visible_satellite_infers_for_combined_talker() {
        let key = SequenceKey::new(Talker::new("GN"), None);
        let obs = SatelliteObservation {
            prn: 70,
            elevation: None,
            azimuth: None,
            snr: Some(33.0),
        };
        let sat = VisibleSatellite::from_observation(&key, obs, Utc::now());
        assert_eq!(sat.constellation, Some(Constellation::Glonass));
        assert_eq!(sat.talker.as_str(), "GN");
    }

    #[test]
    fn test_snapshot_serialize() {
        let snapshot = Snapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["position"].is_null());
        assert!(json["errorEstimate"].is_null());
        assert_eq!(json["satellites"]["visible"], serde_json::json!([]));
        assert_eq!(json["satellites"]["inUse"], serde_json::json!([]));
    }

    #[test]
    fn test_fix_quality_codes() {
        assert_eq!(FixQuality::from(0), FixQuality::Invalid);
        assert_eq!(FixQuality::from(4), FixQuality::Rtk);
        assert_eq!(FixQuality::from(42), FixQuality::Unknown(42));
    }
}
