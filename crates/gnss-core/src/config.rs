//! Accumulator configuration.
//!
//! Settings are plain serde types so that a binary can load them from a JSON
//! file and override single fields from the command line.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default staleness threshold for in-use and visible satellites.
pub const DEFAULT_STALE_THRESHOLD_MS: u64 = 5000;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value outside its allowed range.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// How visible satellites leave the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisibilityRetention {
    /// Each visible satellite expires after the stale threshold, like in-use
    /// satellites. A talker that goes quiet disappears from the snapshot.
    #[default]
    Timed,

    /// Visible satellites only leave when their talker completes a new report.
    UntilReplaced,
}

/// Settings for an accumulator instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccumulatorConfig {
    /// Age in milliseconds after which an entry is considered stale.
    pub stale_threshold_ms: u64,

    /// Expiry policy for visible satellites.
    pub visible_retention: VisibilityRetention,

    /// Reject lines that do not begin with '$' or '!'.
    pub require_start_marker: bool,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            stale_threshold_ms: DEFAULT_STALE_THRESHOLD_MS,
            visible_retention: VisibilityRetention::Timed,
            require_start_marker: true,
        }
    }
}

impl AccumulatorConfig {
    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stale_threshold_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "staleThresholdMs",
                reason: "must be greater than zero".to_string(),
            });
        }
        let representable = i64::try_from(self.stale_threshold_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .is_some();
        if !representable {
            return Err(ConfigError::InvalidValue {
                field: "staleThresholdMs",
                reason: format!("{} is too large", self.stale_threshold_ms),
            });
        }
        Ok(())
    }

    pub fn stale_threshold(&self) -> TimeDelta {
        // Saturate for configs built by hand without validate().
        let ms = i64::try_from(self.stale_threshold_ms).unwrap_or(i64::MAX);
        TimeDelta::try_milliseconds(ms).unwrap_or(TimeDelta::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AccumulatorConfig::default();
        assert_eq!(config.stale_threshold_ms, 5000);
        assert_eq!(config.visible_retention, VisibilityRetention::Timed);
        assert!(config.require_start_marker);
        assert_eq!(config.stale_threshold(), TimeDelta::milliseconds(5000));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = AccumulatorConfig::from_json(r#"{"visibleRetention":"untilReplaced"}"#).unwrap();
        assert_eq!(config.visible_retention, VisibilityRetention::UntilReplaced);
        assert_eq!(config.stale_threshold_ms, DEFAULT_STALE_THRESHOLD_MS);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let err = AccumulatorConfig::from_json(r#"{"staleThresholdMs":0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = AccumulatorConfig::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_serialize_round_names() {
        let json = serde_json::to_value(AccumulatorConfig::default()).unwrap();
        assert_eq!(json["staleThresholdMs"], 5000);
        assert_eq!(json["visibleRetention"], "timed");
        assert_eq!(json["requireStartMarker"], true);
    }
}
