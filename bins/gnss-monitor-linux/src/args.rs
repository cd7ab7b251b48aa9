//! CLI argument parsing using clap.

use clap::Parser;
use std::path::PathBuf;

use gnss_core::{AccumulatorConfig, VisibilityRetention};

/// Reads NMEA 0183 lines and prints the live GNSS receiver snapshot as JSON.
#[derive(Parser, Debug, Clone)]
#[command(name = "gnss-monitor")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// File with one NMEA sentence per line (default: stdin)
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,

    /// JSON accumulator configuration file
    #[arg(short = 'c', long, env = "GNSS_MONITOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the staleness threshold in milliseconds
    #[arg(long)]
    pub stale_ms: Option<u64>,

    /// Keep visible satellites until their talker reports again
    #[arg(long)]
    pub retain_visible: bool,

    /// Accept lines without a leading '$' or '!'
    #[arg(long)]
    pub allow_unmarked: bool,

    /// Minimum time between printed snapshots in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Print one snapshot when the input ends instead of on every change
    #[arg(long)]
    pub once: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl Args {
    /// Build the accumulator configuration: file first, then flag overrides.
    pub fn accumulator_config(&self) -> anyhow::Result<AccumulatorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("Failed to read config {}: {}", path.display(), e)
                })?;
                AccumulatorConfig::from_json(&text)?
            }
            None => AccumulatorConfig::default(),
        };

        if let Some(ms) = self.stale_ms {
            config.stale_threshold_ms = ms;
        }
        if self.retain_visible {
            config.visible_retention = VisibilityRetention::UntilReplaced;
        }
        if self.allow_unmarked {
            config.require_start_marker = false;
        }

        config.validate()?;
        Ok(config)
    }
}
