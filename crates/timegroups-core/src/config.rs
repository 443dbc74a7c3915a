//! Pipeline configuration.
//!
//! [`RegularizeOptions`] holds the tunables of
//! [`crate::get_freq_consistent_tables`]. [`PipelineConfig`] adds the target
//! frequency and timestamp column so a whole run can be described in JSON:
//!
//! ```json
//! { "freq": "15m", "timestamp_column": "ts", "gap_factor": 3.0, "duplicate_policy": "last" }
//! ```
//!
//! Missing tunables take their defaults (`gap_factor` 2.0, `duplicate_policy`
//! `first`, `parallel` false).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::align::DuplicatePolicy;
use crate::error::Result;
use crate::frequency::Frequency;
use crate::pipeline::get_freq_consistent_tables;
use crate::segment::DEFAULT_GAP_FACTOR;
use crate::table::{TimeTable, TimestampLocator};

/// Errors from loading a [`PipelineConfig`].
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[snafu(display("failed to read pipeline config {}: {source}", path.display()))]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration is not valid JSON for [`PipelineConfig`].
    #[snafu(display("failed to parse pipeline config: {source}"))]
    Json {
        /// Underlying `serde_json` error.
        source: serde_json::Error,
    },

    /// The gap factor is negative or not finite.
    #[snafu(display("invalid gap_factor {gap_factor}: expected a finite value >= 0"))]
    InvalidGapFactor {
        /// The offending value.
        gap_factor: f64,
    },

    /// The timestamp column name is empty.
    #[snafu(display("timestamp_column must not be empty"))]
    EmptyTimestampColumn,
}

fn default_gap_factor() -> f64 {
    DEFAULT_GAP_FACTOR
}

/// Tunables of the segmentation and regularization pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegularizeOptions {
    /// Gap tolerance multiplier: a step larger than `gap_factor * freq`
    /// starts a new segment.
    #[serde(default = "default_gap_factor")]
    pub gap_factor: f64,

    /// How rows that align to the same grid point are resolved.
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,

    /// Regularize segments on the rayon thread pool.
    #[serde(default)]
    pub parallel: bool,
}

impl Default for RegularizeOptions {
    fn default() -> Self {
        RegularizeOptions {
            gap_factor: DEFAULT_GAP_FACTOR,
            duplicate_policy: DuplicatePolicy::default(),
            parallel: false,
        }
    }
}

impl RegularizeOptions {
    /// Set the gap factor.
    pub fn with_gap_factor(mut self, gap_factor: f64) -> Self {
        self.gap_factor = gap_factor;
        self
    }

    /// Set the duplicate policy.
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Enable or disable parallel segment processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// A complete pipeline run: frequency, timestamp location and tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Target grid frequency.
    pub freq: Frequency,

    /// Timestamp column for column-keyed tables; `None` uses the table index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_column: Option<String>,

    /// Pipeline tunables.
    #[serde(flatten)]
    pub options: RegularizeOptions,
}

impl PipelineConfig {
    /// Config with default tunables.
    pub fn new(freq: Frequency) -> Self {
        PipelineConfig {
            freq,
            timestamp_column: None,
            options: RegularizeOptions::default(),
        }
    }

    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_json::from_str(json).context(JsonSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).context(IoSnafu { path })?;
        Self::from_json_str(&json)
    }

    /// Check values that serde alone cannot reject.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gap_factor = self.options.gap_factor;
        ensure!(
            gap_factor.is_finite() && gap_factor >= 0.0,
            InvalidGapFactorSnafu { gap_factor }
        );
        if let Some(column) = &self.timestamp_column {
            ensure!(!column.trim().is_empty(), EmptyTimestampColumnSnafu);
        }
        Ok(())
    }

    /// The timestamp locator described by this config.
    pub fn locator(&self) -> TimestampLocator {
        TimestampLocator::from(self.timestamp_column.clone())
    }

    /// Run [`get_freq_consistent_tables`] with this config.
    pub fn run(&self, table: &TimeTable) -> Result<Vec<TimeTable>> {
        get_freq_consistent_tables(table, self.freq.duration(), &self.locator(), &self.options)
    }
}
