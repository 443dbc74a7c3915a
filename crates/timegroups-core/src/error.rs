//! Error types and SNAFU context selectors for the segmentation pipeline.
//!
//! Every public operation in this crate returns [`TimeGroupError`]. Context
//! selectors are exposed crate-wide (via `#[snafu(visibility(pub(crate)))]`)
//! so the estimator, segmenter, splitter and aligner can attach context
//! without re-exporting selectors at the crate root.

use arrow::{datatypes::DataType, error::ArrowError};
use chrono::{DateTime, Duration, Utc};
use snafu::prelude::*;

/// Convenience alias used throughout the crate.
pub type Result<T, E = TimeGroupError> = std::result::Result<T, E>;

/// Errors from frequency inference, segmentation and regularization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TimeGroupError {
    /// A frequency had to be inferred from fewer than two timestamps.
    #[snafu(display(
        "Could not guess frequency: need at least 2 timestamps, got {len}"
    ))]
    InsufficientData {
        /// Number of timestamps that were available.
        len: usize,
    },

    /// A supplied, declared or inferred frequency is zero or negative.
    #[snafu(display("Invalid frequency {freq}: frequency must be strictly positive"))]
    InvalidFrequency {
        /// The offending frequency.
        freq: Duration,
    },

    /// The frequency cannot be expressed in the timestamp column's unit
    /// (for example 1.5ms against a millisecond column).
    #[snafu(display(
        "Invalid frequency {freq}: not a whole multiple of the timestamp unit {unit}"
    ))]
    UnrepresentableFrequency {
        /// The offending frequency.
        freq: Duration,
        /// Timestamp unit of the column being aligned.
        unit: String,
    },

    /// The gap tolerance multiplier is negative or not finite.
    #[snafu(display("Invalid gap factor {gap_factor}: expected a finite value >= 0"))]
    InvalidGapFactor {
        /// The offending multiplier.
        gap_factor: f64,
    },

    /// The timestamp locator is missing, ambiguous or names an absent column.
    #[snafu(display("Configuration error: {reason}"))]
    Configuration {
        /// Human-readable description of the locator problem.
        reason: String,
    },

    /// Two rows share a grid timestamp while the duplicate policy is `reject`.
    #[snafu(display("Duplicate timestamp {timestamp} after alignment to {freq}"))]
    DuplicateTimestamp {
        /// The grid timestamp shared by more than one row.
        timestamp: DateTime<Utc>,
        /// Grid frequency in use.
        freq: Duration,
    },

    /// The timestamp column exists but is not an Arrow timestamp type.
    #[snafu(display("Unsupported container: column {column} has type {datatype}, expected a timestamp"))]
    UnsupportedTimeType {
        /// Name of the column used as timestamp axis.
        column: String,
        /// Arrow data type encountered.
        datatype: DataType,
    },

    /// The table or sequence satisfies neither supported container shape.
    #[snafu(display("Unsupported container: {reason}"))]
    UnsupportedContainer {
        /// What made the container unusable.
        reason: String,
    },

    /// Grid arithmetic left the representable `i64` tick range.
    #[snafu(display("Timestamp arithmetic overflow while {operation}"))]
    TimestampOverflow {
        /// The step that overflowed.
        operation: String,
    },

    /// Re-expansion onto the grid needs more rows than can be allocated,
    /// typically a wide time span with a very fine frequency.
    #[snafu(display("Grid of {points} points between {first} and {last} is too large to allocate"))]
    GridTooLarge {
        /// Number of grid points the span would need.
        points: i128,
        /// First grid timestamp.
        first: DateTime<Utc>,
        /// Last grid timestamp.
        last: DateTime<Utc>,
    },

    /// Arrow compute or batch construction failed.
    #[snafu(display("Arrow error: {source}"))]
    Arrow {
        /// Underlying Arrow error.
        source: ArrowError,
    },
}

impl TimeGroupError {
    /// Whether this error belongs to the invalid-frequency family.
    pub fn is_invalid_frequency(&self) -> bool {
        matches!(
            self,
            TimeGroupError::InvalidFrequency { .. }
                | TimeGroupError::UnrepresentableFrequency { .. }
        )
    }

    /// Whether this error belongs to the unsupported-container family.
    pub fn is_unsupported_container(&self) -> bool {
        matches!(
            self,
            TimeGroupError::UnsupportedTimeType { .. }
                | TimeGroupError::UnsupportedContainer { .. }
        )
    }
}

/// Reject zero and negative frequencies.
pub(crate) fn ensure_positive_freq(freq: Duration) -> Result<()> {
    ensure!(freq > Duration::zero(), InvalidFrequencySnafu { freq });
    Ok(())
}

/// Reject negative, NaN and infinite gap factors.
pub(crate) fn ensure_valid_gap_factor(gap_factor: f64) -> Result<()> {
    ensure!(
        gap_factor.is_finite() && gap_factor >= 0.0,
        InvalidGapFactorSnafu { gap_factor }
    );
    Ok(())
}
