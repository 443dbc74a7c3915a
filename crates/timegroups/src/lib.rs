//! # timegroups
//!
//! Split irregular time series into frequency-consistent, gap-free tables.
//!
//! This crate is the supported public entry point and provides a small, stable surface.
//!
//! ## Example
//!
//! ```rust,ignore
//! use timegroups::prelude::*;
//!
//! let config = PipelineConfig::from_json_str(r#"{ "freq": "1d", "timestamp_column": "ts" }"#)?;
//! let tables = config.run(&TimeTable::columnar(batch))?;
//! ```

/// Convenience prelude with the stable, supported surface.
pub mod prelude;

/// Lower-level building blocks of the pipeline.
pub mod steps {
    pub use timegroups_core::{
        align_to_grid, guess_freq, interpolate_gaps, regularize, residual_gaps,
        split_by_time_groups,
    };
}

pub use timegroups_core::{
    ConfigError, DEFAULT_GAP_FACTOR, DuplicatePolicy, Frequency, OrderedTimestamps,
    ParseDuplicatePolicyError, ParseFrequencyError, PipelineConfig, RegularizeOptions,
    ResidualGap, TimeGroup, TimeGroupError, TimeIndex, TimeTable, TimestampLocator,
    get_freq_consistent_tables, get_time_groups,
};
