//! Core engine for splitting irregular time series into regular tables.
//!
//! Sensor, telemetry and market series nominally sample at a fixed interval
//! but arrive with missing stretches, repeated timestamps and jitter. This
//! crate turns such a series into a list of strictly regular, gap-free
//! Arrow tables, one per contiguous run:
//!
//! - Frequency inference from the most common step (`estimate` module).
//! - Gap detection: runs separated by steps larger than
//!   `gap_factor * freq` become separate [`TimeGroup`]s (`segment` module).
//! - Mapping groups back onto row ranges of a [`TimeTable`] (`split` module).
//! - Grid alignment with duplicate resolution (`align` module) and linear
//!   gap filling (`interpolate` module).
//! - The end-to-end [`get_freq_consistent_tables`] pipeline, optionally
//!   parallel across segments, configurable from JSON (`config` module).
//!
//! Tables are either an explicit [`TimeIndex`] plus value columns, or a
//! single batch whose timestamps live in a named column; a
//! [`TimestampLocator`] says which. Every operation returns new tables and
//! leaves its input untouched.
#![deny(missing_docs)]
pub mod align;
pub mod config;
pub mod error;
pub mod estimate;
pub mod frequency;
pub mod index;
pub mod interpolate;
pub mod pipeline;
pub mod segment;
pub mod split;
pub mod table;
pub mod time_group;

#[cfg(test)]
pub(crate) mod test_util;

pub use align::{DuplicatePolicy, ParseDuplicatePolicyError, align_to_grid};
pub use config::{ConfigError, PipelineConfig, RegularizeOptions};
pub use error::{Result, TimeGroupError};
pub use estimate::guess_freq;
pub use frequency::{Frequency, ParseFrequencyError};
pub use index::{OrderedTimestamps, TimeIndex};
pub use interpolate::{ResidualGap, interpolate_gaps, regularize, residual_gaps};
pub use pipeline::get_freq_consistent_tables;
pub use segment::{DEFAULT_GAP_FACTOR, get_time_groups};
pub use split::split_by_time_groups;
pub use table::{TimeTable, TimestampLocator};
pub use time_group::TimeGroup;
