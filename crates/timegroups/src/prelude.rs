//! Wrapper prelude.
//!
//! The `timegroups` crate is the supported public entry point. Downstream code
//! should prefer importing from this prelude instead of depending on internal
//! core module paths.

pub use crate::steps;
pub use crate::{
    DuplicatePolicy, Frequency, OrderedTimestamps, PipelineConfig, RegularizeOptions, TimeGroup,
    TimeGroupError, TimeIndex, TimeTable, TimestampLocator, get_freq_consistent_tables,
    get_time_groups,
};
