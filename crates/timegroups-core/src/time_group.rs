//! The `TimeGroup` value type: one contiguous run of timestamps.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// A maximal contiguous run of timestamps, bounded inclusively on both ends.
///
/// Time groups are produced by [`crate::segment::get_time_groups`]; a list of
/// groups built from one sequence is ordered and pairwise non-overlapping
/// (`groups[i].end < groups[i + 1].start`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeGroup {
    /// First timestamp of the run (inclusive).
    pub start: DateTime<Utc>,
    /// Last timestamp of the run (inclusive).
    pub end: DateTime<Utc>,
}

impl TimeGroup {
    /// Build a group from its inclusive bounds.
    ///
    /// `start <= end` holds for every group the segmenter builds from an
    /// ascending sequence; it is not enforced here.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        TimeGroup { start, end }
    }

    /// Time spanned by the group (`end - start`); zero for single-sample groups.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Whether `ts` falls inside `[start, end]`.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

impl fmt::Display for TimeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeGroup({}, {})", self.start, self.end)
    }
}
