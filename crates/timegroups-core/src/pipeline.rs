//! End-to-end pipeline: segment, split, regularize.

use chrono::Duration;
use log::debug;
use rayon::prelude::*;

use crate::config::RegularizeOptions;
use crate::error::{Result, ensure_positive_freq, ensure_valid_gap_factor};
use crate::interpolate::regularize_keyed;
use crate::segment::get_time_groups;
use crate::split::split_keyed;
use crate::table::{KeyedBatch, TimeTable, TimestampLocator};

/// Split `table` into frequency-consistent, gap-free sub-tables.
///
/// The timestamp axis selected by `locator` is segmented with `freq` and
/// `options.gap_factor`; each segment is then aligned to the `freq` grid
/// (resolving duplicates with `options.duplicate_policy`) and its gaps are
/// linearly interpolated. Results come back in segment order, whether or not
/// `options.parallel` is set.
///
/// A table without rows yields an empty list. The call is all-or-nothing:
/// if any segment fails, its error is returned and no tables are produced.
///
/// # Errors
/// Any [`crate::TimeGroupError`] raised by segmentation, splitting or
/// regularization, unchanged.
pub fn get_freq_consistent_tables(
    table: &TimeTable,
    freq: Duration,
    locator: &TimestampLocator,
    options: &RegularizeOptions,
) -> Result<Vec<TimeTable>> {
    ensure_positive_freq(freq)?;
    ensure_valid_gap_factor(options.gap_factor)?;

    let keyed = KeyedBatch::resolve(table, locator)?;
    if keyed.num_rows() == 0 {
        debug!("empty table, nothing to regularize");
        return Ok(Vec::new());
    }

    let groups = get_time_groups(&keyed.axis, options.gap_factor, Some(freq))?;
    let segments = split_keyed(&keyed, &groups)?;

    let regularize_segment = |(i, segment): (usize, &KeyedBatch)| -> Result<TimeTable> {
        let regular = regularize_keyed(segment, freq, options.duplicate_policy)?;
        debug!(
            "segment {i}: {} row(s) regularized into {} row(s)",
            segment.num_rows(),
            regular.num_rows()
        );
        regular.into_table()
    };

    if options.parallel {
        segments
            .par_iter()
            .enumerate()
            .map(&regularize_segment)
            .collect()
    } else {
        segments
            .iter()
            .enumerate()
            .map(&regularize_segment)
            .collect()
    }
}
