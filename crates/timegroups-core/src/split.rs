//! Map time groups onto row ranges of a table.

use arrow::array::{ArrayRef, Scalar};
use arrow::compute::filter_record_batch;
use arrow::compute::kernels::{boolean as boolean_kernels, cmp as cmp_kernels};
use arrow::datatypes::TimeUnit;
use chrono::{DateTime, Utc};
use log::debug;
use snafu::prelude::*;

use crate::error::{ArrowSnafu, Result};
use crate::index::{OrderedTimestamps, TickRounding, TimeIndex, datetime_to_tick};
use crate::table::{KeyedBatch, TimeTable, TimestampLocator};
use crate::time_group::TimeGroup;

/// Cut `table` into one sub-table per group, in group order.
///
/// A sub-table holds every row whose timestamp lies in the closed interval
/// `[group.start, group.end]`. Bounds are compared exactly in the unit of the
/// timestamp column: the lower bound is rounded up and the upper bound down
/// to that unit. A group that matches no row produces an empty sub-table.
///
/// # Errors
/// - [`crate::TimeGroupError::Configuration`] when `locator` does not fit the
///   table shape.
/// - [`crate::TimeGroupError::UnsupportedTimeType`] when the located column
///   is not a timestamp column.
pub fn split_by_time_groups(
    table: &TimeTable,
    groups: &[TimeGroup],
    locator: &TimestampLocator,
) -> Result<Vec<TimeTable>> {
    let keyed = KeyedBatch::resolve(table, locator)?;
    split_keyed(&keyed, groups)?
        .into_iter()
        .map(KeyedBatch::into_table)
        .collect()
}

pub(crate) fn split_keyed(keyed: &KeyedBatch, groups: &[TimeGroup]) -> Result<Vec<KeyedBatch>> {
    if keyed.axis.values().is_sorted() {
        return Ok(groups
            .iter()
            .map(|group| slice_group(keyed, group))
            .collect());
    }

    debug!("timestamp axis is not ascending, selecting rows with a mask per group");
    let ts = keyed.axis.to_array();
    groups
        .iter()
        .map(|group| select_group(keyed, &ts, group))
        .collect()
}

/// Rows of an ascending axis within `group`, found by binary search.
fn slice_group(keyed: &KeyedBatch, group: &TimeGroup) -> KeyedBatch {
    let axis = &keyed.axis;
    let values = axis.values();
    let (lo, hi) = match tick_range(axis.unit(), group.start, group.end) {
        Some((lower, upper)) => (
            values.partition_point(|raw| *raw < lower),
            values.partition_point(|raw| *raw <= upper),
        ),
        None => (0, 0),
    };

    if lo == hi {
        debug!("{group} matched no rows");
    }
    let kept = values[lo..hi].to_vec();
    keyed.with_parts(with_declared_freq(axis, kept), keyed.data.slice(lo, hi - lo))
}

fn select_group(keyed: &KeyedBatch, ts: &ArrayRef, group: &TimeGroup) -> Result<KeyedBatch> {
    let axis = &keyed.axis;
    let Some((lower, upper)) = tick_range(axis.unit(), group.start, group.end) else {
        debug!("{group} has no representable tick, selecting no rows");
        return Ok(keyed.with_parts(with_declared_freq(axis, Vec::new()), keyed.data.slice(0, 0)));
    };

    // One-element arrays sharing the axis unit and timezone, so the
    // comparison kernels broadcast them without type coercion.
    let lower = Scalar::new(axis.with_values(vec![lower]).to_array());
    let upper = Scalar::new(axis.with_values(vec![upper]).to_array());

    let ge_mask = cmp_kernels::gt_eq(ts, &lower).context(ArrowSnafu)?;
    let le_mask = cmp_kernels::lt_eq(ts, &upper).context(ArrowSnafu)?;
    let mask = boolean_kernels::and(&ge_mask, &le_mask).context(ArrowSnafu)?;

    // The axis is null-free, so the mask has no null slots either.
    let data = filter_record_batch(&keyed.data, &mask).context(ArrowSnafu)?;
    let kept: Vec<i64> = axis
        .values()
        .iter()
        .zip(mask.values().iter())
        .filter_map(|(raw, keep)| keep.then_some(*raw))
        .collect();

    if kept.is_empty() {
        debug!("{group} matched no rows");
    }
    Ok(keyed.with_parts(with_declared_freq(axis, kept), data))
}

/// A contiguous time range of a regular axis is still regular, so the
/// declared frequency survives the cut.
fn with_declared_freq(axis: &TimeIndex, values: Vec<i64>) -> TimeIndex {
    let sub = axis.with_values(values);
    match axis.declared_freq() {
        Some(freq) => sub.with_freq(freq),
        None => sub,
    }
}

/// Inclusive tick range covering `[start, end]` in `unit`.
///
/// Bounds that fall outside the `i64` tick range are clamped to it; `None`
/// means no tick can satisfy both bounds.
fn tick_range(unit: TimeUnit, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<(i64, i64)> {
    let lower = match datetime_to_tick(unit, start, TickRounding::Ceil) {
        Some(raw) => raw,
        None if start.timestamp() < 0 => i64::MIN,
        None => return None,
    };
    let upper = match datetime_to_tick(unit, end, TickRounding::Floor) {
        Some(raw) => raw,
        None if end.timestamp() > 0 => i64::MAX,
        None => return None,
    };
    (lower <= upper).then_some((lower, upper))
}
