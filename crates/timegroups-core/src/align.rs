//! Snap a table onto a regular time grid.
//!
//! Alignment runs in three steps over the resolved timestamp axis:
//!
//! 1. every timestamp is rounded to the nearest multiple of `freq` counted
//!    from the Unix epoch (exact ties go to the later grid point);
//! 2. rows that land on the same grid point are collapsed according to a
//!    [`DuplicatePolicy`];
//! 3. the result is re-expanded onto every grid point between the first and
//!    last one, with null values in the rows that had no source row.
//!
//! All grid arithmetic happens on raw ticks of the column's Arrow unit, in
//! `i128` so that rounding near the ends of the `i64` range cannot wrap.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{ArrayRef, UInt64Array};
use arrow::compute::take;
use arrow::datatypes::{FieldRef, Schema, SchemaRef, TimeUnit};
use chrono::Duration;
use log::debug;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::error::{
    ArrowSnafu, DuplicateTimestampSnafu, GridTooLargeSnafu, Result, TimeGroupError,
    TimestampOverflowSnafu, UnrepresentableFrequencySnafu, ensure_positive_freq,
};
use crate::index::{duration_nanos, nanos_per_tick, tick_to_datetime, unit_label};
use crate::table::{KeyedBatch, TimeTable, TimestampLocator, batch_from_columns};

/// What to do with rows whose timestamps round to the same grid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Keep the first row in original row order.
    #[default]
    #[serde(alias = "silent")]
    First,
    /// Keep the last row in original row order.
    Last,
    /// Fail with [`TimeGroupError::DuplicateTimestamp`].
    #[serde(alias = "error")]
    Reject,
}

/// Error returned when a duplicate policy name is not recognized.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(display("unknown duplicate policy '{value}' (expected first|last|reject)"))]
pub struct ParseDuplicatePolicyError {
    /// The rejected input.
    value: String,
}

impl FromStr for DuplicatePolicy {
    type Err = ParseDuplicatePolicyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "first" | "silent" => Ok(DuplicatePolicy::First),
            "last" => Ok(DuplicatePolicy::Last),
            "reject" | "error" => Ok(DuplicatePolicy::Reject),
            _ => ParseDuplicatePolicySnafu { value: input }.fail(),
        }
    }
}

impl fmt::Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DuplicatePolicy::First => "first",
            DuplicatePolicy::Last => "last",
            DuplicatePolicy::Reject => "reject",
        };
        f.write_str(name)
    }
}

/// Align `table` to a regular grid of step `freq`.
///
/// The output is sorted by timestamp, holds exactly one row per grid point
/// from the first to the last rounded timestamp, and declares `freq` on its
/// index (for indexed tables). Value fields become nullable; rows inserted
/// for missing grid points are null in every value column. The input is not
/// modified.
///
/// # Errors
/// - [`TimeGroupError::InvalidFrequency`] for a zero or negative `freq`.
/// - [`TimeGroupError::UnrepresentableFrequency`] when `freq` is not a whole
///   number of ticks of the timestamp column's unit.
/// - [`TimeGroupError::DuplicateTimestamp`] when `policy` is
///   [`DuplicatePolicy::Reject`] and two rows share a grid point.
/// - [`TimeGroupError::GridTooLarge`] when the grid between the first and
///   last point cannot be allocated.
/// - [`TimeGroupError::Configuration`] when `locator` does not fit the table.
pub fn align_to_grid(
    table: &TimeTable,
    freq: Duration,
    locator: &TimestampLocator,
    policy: DuplicatePolicy,
) -> Result<TimeTable> {
    let keyed = KeyedBatch::resolve(table, locator)?;
    align_keyed(&keyed, freq, policy)?.into_table()
}

pub(crate) fn align_keyed(
    keyed: &KeyedBatch,
    freq: Duration,
    policy: DuplicatePolicy,
) -> Result<KeyedBatch> {
    let unit = keyed.axis.unit();
    let step = freq_ticks(freq, unit)?;

    let rounded = keyed
        .axis
        .values()
        .iter()
        .map(|&raw| round_to_grid(raw, step, unit))
        .collect::<Result<Vec<i64>>>()?;

    // Stable sort: rows sharing a grid point stay in original row order.
    let mut order: Vec<usize> = (0..rounded.len()).collect();
    order.sort_by_key(|&row| rounded[row]);

    let mut picked: Vec<(i64, usize)> = Vec::with_capacity(order.len());
    for row in order {
        let ts = rounded[row];
        match picked.last_mut() {
            Some((last_ts, last_row)) if *last_ts == ts => match policy {
                DuplicatePolicy::First => {}
                DuplicatePolicy::Last => *last_row = row,
                DuplicatePolicy::Reject => {
                    let timestamp =
                        tick_to_datetime(unit, ts).context(TimestampOverflowSnafu {
                            operation: "reporting a duplicate grid point",
                        })?;
                    return DuplicateTimestampSnafu { timestamp, freq }.fail();
                }
            },
            _ => picked.push((ts, row)),
        }
    }
    let collapsed = rounded.len() - picked.len();

    let (grid, indices) = expand_grid(&picked, step, unit)?;
    let inserted = grid.len() - picked.len();

    let indices = UInt64Array::from(indices);
    let columns = keyed
        .data
        .columns()
        .iter()
        .map(|column| take(column.as_ref(), &indices, None))
        .collect::<std::result::Result<Vec<ArrayRef>, _>>()
        .context(ArrowSnafu)?;
    let data = batch_from_columns(nullable_schema(&keyed.data.schema()), columns, grid.len())?;

    debug!(
        "aligned {} rows to a {freq} grid: {collapsed} duplicate(s) collapsed, {inserted} grid point(s) inserted",
        rounded.len()
    );

    let axis = keyed.axis.with_values(grid).with_freq(freq);
    Ok(keyed.with_parts(axis, data))
}

/// Number of `unit` ticks in one `freq` step.
pub(crate) fn freq_ticks(freq: Duration, unit: TimeUnit) -> Result<i64> {
    ensure_positive_freq(freq)?;
    let nanos = duration_nanos(freq);
    let per_tick = nanos_per_tick(unit) as i128;
    ensure!(
        nanos % per_tick == 0,
        UnrepresentableFrequencySnafu {
            freq,
            unit: unit_label(unit),
        }
    );
    i64::try_from(nanos / per_tick)
        .ok()
        .context(TimestampOverflowSnafu {
            operation: "converting the frequency to ticks",
        })
}

/// Round `raw` to the nearest multiple of `step`; ties go to the later point.
fn round_to_grid(raw: i64, step: i64, unit: TimeUnit) -> Result<i64> {
    let (raw, step) = (raw as i128, step as i128);
    let floor = raw.div_euclid(step) * step;
    let rounded = if (raw - floor) * 2 >= step {
        floor + step
    } else {
        floor
    };

    i64::try_from(rounded)
        .ok()
        .filter(|tick| tick_to_datetime(unit, *tick).is_some())
        .context(TimestampOverflowSnafu {
            operation: "rounding to the grid",
        })
}

/// Every grid point from the first to the last picked timestamp, with the
/// source row for each point (`None` where no row landed).
fn expand_grid(
    picked: &[(i64, usize)],
    step: i64,
    unit: TimeUnit,
) -> Result<(Vec<i64>, Vec<Option<u64>>)> {
    let (Some(&(first, _)), Some(&(last, _))) = (picked.first(), picked.last()) else {
        return Ok((Vec::new(), Vec::new()));
    };

    let span = (last as i128 - first as i128) / step as i128 + 1;
    let mut grid: Vec<i64> = Vec::new();
    let mut indices: Vec<Option<u64>> = Vec::new();
    let reserved = usize::try_from(span).ok().filter(|&points| {
        grid.try_reserve_exact(points).is_ok() && indices.try_reserve_exact(points).is_ok()
    });
    let Some(points) = reserved else {
        // Both ends passed `round_to_grid`, so they map to datetimes.
        let (Some(first), Some(last)) =
            (tick_to_datetime(unit, first), tick_to_datetime(unit, last))
        else {
            return TimestampOverflowSnafu {
                operation: format!("expanding a grid of {span} points"),
            }
            .fail();
        };
        return GridTooLargeSnafu {
            points: span,
            first,
            last,
        }
        .fail();
    };

    let mut source = picked.iter().peekable();
    let mut ts = first;
    for k in 0..points {
        if k > 0 {
            ts += step;
        }
        grid.push(ts);
        match source.peek() {
            Some(&&(at, row)) if at == ts => {
                indices.push(Some(row as u64));
                source.next();
            }
            _ => indices.push(None),
        }
    }
    Ok((grid, indices))
}

/// Same fields and metadata, every field nullable.
pub(crate) fn nullable_schema(schema: &Schema) -> SchemaRef {
    let fields: Vec<FieldRef> = schema
        .fields()
        .iter()
        .map(|field| Arc::new(field.as_ref().clone().with_nullable(true)))
        .collect();
    Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{OrderedTimestamps, TimeIndex};
    use crate::test_util::{
        TestResult, columnar_table, daily, f64_column, indexed_table, str_column, utc_date,
        value_batch,
    };
    use chrono::{DateTime, Utc};

    fn secs(raw: &[i64]) -> Vec<DateTime<Utc>> {
        raw.iter()
            .map(|s| DateTime::from_timestamp(*s, 0).expect("in range"))
            .collect()
    }

    fn axis_secs(table: &TimeTable, locator: &TimestampLocator) -> Vec<i64> {
        table.time_index(locator).expect("axis").values().to_vec()
    }

    #[test]
    fn rounding_ties_go_to_the_later_point() -> TestResult {
        assert_eq!(round_to_grid(29, 60, TimeUnit::Second)?, 0);
        assert_eq!(round_to_grid(30, 60, TimeUnit::Second)?, 60);
        assert_eq!(round_to_grid(90, 60, TimeUnit::Second)?, 120);
        assert_eq!(round_to_grid(-30, 60, TimeUnit::Second)?, 0);
        assert_eq!(round_to_grid(-31, 60, TimeUnit::Second)?, -60);
        Ok(())
    }

    #[test]
    fn rounding_past_i64_is_an_overflow() {
        let err = round_to_grid(i64::MAX - 1, 1_000, TimeUnit::Nanosecond).unwrap_err();
        assert!(matches!(err, TimeGroupError::TimestampOverflow { .. }));
    }

    #[test]
    fn frequency_must_fit_the_column_unit() {
        assert_eq!(freq_ticks(Duration::minutes(1), TimeUnit::Second).ok(), Some(60));
        assert_eq!(
            freq_ticks(Duration::milliseconds(1), TimeUnit::Microsecond).ok(),
            Some(1_000)
        );

        let err = freq_ticks(Duration::milliseconds(500), TimeUnit::Second).unwrap_err();
        assert!(matches!(err, TimeGroupError::UnrepresentableFrequency { .. }));
        assert!(err.is_invalid_frequency());

        let err = freq_ticks(Duration::zero(), TimeUnit::Second).unwrap_err();
        assert!(matches!(err, TimeGroupError::InvalidFrequency { .. }));
    }

    #[test]
    fn jittered_rows_snap_and_gaps_are_null() -> TestResult {
        // 0s, 61s, 150s (tie -> 180s), 239s on a one minute grid.
        let ts = secs(&[0, 61, 150, 239]);
        let table = indexed_table(&ts, &[Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);

        let aligned = align_to_grid(
            &table,
            Duration::minutes(1),
            &TimestampLocator::Index,
            DuplicatePolicy::First,
        )?;
        assert_eq!(axis_secs(&aligned, &TimestampLocator::Index), vec![0, 60, 120, 180, 240]);
        assert_eq!(
            f64_column(aligned.batch(), "value"),
            vec![Some(1.0), Some(2.0), None, Some(3.0), Some(4.0)]
        );
        assert_eq!(
            aligned.index().and_then(|i| i.freq()),
            Some(Duration::minutes(1))
        );
        Ok(())
    }

    #[test]
    fn aligned_output_has_single_step() -> TestResult {
        let ts = secs(&[3, 58, 200, 305, 299, 601]);
        let table = indexed_table(&ts, &[Some(0.0); 6]);
        let aligned = align_to_grid(
            &table,
            Duration::minutes(1),
            &TimestampLocator::Index,
            DuplicatePolicy::Last,
        )?;
        let index = aligned.index().expect("indexed");
        for i in 0..index.len() - 1 {
            assert_eq!(index.diff_at(i), Duration::minutes(1));
        }
        Ok(())
    }

    #[test]
    fn already_regular_table_is_unchanged() -> TestResult {
        let ts = daily(utc_date(2022, 1, 1), 4);
        let values = [Some(1.0), None, Some(3.0), Some(4.0)];
        let table = columnar_table(&ts, &values);
        let locator = TimestampLocator::column("ts");

        let once = align_to_grid(&table, Duration::days(1), &locator, DuplicatePolicy::First)?;
        assert_eq!(axis_secs(&once, &locator), axis_secs(&table, &locator));
        assert_eq!(f64_column(once.batch(), "value"), values.to_vec());

        let twice = align_to_grid(&once, Duration::days(1), &locator, DuplicatePolicy::First)?;
        assert_eq!(twice, once);
        Ok(())
    }

    #[test]
    fn duplicate_policies() -> TestResult {
        // 0s and 10s both round to 0 on a one minute grid.
        let ts = secs(&[0, 10, 60]);
        let table = indexed_table(&ts, &[Some(1.0), Some(2.0), Some(3.0)]);
        let run = |policy| {
            align_to_grid(&table, Duration::minutes(1), &TimestampLocator::Index, policy)
        };

        let first = run(DuplicatePolicy::First)?;
        assert_eq!(f64_column(first.batch(), "value"), vec![Some(1.0), Some(3.0)]);

        let last = run(DuplicatePolicy::Last)?;
        assert_eq!(f64_column(last.batch(), "value"), vec![Some(2.0), Some(3.0)]);

        let err = run(DuplicatePolicy::Reject).unwrap_err();
        match err {
            TimeGroupError::DuplicateTimestamp { timestamp, freq } => {
                assert_eq!(timestamp, DateTime::<Utc>::UNIX_EPOCH);
                assert_eq!(freq, Duration::minutes(1));
            }
            other => panic!("expected DuplicateTimestamp, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn duplicates_follow_original_row_order() -> TestResult {
        // Row order 20s, 0s: both round to 0, "first" is the 20s row.
        let ts = secs(&[20, 0]);
        let table = indexed_table(&ts, &[Some(20.0), Some(0.0)]);
        let aligned = align_to_grid(
            &table,
            Duration::minutes(1),
            &TimestampLocator::Index,
            DuplicatePolicy::First,
        )?;
        assert_eq!(f64_column(aligned.batch(), "value"), vec![Some(20.0)]);
        Ok(())
    }

    #[test]
    fn inserted_rows_are_null_in_every_value_column() -> TestResult {
        let ts = vec![utc_date(2022, 1, 1), utc_date(2022, 1, 3)];
        let table = columnar_table(&ts, &[Some(1.0), Some(3.0)]);
        let locator = TimestampLocator::column("ts");

        let aligned = align_to_grid(&table, Duration::days(1), &locator, DuplicatePolicy::First)?;
        let batch = aligned.batch();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(
            str_column(batch, "label"),
            vec![Some("row-0".to_string()), None, Some("row-1".to_string())]
        );
        assert!(batch.schema().field_with_name("label")?.is_nullable());
        assert!(!batch.schema().field_with_name("ts")?.is_nullable());
        Ok(())
    }

    #[test]
    fn oversized_grid_is_an_error() -> TestResult {
        let index = TimeIndex::new(TimeUnit::Nanosecond, vec![0, 2_000_000_000_000_000_000])?;
        let table = TimeTable::indexed(index, value_batch(&[Some(1.0), Some(2.0)]))?;

        let err = align_to_grid(
            &table,
            Duration::nanoseconds(1),
            &TimestampLocator::Index,
            DuplicatePolicy::First,
        )
        .unwrap_err();
        match err {
            TimeGroupError::GridTooLarge { points, first, .. } => {
                assert_eq!(points, 2_000_000_000_000_000_001);
                assert_eq!(first, DateTime::<Utc>::UNIX_EPOCH);
            }
            other => panic!("expected GridTooLarge, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn empty_table_stays_empty() -> TestResult {
        let table = indexed_table(&[], &[]);
        let aligned = align_to_grid(
            &table,
            Duration::days(1),
            &TimestampLocator::Index,
            DuplicatePolicy::Reject,
        )?;
        assert!(aligned.is_empty());
        Ok(())
    }

    #[test]
    fn sub_unit_frequency_is_rejected() {
        let table = indexed_table(&secs(&[0, 1]), &[Some(1.0), Some(2.0)]);
        let err = align_to_grid(
            &table,
            Duration::milliseconds(250),
            &TimestampLocator::Index,
            DuplicatePolicy::First,
        )
        .unwrap_err();
        assert!(err.is_invalid_frequency());
    }

    #[test]
    fn input_is_not_modified() -> TestResult {
        let ts = secs(&[0, 61, 150]);
        let table = indexed_table(&ts, &[Some(1.0), Some(2.0), Some(3.0)]);
        let before = table.clone();
        let _ = align_to_grid(
            &table,
            Duration::minutes(1),
            &TimestampLocator::Index,
            DuplicatePolicy::First,
        )?;
        assert_eq!(table, before);
        Ok(())
    }

    #[test]
    fn duplicate_policy_parsing_and_serde() {
        assert_eq!("first".parse(), Ok(DuplicatePolicy::First));
        assert_eq!("silent".parse(), Ok(DuplicatePolicy::First));
        assert_eq!(" LAST ".parse(), Ok(DuplicatePolicy::Last));
        assert_eq!("error".parse(), Ok(DuplicatePolicy::Reject));
        assert!("keep".parse::<DuplicatePolicy>().is_err());

        assert_eq!(DuplicatePolicy::Reject.to_string(), "reject");
        assert_eq!(
            serde_json::to_string(&DuplicatePolicy::Last).unwrap(),
            "\"last\""
        );
        let policy: DuplicatePolicy = serde_json::from_str("\"silent\"").unwrap();
        assert_eq!(policy, DuplicatePolicy::First);
    }
}
