use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, Float64Array, Int64Array, StringArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::index::TimeIndex;
use crate::table::TimeTable;

pub(crate) type TestResult = Result<(), Box<dyn std::error::Error>>;

pub(crate) fn utc_datetime(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .expect("valid UTC timestamp")
}

pub(crate) fn utc_date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    utc_datetime(year, month, day, 0, 0, 0)
}

/// `periods` consecutive days starting at `start`.
pub(crate) fn daily(start: DateTime<Utc>, periods: i64) -> Vec<DateTime<Utc>> {
    (0..periods).map(|i| start + Duration::days(i)).collect()
}

/// Daily runs concatenated, e.g. `&[((2022, 1, 1), 5), ((2022, 1, 8), 1)]`.
pub(crate) fn daily_runs(runs: &[((i32, u32, u32), i64)]) -> Vec<DateTime<Utc>> {
    runs.iter()
        .flat_map(|((y, m, d), n)| daily(utc_date(*y, *m, *d), *n))
        .collect()
}

pub(crate) fn seconds_index(datetimes: &[DateTime<Utc>]) -> TimeIndex {
    TimeIndex::from_datetimes(TimeUnit::Second, datetimes).expect("second-precision index")
}

pub(crate) fn value_batch(values: &[Option<f64>]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new("value", DataType::Float64, true)]));
    RecordBatch::try_new(schema, vec![Arc::new(Float64Array::from(values.to_vec()))])
        .expect("value batch")
}

/// Indexed table named `time` with a single nullable `value` column.
pub(crate) fn indexed_table(datetimes: &[DateTime<Utc>], values: &[Option<f64>]) -> TimeTable {
    let index = seconds_index(datetimes).with_name("time");
    TimeTable::indexed(index, value_batch(values)).expect("indexed table")
}

/// Column-keyed table: `ts` (seconds), `value` (f64), `label` (utf8).
pub(crate) fn columnar_table(datetimes: &[DateTime<Utc>], values: &[Option<f64>]) -> TimeTable {
    let ts: Vec<i64> = datetimes.iter().map(|dt| dt.timestamp()).collect();
    let labels: Vec<String> = (0..datetimes.len()).map(|i| format!("row-{i}")).collect();
    let schema = Arc::new(Schema::new(vec![
        Field::new("ts", DataType::Timestamp(TimeUnit::Second, None), false),
        Field::new("value", DataType::Float64, true),
        Field::new("label", DataType::Utf8, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(TimestampSecondArray::from(ts)),
            Arc::new(Float64Array::from(values.to_vec())),
            Arc::new(StringArray::from(labels)),
        ],
    )
    .expect("columnar batch");
    TimeTable::columnar(batch)
}

pub(crate) fn ints(values: &[Option<i64>]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

pub(crate) fn f64_column(batch: &RecordBatch, name: &str) -> Vec<Option<f64>> {
    let col = batch.column_by_name(name).expect("column present");
    let arr = col
        .as_any()
        .downcast_ref::<Float64Array>()
        .expect("Float64 column");
    (0..arr.len())
        .map(|i| if arr.is_null(i) { None } else { Some(arr.value(i)) })
        .collect()
}

pub(crate) fn str_column(batch: &RecordBatch, name: &str) -> Vec<Option<String>> {
    let col = batch.column_by_name(name).expect("column present");
    let arr = col
        .as_any()
        .downcast_ref::<StringArray>()
        .expect("Utf8 column");
    (0..arr.len())
        .map(|i| if arr.is_null(i) { None } else { Some(arr.value(i).to_string()) })
        .collect()
}
