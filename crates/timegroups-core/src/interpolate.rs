//! Linear gap filling on an aligned table.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Schema};
use chrono::Duration;
use log::warn;
use snafu::prelude::*;

use crate::align::{DuplicatePolicy, align_keyed};
use crate::error::{ArrowSnafu, Result};
use crate::table::{KeyedBatch, TimeTable, TimestampLocator, batch_from_columns};

/// Nulls left in one value column after interpolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResidualGap {
    /// Column name.
    pub column: String,
    /// Number of null values in that column.
    pub null_count: usize,
}

/// How a column takes part in interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Numeric {
    /// Filled in place.
    Float64,
    /// Filled in `f64`, then cast back.
    Float32,
    /// Integer column, always promoted to `Float64`.
    Integer,
}

fn numeric_kind(data_type: &DataType) -> Option<Numeric> {
    match data_type {
        DataType::Float64 => Some(Numeric::Float64),
        DataType::Float32 => Some(Numeric::Float32),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Some(Numeric::Integer),
        _ => None,
    }
}

/// Fill nulls in numeric value columns by linear interpolation.
///
/// Each null is replaced by the value on the straight line between the
/// nearest earlier and later non-null values of the same column, weighted by
/// timestamp distance. Columns are filled independently.
///
/// - Integer columns are promoted to `Float64`, with or without nulls, so
///   every table regularized from the same source shares one schema.
/// - `Float32` columns are filled in `f64` and cast back.
/// - Non-numeric columns, and NaN values, are left as they are.
/// - Nulls before the first or after the last non-null value of a column
///   have no anchor on one side and stay null; see [`residual_gaps`].
pub fn interpolate_gaps(table: &TimeTable, locator: &TimestampLocator) -> Result<TimeTable> {
    let keyed = KeyedBatch::resolve(table, locator)?;
    interpolate_keyed(&keyed)?.into_table()
}

pub(crate) fn interpolate_keyed(keyed: &KeyedBatch) -> Result<KeyedBatch> {
    let ticks = keyed.axis.values();
    let schema = keyed.data.schema();

    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for (field, column) in schema.fields().iter().zip(keyed.data.columns()) {
        let (field, column) = match numeric_kind(column.data_type()) {
            Some(Numeric::Integer) => {
                let promoted = field.as_ref().clone().with_data_type(DataType::Float64);
                (Arc::new(promoted), fill_column(ticks, column)?)
            }
            Some(Numeric::Float64) if column.null_count() > 0 => {
                (field.clone(), fill_column(ticks, column)?)
            }
            Some(Numeric::Float32) if column.null_count() > 0 => {
                let filled = fill_column(ticks, column)?;
                let back = cast(filled.as_ref(), &DataType::Float32).context(ArrowSnafu)?;
                (field.clone(), back)
            }
            _ => (field.clone(), column.clone()),
        };
        fields.push(field);
        columns.push(column);
    }

    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    let data = batch_from_columns(schema, columns, keyed.num_rows())?;
    Ok(keyed.with_parts(keyed.axis.clone(), data))
}

/// `column` as `Float64` with its nulls interpolated.
fn fill_column(ticks: &[i64], column: &ArrayRef) -> Result<ArrayRef> {
    let as_f64 = cast(column.as_ref(), &DataType::Float64).context(ArrowSnafu)?;
    Ok(Arc::new(fill_linear(ticks, as_f64.as_primitive::<Float64Type>())))
}

/// Linear interpolation of the null slots of `values` at positions `ticks`.
fn fill_linear(ticks: &[i64], values: &Float64Array) -> Float64Array {
    let mut out: Vec<Option<f64>> = values.iter().collect();

    // Last non-null anchor seen: (position, value).
    let mut prev: Option<(usize, f64)> = None;
    for next in 0..out.len() {
        let Some(v1) = out[next] else { continue };
        if let Some((p, v0)) = prev {
            let span = (ticks[next] as i128 - ticks[p] as i128) as f64;
            for k in p + 1..next {
                let w = if span == 0.0 {
                    0.0
                } else {
                    (ticks[k] as i128 - ticks[p] as i128) as f64 / span
                };
                out[k] = Some(v0 + (v1 - v0) * w);
            }
        }
        prev = Some((next, v1));
    }

    Float64Array::from(out)
}

/// Per value column, the number of nulls (columns without nulls are omitted).
///
/// After [`regularize`] these are the boundary nulls interpolation could not
/// fill, plus nulls in non-numeric columns for inserted grid rows.
pub fn residual_gaps(table: &TimeTable, locator: &TimestampLocator) -> Result<Vec<ResidualGap>> {
    let keyed = KeyedBatch::resolve(table, locator)?;
    Ok(keyed_residual_gaps(&keyed))
}

pub(crate) fn keyed_residual_gaps(keyed: &KeyedBatch) -> Vec<ResidualGap> {
    let schema = keyed.data.schema();
    schema
        .fields()
        .iter()
        .zip(keyed.data.columns())
        .filter(|(_, column)| column.null_count() > 0)
        .map(|(field, column)| ResidualGap {
            column: field.name().clone(),
            null_count: column.null_count(),
        })
        .collect()
}

/// Align `table` to a `freq` grid and interpolate the resulting gaps.
///
/// Equivalent to [`crate::align_to_grid`] followed by [`interpolate_gaps`].
/// Residual boundary nulls are logged at `warn` level.
pub fn regularize(
    table: &TimeTable,
    freq: Duration,
    locator: &TimestampLocator,
    policy: DuplicatePolicy,
) -> Result<TimeTable> {
    let keyed = KeyedBatch::resolve(table, locator)?;
    regularize_keyed(&keyed, freq, policy)?.into_table()
}

pub(crate) fn regularize_keyed(
    keyed: &KeyedBatch,
    freq: Duration,
    policy: DuplicatePolicy,
) -> Result<KeyedBatch> {
    let aligned = align_keyed(keyed, freq, policy)?;
    let filled = interpolate_keyed(&aligned)?;
    for gap in keyed_residual_gaps(&filled) {
        warn!(
            "column {} keeps {} null value(s) after interpolation",
            gap.column, gap.null_count
        );
    }
    Ok(filled)
}
