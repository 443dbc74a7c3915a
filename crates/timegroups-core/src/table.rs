//! Timestamp-keyed tables.
//!
//! A [`TimeTable`] is one of two container shapes:
//!
//! - `Indexed`: an explicit [`TimeIndex`] plus a `RecordBatch` of value
//!   columns, rows matched 1:1 by position.
//! - `Columnar`: a single `RecordBatch` whose timestamps live in a named
//!   column, selected with [`TimestampLocator::Column`].
//!
//! Public operations resolve the shape exactly once, via
//! [`KeyedBatch::resolve`], into a uniform internal view (timestamp axis +
//! value columns + enough layout information to rebuild the original shape).
//! Downstream code never re-inspects the container shape.

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::datatypes::{FieldRef, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use snafu::prelude::*;

use crate::error::{ArrowSnafu, ConfigurationSnafu, Result, TimeGroupError};
use crate::index::{OrderedTimestamps, TimeIndex};

/// How to find the timestamp axis of a [`TimeTable`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TimestampLocator {
    /// Use the table's intrinsic timestamp index.
    #[default]
    Index,
    /// Use the named timestamp column.
    Column(String),
}

impl TimestampLocator {
    /// Locator for the timestamp column `name`.
    pub fn column(name: impl Into<String>) -> Self {
        TimestampLocator::Column(name.into())
    }
}

impl From<Option<String>> for TimestampLocator {
    fn from(column: Option<String>) -> Self {
        match column {
            Some(name) => TimestampLocator::Column(name),
            None => TimestampLocator::Index,
        }
    }
}

/// A table whose rows correspond 1:1 with a timestamp sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeTable {
    /// Value columns keyed by an explicit timestamp index.
    Indexed {
        /// Timestamp axis; `index.len() == data.num_rows()`.
        index: TimeIndex,
        /// Value columns.
        data: RecordBatch,
    },
    /// A batch that carries its timestamps in one of its own columns.
    Columnar(RecordBatch),
}

impl TimeTable {
    /// Pair an index with value columns.
    ///
    /// Fails with [`TimeGroupError::UnsupportedContainer`] when the row counts
    /// differ.
    pub fn indexed(index: TimeIndex, data: RecordBatch) -> Result<Self> {
        if index.len() != data.num_rows() {
            return Err(TimeGroupError::UnsupportedContainer {
                reason: format!(
                    "index has {} timestamps but data has {} rows",
                    index.len(),
                    data.num_rows()
                ),
            });
        }
        Ok(TimeTable::Indexed { index, data })
    }

    /// Wrap a batch that carries its own timestamp column.
    pub fn columnar(batch: RecordBatch) -> Self {
        TimeTable::Columnar(batch)
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        match self {
            TimeTable::Indexed { data, .. } => data.num_rows(),
            TimeTable::Columnar(batch) => batch.num_rows(),
        }
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// The intrinsic index, for `Indexed` tables.
    pub fn index(&self) -> Option<&TimeIndex> {
        match self {
            TimeTable::Indexed { index, .. } => Some(index),
            TimeTable::Columnar(_) => None,
        }
    }

    /// The underlying batch: value columns for `Indexed` tables, the whole
    /// batch (timestamp column included) for `Columnar` ones.
    pub fn batch(&self) -> &RecordBatch {
        match self {
            TimeTable::Indexed { data, .. } => data,
            TimeTable::Columnar(batch) => batch,
        }
    }

    /// Extract the timestamp axis selected by `locator`.
    pub fn time_index(&self, locator: &TimestampLocator) -> Result<TimeIndex> {
        KeyedBatch::resolve(self, locator).map(|keyed| keyed.axis)
    }
}

#[derive(Debug, Clone)]
enum Layout {
    Indexed,
    Column { position: usize, field: FieldRef },
}

/// Shape-independent view of a [`TimeTable`]: timestamp axis plus the
/// remaining value columns.
#[derive(Debug, Clone)]
pub(crate) struct KeyedBatch {
    pub(crate) axis: TimeIndex,
    pub(crate) data: RecordBatch,
    layout: Layout,
}

impl KeyedBatch {
    /// Resolve `table` against `locator`.
    ///
    /// - `Indexed` + `Index`: the intrinsic index.
    /// - `Indexed` + `Column(name)`: accepted only when `name` is the index
    ///   name; anything else is ambiguous.
    /// - `Columnar` + `Index`: no index to use, a column name is required.
    /// - `Columnar` + `Column(name)`: the named column, which must be a
    ///   null-free Arrow timestamp column.
    pub(crate) fn resolve(table: &TimeTable, locator: &TimestampLocator) -> Result<Self> {
        match (table, locator) {
            (TimeTable::Indexed { index, data }, TimestampLocator::Index) => {
                Ok(Self::from_index(index, data))
            }
            (TimeTable::Indexed { index, data }, TimestampLocator::Column(name)) => {
                ensure!(
                    index.name() == Some(name.as_str()),
                    ConfigurationSnafu {
                        reason: format!(
                            "table has a timestamp index ({}) but the locator names column {name}",
                            index.name().unwrap_or("unnamed")
                        ),
                    }
                );
                Ok(Self::from_index(index, data))
            }
            (TimeTable::Columnar(_), TimestampLocator::Index) => ConfigurationSnafu {
                reason: "table has no timestamp index; a timestamp column name is required",
            }
            .fail(),
            (TimeTable::Columnar(batch), TimestampLocator::Column(name)) => {
                let schema = batch.schema();
                let position = schema.index_of(name).map_err(|_| {
                    TimeGroupError::Configuration {
                        reason: format!("timestamp column {name} not found in table"),
                    }
                })?;
                let axis = TimeIndex::from_column(name, batch.column(position).as_ref())?;
                let field = schema.fields()[position].clone();

                let mut data = batch.clone();
                data.remove_column(position);

                Ok(KeyedBatch {
                    axis,
                    data,
                    layout: Layout::Column { position, field },
                })
            }
        }
    }

    fn from_index(index: &TimeIndex, data: &RecordBatch) -> Self {
        KeyedBatch {
            axis: index.clone(),
            data: data.clone(),
            layout: Layout::Indexed,
        }
    }

    /// Same layout, new axis and value columns.
    pub(crate) fn with_parts(&self, axis: TimeIndex, data: RecordBatch) -> Self {
        debug_assert_eq!(axis.len(), data.num_rows());
        KeyedBatch {
            axis,
            data,
            layout: self.layout.clone(),
        }
    }

    pub(crate) fn num_rows(&self) -> usize {
        self.axis.len()
    }

    /// Name of the timestamp column in `Columnar` layout.
    pub(crate) fn timestamp_column(&self) -> Option<&str> {
        match &self.layout {
            Layout::Indexed => None,
            Layout::Column { field, .. } => Some(field.name().as_str()),
        }
    }

    /// Rebuild a table of the original shape.
    pub(crate) fn into_table(self) -> Result<TimeTable> {
        match self.layout {
            Layout::Indexed => TimeTable::indexed(self.axis, self.data),
            Layout::Column { position, field } => {
                let data_schema = self.data.schema();
                let mut fields: Vec<FieldRef> = data_schema.fields().iter().cloned().collect();
                let mut columns: Vec<ArrayRef> = self.data.columns().to_vec();

                let field = field.as_ref().clone().with_data_type(self.axis.data_type());
                fields.insert(position, Arc::new(field));
                columns.insert(position, self.axis.to_array());

                let schema = Arc::new(Schema::new_with_metadata(
                    fields,
                    data_schema.metadata().clone(),
                ));
                let batch = batch_from_columns(schema, columns, self.axis.len())?;
                Ok(TimeTable::Columnar(batch))
            }
        }
    }
}

/// Build a batch with an explicit row count, so zero-column batches keep
/// their length.
pub(crate) fn batch_from_columns(
    schema: SchemaRef,
    columns: Vec<ArrayRef>,
    row_count: usize,
) -> Result<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(row_count));
    RecordBatch::try_new_with_options(schema, columns, &options).context(ArrowSnafu)
}
