//! Ordered timestamp sequences.
//!
//! The segmenter and the frequency estimator only need a narrow view of a
//! timestamp sequence: its length, indexed reads, consecutive differences and
//! (optionally) a declared frequency. That view is the [`OrderedTimestamps`]
//! trait. It is implemented for plain `DateTime<Utc>` slices and for
//! [`TimeIndex`], the Arrow-backed timestamp axis used by [`crate::TimeTable`].
//!
//! `TimeIndex` stores raw `i64` ticks in the Arrow timestamp unit of the
//! source column, so every comparison made by the splitter and the aligner is
//! exact in that unit.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, TimestampMicrosecondArray, TimestampMillisecondArray,
    TimestampNanosecondArray, TimestampSecondArray,
};
use arrow::datatypes::{DataType, TimeUnit};
use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, TimeGroupError};

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Read-only view over an ascending sequence of timestamps.
///
/// Duplicates are allowed. Ascending order is assumed but not checked: a
/// descending step produces a negative difference, which never counts as a gap.
pub trait OrderedTimestamps {
    /// Number of timestamps in the sequence.
    fn len(&self) -> usize;

    /// Whether the sequence holds no timestamps.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp at position `i`. Panics if `i >= len()`.
    fn at(&self, i: usize) -> DateTime<Utc>;

    /// Difference `at(i + 1) - at(i)`.
    fn diff_at(&self, i: usize) -> Duration {
        self.at(i + 1) - self.at(i)
    }

    /// Regular frequency declared by the container, if it carries one.
    fn declared_freq(&self) -> Option<Duration> {
        None
    }
}

impl OrderedTimestamps for [DateTime<Utc>] {
    fn len(&self) -> usize {
        <[DateTime<Utc>]>::len(self)
    }

    fn at(&self, i: usize) -> DateTime<Utc> {
        self[i]
    }
}

impl OrderedTimestamps for Vec<DateTime<Utc>> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn at(&self, i: usize) -> DateTime<Utc> {
        self[i]
    }
}

/// Nanoseconds covered by one tick of `unit`.
pub(crate) fn nanos_per_tick(unit: TimeUnit) -> i64 {
    match unit {
        TimeUnit::Second => 1_000_000_000,
        TimeUnit::Millisecond => 1_000_000,
        TimeUnit::Microsecond => 1_000,
        TimeUnit::Nanosecond => 1,
    }
}

/// Short label for a timestamp unit, used in error messages.
pub(crate) fn unit_label(unit: TimeUnit) -> &'static str {
    match unit {
        TimeUnit::Second => "s",
        TimeUnit::Millisecond => "ms",
        TimeUnit::Microsecond => "us",
        TimeUnit::Nanosecond => "ns",
    }
}

/// Total nanoseconds in a duration, without the `i64` overflow of
/// `Duration::num_nanoseconds`.
pub(crate) fn duration_nanos(d: Duration) -> i128 {
    d.num_seconds() as i128 * NANOS_PER_SECOND + d.subsec_nanos() as i128
}

/// Convert a raw tick in `unit` into a UTC datetime.
pub(crate) fn tick_to_datetime(unit: TimeUnit, raw: i64) -> Option<DateTime<Utc>> {
    match unit {
        TimeUnit::Second => DateTime::from_timestamp(raw, 0),
        TimeUnit::Millisecond => DateTime::from_timestamp_millis(raw),
        TimeUnit::Microsecond => DateTime::from_timestamp_micros(raw),
        TimeUnit::Nanosecond => Some(DateTime::from_timestamp_nanos(raw)),
    }
}

/// How to map a datetime with sub-tick precision onto a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickRounding {
    /// Largest tick not after the datetime.
    Floor,
    /// Smallest tick not before the datetime.
    Ceil,
    /// Only accept datetimes that fall exactly on a tick.
    Exact,
}

/// Convert a UTC datetime into a raw tick of `unit`.
///
/// Returns `None` if the result does not fit in `i64`, or if `rounding` is
/// `Exact` and the datetime is not a whole number of ticks.
pub(crate) fn datetime_to_tick(
    unit: TimeUnit,
    dt: DateTime<Utc>,
    rounding: TickRounding,
) -> Option<i64> {
    let total = dt.timestamp() as i128 * NANOS_PER_SECOND + dt.timestamp_subsec_nanos() as i128;
    let per = nanos_per_tick(unit) as i128;
    let floor = total.div_euclid(per);
    let rem = total.rem_euclid(per);
    let tick = match rounding {
        TickRounding::Floor => floor,
        TickRounding::Ceil if rem == 0 => floor,
        TickRounding::Ceil => floor + 1,
        TickRounding::Exact if rem == 0 => floor,
        TickRounding::Exact => return None,
    };
    i64::try_from(tick).ok()
}

/// Helper macro to pull raw `i64` ticks out of a timestamp array.
///
/// Downcasts `$array` to the concrete timestamp array type for its unit and
/// copies the value buffer. The caller has already rejected null slots, so
/// the buffer holds exactly the logical values.
macro_rules! raw_ticks {
    ($array_ty:ty, $array:expr, $column:expr) => {{
        $array
            .as_any()
            .downcast_ref::<$array_ty>()
            .map(|arr| arr.values().to_vec())
            .ok_or_else(|| TimeGroupError::UnsupportedTimeType {
                column: $column.to_string(),
                datatype: $array.data_type().clone(),
            })?
    }};
}

/// An owned, null-free timestamp axis backed by raw Arrow ticks.
///
/// Besides the values, a `TimeIndex` remembers the Arrow unit and timezone of
/// the column it came from (so it can be turned back into an identical Arrow
/// array), an optional name, and an optional declared frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeIndex {
    values: Vec<i64>,
    unit: TimeUnit,
    timezone: Option<Arc<str>>,
    name: Option<String>,
    freq: Option<Duration>,
}

impl TimeIndex {
    /// Build an index from raw ticks in `unit`.
    ///
    /// Fails with [`TimeGroupError::UnsupportedContainer`] if a tick cannot be
    /// represented as a `DateTime<Utc>`.
    pub fn new(unit: TimeUnit, values: Vec<i64>) -> Result<Self> {
        if let Some(raw) = values
            .iter()
            .copied()
            .find(|raw| tick_to_datetime(unit, *raw).is_none())
        {
            return Err(TimeGroupError::UnsupportedContainer {
                reason: format!(
                    "timestamp {raw}{} is outside the supported datetime range",
                    unit_label(unit)
                ),
            });
        }

        Ok(TimeIndex {
            values,
            unit,
            timezone: None,
            name: None,
            freq: None,
        })
    }

    /// Build an index from UTC datetimes stored at `unit` precision.
    ///
    /// Every datetime must fall exactly on a tick of `unit`.
    pub fn from_datetimes(unit: TimeUnit, datetimes: &[DateTime<Utc>]) -> Result<Self> {
        let mut values = Vec::with_capacity(datetimes.len());
        for dt in datetimes {
            let raw = datetime_to_tick(unit, *dt, TickRounding::Exact).ok_or_else(|| {
                TimeGroupError::UnsupportedContainer {
                    reason: format!(
                        "timestamp {dt} cannot be stored exactly at {} precision",
                        unit_label(unit)
                    ),
                }
            })?;
            values.push(raw);
        }
        TimeIndex::new(unit, values)
    }

    /// Build an index from an Arrow timestamp array of any unit.
    pub fn from_array(array: &dyn Array) -> Result<Self> {
        Self::from_column("index", array)
    }

    /// Build an index from the Arrow column called `column`.
    ///
    /// The column name only feeds error messages; it is not recorded as the
    /// index name.
    pub(crate) fn from_column(column: &str, array: &dyn Array) -> Result<Self> {
        let (unit, timezone) = match array.data_type() {
            DataType::Timestamp(unit, tz) => (*unit, tz.clone()),
            other => {
                return Err(TimeGroupError::UnsupportedTimeType {
                    column: column.to_string(),
                    datatype: other.clone(),
                });
            }
        };

        if array.null_count() > 0 {
            return Err(TimeGroupError::UnsupportedContainer {
                reason: format!(
                    "timestamp column {column} contains {} null value(s)",
                    array.null_count()
                ),
            });
        }

        let values = match unit {
            TimeUnit::Second => raw_ticks!(TimestampSecondArray, array, column),
            TimeUnit::Millisecond => raw_ticks!(TimestampMillisecondArray, array, column),
            TimeUnit::Microsecond => raw_ticks!(TimestampMicrosecondArray, array, column),
            TimeUnit::Nanosecond => raw_ticks!(TimestampNanosecondArray, array, column),
        };

        let mut index = TimeIndex::new(unit, values)?;
        index.timezone = timezone;
        Ok(index)
    }

    /// Attach a name (for example the original index column name).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach an IANA timezone or fixed offset, carried into Arrow output.
    pub fn with_timezone(mut self, timezone: impl Into<Arc<str>>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Declare the regular frequency of this index.
    pub fn with_freq(mut self, freq: Duration) -> Self {
        self.freq = Some(freq);
        self
    }

    /// Same axis with different values; unit, timezone and name are kept,
    /// the declared frequency is dropped.
    pub(crate) fn with_values(&self, values: Vec<i64>) -> Self {
        TimeIndex {
            values,
            unit: self.unit,
            timezone: self.timezone.clone(),
            name: self.name.clone(),
            freq: None,
        }
    }

    /// Raw ticks in [`TimeIndex::unit`].
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    /// Arrow timestamp unit of the ticks.
    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    /// Timezone annotation carried from the source column.
    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    /// Index name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Declared regular frequency, if any.
    pub fn freq(&self) -> Option<Duration> {
        self.freq
    }

    /// Arrow data type matching [`TimeIndex::to_array`].
    pub fn data_type(&self) -> DataType {
        DataType::Timestamp(self.unit, self.timezone.clone())
    }

    /// Iterate over the timestamps as UTC datetimes.
    pub fn datetimes(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        (0..self.values.len()).map(|i| self.at(i))
    }

    /// Materialize the axis as an Arrow timestamp array with the original
    /// unit and timezone.
    pub fn to_array(&self) -> ArrayRef {
        let tz = self.timezone.clone();
        let values = self.values.clone();
        match self.unit {
            TimeUnit::Second => Arc::new(TimestampSecondArray::from(values).with_timezone_opt(tz)),
            TimeUnit::Millisecond => {
                Arc::new(TimestampMillisecondArray::from(values).with_timezone_opt(tz))
            }
            TimeUnit::Microsecond => {
                Arc::new(TimestampMicrosecondArray::from(values).with_timezone_opt(tz))
            }
            TimeUnit::Nanosecond => {
                Arc::new(TimestampNanosecondArray::from(values).with_timezone_opt(tz))
            }
        }
    }
}

impl OrderedTimestamps for TimeIndex {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn at(&self, i: usize) -> DateTime<Utc> {
        // Every tick was range-checked on construction.
        tick_to_datetime(self.unit, self.values[i]).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    fn declared_freq(&self) -> Option<Duration> {
        self.freq
    }
}
