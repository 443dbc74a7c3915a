//! Human-friendly frequency specs such as `1d`, `15m` or `250ms`.

use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Errors produced when parsing a frequency spec (e.g. `15m`).
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ParseFrequencyError {
    /// The spec string was empty or only whitespace.
    #[snafu(display("frequency spec is empty"))]
    Empty,

    /// The spec did not start with a number.
    #[snafu(display("frequency spec '{spec}' is missing a numeric value"))]
    MissingNumber {
        /// The original spec string.
        spec: String,
    },

    /// The spec did not end with a unit.
    #[snafu(display(
        "frequency spec '{spec}' is missing a unit suffix (expected ns|us|ms|s|m|h|d)"
    ))]
    MissingUnit {
        /// The original spec string.
        spec: String,
    },

    /// The numeric portion failed to parse.
    #[snafu(display("invalid frequency value in '{spec}': {source}"))]
    InvalidNumber {
        /// The original spec string.
        spec: String,
        /// The parse error returned by `u64::from_str`.
        source: std::num::ParseIntError,
    },

    /// The numeric portion was zero.
    #[snafu(display("frequency must be > 0 (got {value}) in '{spec}'"))]
    NonPositive {
        /// The original spec string.
        spec: String,
        /// The parsed numeric value.
        value: u64,
    },

    /// The spec describes a span that does not fit in a `Duration`.
    #[snafu(display("frequency '{spec}' is too large"))]
    TooLarge {
        /// The original spec string.
        spec: String,
    },

    /// The unit suffix is not recognized.
    #[snafu(display(
        "unknown frequency unit '{unit}' in '{spec}' (expected ns|us|ms|s|m|h|d)"
    ))]
    UnknownUnit {
        /// The original spec string.
        spec: String,
        /// The unrecognized unit suffix.
        unit: String,
    },
}

/// A strictly positive sampling interval.
///
/// Parses from and displays as a compact spec: an integer followed by one of
/// `ns`, `us`, `ms`, `s`, `m`, `h`, `d` (common aliases such as `sec`, `min`,
/// `hours` are accepted). Serialized as the same string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Frequency(Duration);

impl Frequency {
    /// Wrap a duration. Returns `None` unless `duration` is strictly positive.
    pub fn new(duration: Duration) -> Option<Self> {
        (duration > Duration::zero()).then_some(Frequency(duration))
    }

    /// Parse a spec such as `1h` or `250ms`; same as `str::parse`.
    ///
    /// # Errors
    /// Returns [`ParseFrequencyError`] if the spec is empty, missing a unit,
    /// has an invalid or zero number, overflows, or uses an unsupported unit.
    pub fn parse(spec: &str) -> Result<Self, ParseFrequencyError> {
        spec.parse()
    }

    /// The interval as a `chrono::Duration`.
    pub fn duration(&self) -> Duration {
        self.0
    }
}

impl From<Frequency> for Duration {
    fn from(freq: Frequency) -> Self {
        freq.0
    }
}

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let spec = input.trim();
        if spec.is_empty() {
            return Err(ParseFrequencyError::Empty);
        }

        let Some(unit_start) = spec.find(|c: char| c.is_ascii_alphabetic()) else {
            return MissingUnitSnafu { spec }.fail();
        };
        if unit_start == 0 {
            return MissingNumberSnafu { spec }.fail();
        }

        let (num_str, unit_str) = spec.split_at(unit_start);
        let value: u64 = num_str
            .trim()
            .parse()
            .context(InvalidNumberSnafu { spec })?;
        ensure!(value > 0, NonPositiveSnafu { spec, value });

        let n = i64::try_from(value).ok().context(TooLargeSnafu { spec })?;
        let unit = unit_str.trim().to_ascii_lowercase();
        let duration = match unit.as_str() {
            "ns" | "nano" | "nanos" | "nanosecond" | "nanoseconds" => Some(Duration::nanoseconds(n)),
            "us" | "micro" | "micros" | "microsecond" | "microseconds" => {
                Some(Duration::microseconds(n))
            }
            "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => {
                Duration::try_milliseconds(n)
            }
            "s" | "sec" | "secs" | "second" | "seconds" => Duration::try_seconds(n),
            "m" | "min" | "mins" | "minute" | "minutes" => Duration::try_minutes(n),
            "h" | "hr" | "hrs" | "hour" | "hours" => Duration::try_hours(n),
            "d" | "day" | "days" => Duration::try_days(n),
            _ => {
                return UnknownUnitSnafu {
                    spec,
                    unit: unit_str.trim(),
                }
                .fail();
            }
        };

        duration.map(Frequency).context(TooLargeSnafu { spec })
    }
}

/// Largest unit first, so display picks the coarsest exact representation.
const DISPLAY_UNITS: [(i128, &str); 7] = [
    (86_400_000_000_000, "d"),
    (3_600_000_000_000, "h"),
    (60_000_000_000, "m"),
    (1_000_000_000, "s"),
    (1_000_000, "ms"),
    (1_000, "us"),
    (1, "ns"),
];

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = crate::index::duration_nanos(self.0);
        for (per, suffix) in DISPLAY_UNITS {
            if nanos % per == 0 {
                return write!(f, "{}{suffix}", nanos / per);
            }
        }
        write!(f, "{nanos}ns")
    }
}

impl TryFrom<String> for Frequency {
    type Error = ParseFrequencyError;

    fn try_from(spec: String) -> Result<Self, Self::Error> {
        spec.parse()
    }
}

impl From<Frequency> for String {
    fn from(freq: Frequency) -> Self {
        freq.to_string()
    }
}
