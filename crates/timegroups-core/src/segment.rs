//! Gap detection: split an ordered timestamp sequence into time groups.
//!
//! A new group starts wherever the step between two consecutive timestamps
//! is strictly larger than `gap_factor * freq`. Smaller steps (including a
//! step of exactly `gap_factor * freq`) are treated as jitter and stay inside
//! the current group.

use chrono::Duration;
use log::debug;

use crate::error::{Result, ensure_positive_freq, ensure_valid_gap_factor};
use crate::estimate::guess_freq;
use crate::index::{OrderedTimestamps, duration_nanos};
use crate::time_group::TimeGroup;

/// Gap tolerance multiplier used when the caller has no preference.
pub const DEFAULT_GAP_FACTOR: f64 = 2.0;

/// Partition `seq` into maximal contiguous runs.
///
/// The frequency is taken from `freq` when given, otherwise from the
/// sequence's declared frequency, otherwise it is guessed with
/// [`guess_freq`]. A single-element sequence always forms one group and
/// needs no frequency.
///
/// The returned groups are in sequence order, cover every timestamp exactly
/// once and (for an ascending sequence) do not overlap.
///
/// # Errors
/// - [`crate::TimeGroupError::InvalidGapFactor`] for a negative or
///   non-finite `gap_factor`.
/// - [`crate::TimeGroupError::InvalidFrequency`] when the frequency in use is
///   zero or negative.
pub fn get_time_groups<S>(
    seq: &S,
    gap_factor: f64,
    freq: Option<Duration>,
) -> Result<Vec<TimeGroup>>
where
    S: OrderedTimestamps + ?Sized,
{
    ensure_valid_gap_factor(gap_factor)?;
    if let Some(freq) = freq {
        ensure_positive_freq(freq)?;
    }

    let len = seq.len();
    if len == 0 {
        return Ok(Vec::new());
    }
    if len == 1 {
        let only = seq.at(0);
        return Ok(vec![TimeGroup::new(only, only)]);
    }

    let freq = match freq.or_else(|| seq.declared_freq()) {
        Some(freq) => freq,
        None => guess_freq(seq)?,
    };
    ensure_positive_freq(freq)?;

    let threshold = gap_threshold(gap_factor, duration_nanos(freq));

    let mut begins = vec![0usize];
    let mut ends = Vec::new();
    for i in 0..len - 1 {
        // Steps are whole nanoseconds, so `step > floor(t)` iff `step > t`.
        if duration_nanos(seq.diff_at(i)) > threshold {
            ends.push(i);
            begins.push(i + 1);
        }
    }
    ends.push(len - 1);

    let groups: Vec<TimeGroup> = begins
        .into_iter()
        .zip(ends)
        .map(|(b, e)| TimeGroup::new(seq.at(b), seq.at(e)))
        .collect();

    debug!(
        "segmented {len} timestamps into {} time group(s) (freq {freq}, gap factor {gap_factor})",
        groups.len()
    );
    Ok(groups)
}

/// `floor(gap_factor * freq_ns)`, exact for every finite non-negative
/// `gap_factor` and positive `freq_ns`, saturating at `i128::MAX`.
fn gap_threshold(gap_factor: f64, freq_ns: i128) -> i128 {
    // gap_factor == mantissa * 2^exp, exactly.
    let bits = gap_factor.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = (bits & ((1 << 52) - 1)) as i128;
    let (mantissa, exp) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1 << 52), biased - 1075)
    };

    // freq_ns == high * 2^64 + low; both partial products fit in i128.
    let high = mantissa * (freq_ns >> 64);
    let low = mantissa * (freq_ns & i128::from(u64::MAX));

    if exp >= 0 {
        let exp = exp.unsigned_abs();
        return shl_saturating(high, 64 + exp).saturating_add(shl_saturating(low, exp));
    }
    let shift = exp.unsigned_abs();
    if shift <= 64 {
        shl_saturating(high, 64 - shift).saturating_add(low >> shift)
    } else {
        (high + (low >> 64)).checked_shr(shift - 64).unwrap_or(0)
    }
}

/// `value << shift` for a non-negative `value`, or `i128::MAX` if it would
/// not fit.
fn shl_saturating(value: i128, shift: u32) -> i128 {
    if value == 0 {
        0
    } else if shift >= value.leading_zeros() {
        i128::MAX
    } else {
        value << shift
    }
}
