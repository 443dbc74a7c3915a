//! Frequency estimation from consecutive timestamp differences.

use std::collections::{HashMap, hash_map::Entry};

use chrono::Duration;
use log::debug;
use snafu::prelude::*;

use crate::error::{InsufficientDataSnafu, Result};
use crate::index::OrderedTimestamps;

/// Guess the nominal sampling interval of `seq`.
///
/// Returns the most frequent consecutive difference `seq[i + 1] - seq[i]`.
/// When several differences are equally frequent, the one encountered first
/// wins; callers should not rely on that tie-break.
///
/// The result is not validated: a sequence made mostly of duplicates yields
/// a zero interval, which the segmenter rejects.
///
/// # Errors
/// [`crate::TimeGroupError::InsufficientData`] if `seq` has fewer than two
/// timestamps.
pub fn guess_freq<S>(seq: &S) -> Result<Duration>
where
    S: OrderedTimestamps + ?Sized,
{
    let len = seq.len();
    ensure!(len >= 2, InsufficientDataSnafu { len });

    // Counts in first-seen order, so ties resolve to the earliest difference.
    let mut slots: HashMap<Duration, usize> = HashMap::new();
    let mut counts: Vec<(Duration, usize)> = Vec::new();

    for i in 0..len - 1 {
        let diff = seq.diff_at(i);
        match slots.entry(diff) {
            Entry::Occupied(slot) => counts[*slot.get()].1 += 1,
            Entry::Vacant(slot) => {
                slot.insert(counts.len());
                counts.push((diff, 1));
            }
        }
    }

    let (mut best, mut best_count) = counts[0];
    for &(diff, count) in &counts[1..] {
        if count > best_count {
            best = diff;
            best_count = count;
        }
    }

    debug!(
        "guessed frequency {best} from {} distinct differences ({best_count} of {} steps)",
        counts.len(),
        len - 1
    );
    Ok(best)
}
