#![allow(missing_docs)]

use std::sync::Arc;

use arrow::array::{Float64Array, TimestampSecondArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Duration, Utc};
use timegroups_core::{
    DuplicatePolicy, OrderedTimestamps, TimeTable, TimestampLocator, align_to_grid,
    get_time_groups, split_by_time_groups,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Deterministic pseudo-irregular minute series: mostly 60s steps, some
/// jitter, some long holes, a few repeated timestamps.
fn irregular_minutes(seed: u64, len: usize) -> Vec<i64> {
    let mut state = seed;
    let mut next = || {
        // xorshift64
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut t = 1_700_000_000i64;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(t);
        let step = match next() % 20 {
            0 => 0,
            1 => 60 * (3 + (next() % 10) as i64),
            2 | 3 => 60 + (next() % 21) as i64 - 10,
            _ => 60,
        };
        t += step;
    }
    out
}

fn to_datetimes(secs: &[i64]) -> Result<Vec<DateTime<Utc>>, &'static str> {
    secs.iter()
        .map(|s| DateTime::from_timestamp(*s, 0).ok_or("out of range"))
        .collect()
}

fn table(secs: &[i64]) -> Result<TimeTable, Box<dyn std::error::Error>> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("ts", DataType::Timestamp(TimeUnit::Second, None), false),
        Field::new("value", DataType::Float64, false),
    ]));
    let values: Vec<f64> = (0..secs.len()).map(|i| i as f64).collect();
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(TimestampSecondArray::from(secs.to_vec())),
            Arc::new(Float64Array::from(values)),
        ],
    )?;
    Ok(TimeTable::columnar(batch))
}

const SEEDS: [u64; 5] = [1, 7, 42, 1_234, 987_654_321];

#[test]
fn groups_partition_the_timestamps() -> TestResult {
    for seed in SEEDS {
        let ts = to_datetimes(&irregular_minutes(seed, 300))?;
        let groups = get_time_groups(&ts, 2.0, Some(Duration::minutes(1)))?;

        for t in &ts {
            assert_eq!(groups.iter().filter(|g| g.contains(*t)).count(), 1);
        }
        assert_eq!(groups[0].start, ts[0]);
        assert_eq!(groups[groups.len() - 1].end, ts[ts.len() - 1]);
        for pair in groups.windows(2) {
            assert!(pair[0].start <= pair[0].end);
            assert!(pair[0].end < pair[1].start);
        }
    }
    Ok(())
}

#[test]
fn larger_gap_factor_never_adds_groups() -> TestResult {
    for seed in SEEDS {
        let ts = to_datetimes(&irregular_minutes(seed, 300))?;
        let mut previous = usize::MAX;
        for factor in [0.0, 0.5, 1.0, 1.5, 2.0, 3.0, 5.0, 8.0, 20.0] {
            let count = get_time_groups(&ts, factor, Some(Duration::minutes(1)))?.len();
            assert!(count <= previous, "seed {seed}, factor {factor}");
            previous = count;
        }
    }
    Ok(())
}

#[test]
fn split_then_concat_reproduces_the_table() -> TestResult {
    let locator = TimestampLocator::column("ts");
    for seed in SEEDS {
        let secs = irregular_minutes(seed, 300);
        let table = table(&secs)?;
        let groups = get_time_groups(&table.time_index(&locator)?, 2.0, None)?;

        let parts = split_by_time_groups(&table, &groups, &locator)?;
        assert_eq!(parts.len(), groups.len());
        let batches: Vec<RecordBatch> = parts.iter().map(|p| p.batch().clone()).collect();
        let joined = concat_batches(&table.batch().schema(), &batches)?;
        assert_eq!(&joined, table.batch());
    }
    Ok(())
}

#[test]
fn aligned_tables_have_a_single_step() -> TestResult {
    let locator = TimestampLocator::column("ts");
    for seed in SEEDS {
        let table = table(&irregular_minutes(seed, 200))?;
        for policy in [DuplicatePolicy::First, DuplicatePolicy::Last] {
            let aligned = align_to_grid(&table, Duration::minutes(1), &locator, policy)?;
            let axis = aligned.time_index(&locator)?;
            for i in 0..axis.len() - 1 {
                assert_eq!(axis.diff_at(i), Duration::minutes(1));
            }
            assert!(axis.values().iter().all(|s| s % 60 == 0));
        }
    }
    Ok(())
}

#[test]
fn alignment_is_idempotent() -> TestResult {
    let locator = TimestampLocator::column("ts");
    for seed in SEEDS {
        let table = table(&irregular_minutes(seed, 200))?;
        let once = align_to_grid(&table, Duration::minutes(1), &locator, DuplicatePolicy::First)?;
        let twice = align_to_grid(&once, Duration::minutes(1), &locator, DuplicatePolicy::Reject)?;
        assert_eq!(twice, once);
    }
    Ok(())
}
