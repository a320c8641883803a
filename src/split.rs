//! Stratified train/test split
//!
//! The held-out size is `ceil(test_size * n)`. Each class contributes a
//! proportional share of it (floor, then the leftover rows go to the classes
//! with the largest fractional parts, lower class index first on ties). Rows
//! within a class are shuffled with a [`StdRng`] seeded from `seed`, so the
//! same table, fraction, and seed always give the same partition.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::dataset::Dataset;
use crate::{Error, Result};

/// Two row-disjoint subsets of a dataset.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    /// Rows used for fitting
    pub train: Dataset,
    /// Held-out rows used for scoring
    pub test: Dataset,
    /// Original row index of each training row, ascending
    pub train_rows: Vec<usize>,
    /// Original row index of each held-out row, ascending
    pub test_rows: Vec<usize>,
}

/// Split `dataset` into training and held-out rows, preserving class ratios.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if `test_size` is outside `(0, 1)`,
/// a class has fewer than two rows, or either side would be smaller than the
/// number of classes.
#[tracing::instrument(skip(dataset), fields(rows = dataset.n_rows()))]
pub fn stratified_split(dataset: &Dataset, test_size: f64, seed: u64) -> Result<TrainTestSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(Error::InvalidParameter(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }

    let n_rows = dataset.n_rows();
    let counts = dataset.class_counts();
    let n_classes = counts.iter().filter(|&&count| count > 0).count();

    if let Some(class) = counts.iter().position(|&count| count == 1) {
        return Err(Error::InvalidParameter(format!(
            "class '{}' has only 1 member; at least 2 are needed to stratify",
            dataset.classes()[class]
        )));
    }

    let n_test = test_rows_for(n_rows, test_size);
    let n_train = n_rows - n_test;
    if n_test < n_classes || n_train < n_classes {
        return Err(Error::InvalidParameter(format!(
            "split of {n_rows} rows into {n_train} train / {n_test} test rows \
             cannot hold all {n_classes} classes"
        )));
    }

    let allocation = allocate(&counts, n_test, n_rows);

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); counts.len()];
    for (row, &label) in dataset.labels().iter().enumerate() {
        members[label].push(row);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train_rows = Vec::with_capacity(n_train);
    let mut test_rows = Vec::with_capacity(n_test);
    for (rows, &take) in members.iter_mut().zip(&allocation) {
        rows.shuffle(&mut rng);
        let (test, train) = rows.split_at(take);
        test_rows.extend_from_slice(test);
        train_rows.extend_from_slice(train);
    }
    train_rows.sort_unstable();
    test_rows.sort_unstable();

    tracing::debug!(
        train = train_rows.len(),
        test = test_rows.len(),
        ?allocation,
        "stratified split"
    );

    Ok(TrainTestSplit {
        train: dataset.select_rows(&train_rows),
        test: dataset.select_rows(&test_rows),
        train_rows,
        test_rows,
    })
}

#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_precision_loss)]
fn test_rows_for(n_rows: usize, test_size: f64) -> usize {
    ((test_size * n_rows as f64).ceil() as usize).min(n_rows)
}

/// Largest-remainder apportionment of `n_test` rows over classes.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
#[allow(clippy::cast_precision_loss)]
fn allocate(counts: &[usize], n_test: usize, n_rows: usize) -> Vec<usize> {
    let exact: Vec<f64> = counts
        .iter()
        .map(|&count| count as f64 * n_test as f64 / n_rows as f64)
        .collect();
    let mut allocation: Vec<usize> = exact.iter().map(|share| share.floor() as usize).collect();

    let mut leftover = n_test - allocation.iter().sum::<usize>();
    let mut order: Vec<usize> = (0..counts.len()).collect();
    order.sort_by(|&a, &b| {
        let frac_a = exact[a] - exact[a].floor();
        let frac_b = exact[b] - exact[b].floor();
        frac_b.total_cmp(&frac_a).then(a.cmp(&b))
    });
    for class in order.into_iter().cycle().take(counts.len() * 2) {
        if leftover == 0 {
            break;
        }
        if allocation[class] < counts[class] {
            allocation[class] += 1;
            leftover -= 1;
        }
    }
    allocation
}
