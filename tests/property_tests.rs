//! Property-based tests for splitting and scoring
//!
//! - Split determinism, disjointness, and coverage
//! - Class ratios held within one row per class
//! - Metric ranges

use std::collections::BTreeSet;

use ndarray::Array2;
use proptest::prelude::*;
use trueno_train::dataset::Dataset;
use trueno_train::metrics::ClassificationReport;
use trueno_train::split::stratified_split;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Labels with 2..=4 classes, each having at least 4 members
fn arb_labels() -> impl Strategy<Value = (Vec<usize>, usize)> {
    (2usize..=4)
        .prop_flat_map(|n_classes| {
            (
                proptest::collection::vec(4usize..30, n_classes),
                Just(n_classes),
            )
        })
        .prop_map(|(sizes, n_classes)| {
            let labels = sizes
                .iter()
                .enumerate()
                .flat_map(|(class, &size)| std::iter::repeat(class).take(size))
                .collect();
            (labels, n_classes)
        })
}

#[allow(clippy::cast_precision_loss)]
fn dataset(labels: Vec<usize>, n_classes: usize) -> Dataset {
    let n = labels.len();
    let features = Array2::from_shape_fn((n, 2), |(row, col)| (row * 2 + col) as f64);
    let classes = (0..n_classes).map(|c| format!("class_{c}")).collect();
    Dataset::new(features, labels, classes, vec!["a".into(), "b".into()]).unwrap()
}

/// Paired truth/prediction vectors over up to 5 classes
fn arb_predictions() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    (1usize..200).prop_flat_map(|n| {
        (
            proptest::collection::vec(0usize..5, n),
            proptest::collection::vec(0usize..5, n),
        )
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: same seed and fraction give the same partition
    #[test]
    fn prop_split_is_deterministic(
        (labels, n_classes) in arb_labels(),
        test_size in 0.2f64..0.5,
        seed in any::<u64>()
    ) {
        let data = dataset(labels, n_classes);
        let a = stratified_split(&data, test_size, seed).unwrap();
        let b = stratified_split(&data, test_size, seed).unwrap();
        prop_assert_eq!(a.train_rows, b.train_rows);
        prop_assert_eq!(a.test_rows, b.test_rows);
    }

    /// Property: partitions are disjoint and cover every row
    #[test]
    fn prop_split_is_a_partition(
        (labels, n_classes) in arb_labels(),
        test_size in 0.2f64..0.5,
        seed in any::<u64>()
    ) {
        let data = dataset(labels, n_classes);
        let n = data.n_rows();
        let split = stratified_split(&data, test_size, seed).unwrap();

        let train: BTreeSet<usize> = split.train_rows.iter().copied().collect();
        let test: BTreeSet<usize> = split.test_rows.iter().copied().collect();
        prop_assert_eq!(train.len(), split.train_rows.len());
        prop_assert_eq!(test.len(), split.test_rows.len());
        prop_assert!(train.is_disjoint(&test));

        let union: BTreeSet<usize> = train.union(&test).copied().collect();
        prop_assert_eq!(union, (0..n).collect::<BTreeSet<_>>());
        prop_assert_eq!(split.train.n_rows() + split.test.n_rows(), n);
    }

    /// Property: each class's held-out count is within one row of its exact share
    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn prop_split_preserves_class_ratios(
        (labels, n_classes) in arb_labels(),
        test_size in 0.2f64..0.5,
        seed in any::<u64>()
    ) {
        let data = dataset(labels, n_classes);
        let n = data.n_rows();
        let split = stratified_split(&data, test_size, seed).unwrap();
        let n_test = split.test.n_rows();

        for (class, (&total, &held_out)) in data
            .class_counts()
            .iter()
            .zip(&split.test.class_counts())
            .enumerate()
        {
            let exact = total as f64 * n_test as f64 / n as f64;
            prop_assert!(
                (held_out as f64 - exact).abs() < 1.0 + 1e-9,
                "class {} held out {} vs exact {}", class, held_out, exact
            );
        }
    }

    /// Property: accuracy and macro F1 lie in [0, 1]
    #[test]
    fn prop_metrics_in_unit_interval((truth, predicted) in arb_predictions()) {
        let report = ClassificationReport::from_predictions(&truth, &predicted).unwrap();
        prop_assert!((0.0..=1.0).contains(&report.accuracy()));
        prop_assert!((0.0..=1.0).contains(&report.f1_macro()));
        for score in report.per_class() {
            prop_assert!((0.0..=1.0).contains(&score.f1));
        }
    }

    /// Property: predicting the truth scores perfectly
    #[test]
    fn prop_perfect_predictions((truth, _) in arb_predictions()) {
        let report = ClassificationReport::from_predictions(&truth, &truth).unwrap();
        prop_assert!((report.accuracy() - 1.0).abs() < 1e-12);
        prop_assert!((report.f1_macro() - 1.0).abs() < 1e-12);
    }
}
