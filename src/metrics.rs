//! Classification metrics
//!
//! All scores are computed from a confusion matrix over the classes that
//! appear in either the truth or the predictions. Precision, recall, or F1
//! that would divide by zero count as zero.

use ndarray::Array2;

use crate::dataset::Dataset;
use crate::model::RandomForest;
use crate::{Error, Result};

/// Metric key for overall accuracy
pub const ACCURACY: &str = "accuracy";
/// Metric key for macro-averaged F1
pub const F1_MACRO: &str = "f1_macro";

/// Precision, recall, and F1 of one class
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScore {
    /// Encoded class index
    pub class: usize,
    /// Rows of this class in the truth
    pub support: usize,
    /// `tp / (tp + fp)`
    pub precision: f64,
    /// `tp / (tp + fn)`
    pub recall: f64,
    /// Harmonic mean of precision and recall
    pub f1: f64,
}

/// Scores of a set of predictions against the truth
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    confusion: Array2<usize>,
    classes: Vec<usize>,
    per_class: Vec<ClassScore>,
    accuracy: f64,
    f1_macro: f64,
}

impl ClassificationReport {
    /// Score `predicted` against `truth`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] if the slices are empty or differ in length.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_predictions(truth: &[usize], predicted: &[usize]) -> Result<Self> {
        if truth.len() != predicted.len() {
            return Err(Error::Data(format!(
                "{} true labels but {} predictions",
                truth.len(),
                predicted.len()
            )));
        }
        if truth.is_empty() {
            return Err(Error::Data("cannot score an empty prediction set".to_string()));
        }

        let mut classes: Vec<usize> = truth.iter().chain(predicted).copied().collect();
        classes.sort_unstable();
        classes.dedup();
        let position = |label: usize| classes.binary_search(&label).unwrap_or_default();

        // rows: truth, columns: prediction
        let mut confusion = Array2::<usize>::zeros((classes.len(), classes.len()));
        for (&t, &p) in truth.iter().zip(predicted) {
            confusion[[position(t), position(p)]] += 1;
        }

        let correct: usize = (0..classes.len()).map(|i| confusion[[i, i]]).sum();
        let accuracy = correct as f64 / truth.len() as f64;

        let per_class: Vec<ClassScore> = classes
            .iter()
            .enumerate()
            .map(|(i, &class)| {
                let tp = confusion[[i, i]];
                let support = confusion.row(i).sum();
                let predicted_as = confusion.column(i).sum();
                let precision = ratio(tp, predicted_as);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassScore {
                    class,
                    support,
                    precision,
                    recall,
                    f1,
                }
            })
            .collect();

        let f1_macro = per_class.iter().map(|score| score.f1).sum::<f64>() / per_class.len() as f64;

        Ok(Self {
            confusion,
            classes,
            per_class,
            accuracy,
            f1_macro,
        })
    }

    /// Fraction of exact label matches.
    #[must_use]
    pub const fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Unweighted mean of per-class F1.
    #[must_use]
    pub const fn f1_macro(&self) -> f64 {
        self.f1_macro
    }

    /// Per-class scores, ordered by class index.
    #[must_use]
    pub fn per_class(&self) -> &[ClassScore] {
        &self.per_class
    }

    /// Class indices labelling the confusion matrix axes.
    #[must_use]
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    /// Confusion counts, truth by row and prediction by column.
    #[must_use]
    pub const fn confusion(&self) -> &Array2<usize> {
        &self.confusion
    }

    /// The logged metrics as `(key, value)` pairs.
    #[must_use]
    pub fn summary(&self) -> [(&'static str, f64); 2] {
        [(ACCURACY, self.accuracy), (F1_MACRO, self.f1_macro)]
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Predict the held-out rows and score them.
///
/// # Errors
///
/// Propagates prediction errors and [`Error::Data`] for an empty test set.
#[tracing::instrument(skip_all, fields(rows = test.n_rows()))]
pub fn evaluate(model: &RandomForest, test: &Dataset) -> Result<ClassificationReport> {
    let predicted = model.predict(test.features())?;
    let report = ClassificationReport::from_predictions(test.labels(), &predicted)?;
    tracing::info!(
        accuracy = report.accuracy(),
        f1_macro = report.f1_macro(),
        "evaluated held-out set"
    );
    Ok(report)
}
