//! Feature matrix and label vector extracted from a table
//!
//! Every column except the label is a feature and must cast cleanly to
//! `f64`. Labels are read as strings and encoded to class indices; the
//! class list is sorted, numerically when every label parses as a number.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use ndarray::{Array2, Axis};

use crate::storage::StorageEngine;
use crate::{Error, Result};

/// Row-aligned features and encoded labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Array2<f64>,
    labels: Vec<usize>,
    classes: Vec<String>,
    feature_names: Vec<String>,
}

impl Dataset {
    /// Assemble a dataset from parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] if row counts differ, the feature name count
    /// does not match the column count, or a label is not a valid class index.
    pub fn new(
        features: Array2<f64>,
        labels: Vec<usize>,
        classes: Vec<String>,
        feature_names: Vec<String>,
    ) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(Error::Data(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        if features.ncols() != feature_names.len() {
            return Err(Error::Data(format!(
                "{} feature columns but {} feature names",
                features.ncols(),
                feature_names.len()
            )));
        }
        if let Some(&bad) = labels.iter().find(|&&label| label >= classes.len()) {
            return Err(Error::Data(format!(
                "label index {bad} out of range for {} classes",
                classes.len()
            )));
        }
        Ok(Self {
            features,
            labels,
            classes,
            feature_names,
        })
    }

    /// Load a CSV or Parquet file and split off the label column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] if the file is missing or malformed, the label
    /// column is absent, or any value cannot be interpreted.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display(), label = label_column))]
    pub fn load<P: AsRef<Path>>(path: P, label_column: &str) -> Result<Self> {
        let storage = StorageEngine::load(path.as_ref())?;
        let dataset = Self::from_storage(&storage, label_column)?;
        tracing::info!(
            rows = dataset.n_rows(),
            features = dataset.n_features(),
            classes = dataset.n_classes(),
            "loaded dataset"
        );
        Ok(dataset)
    }

    /// Build a dataset from an in-memory table.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Dataset::load`], minus file access.
    pub fn from_storage(storage: &StorageEngine, label_column: &str) -> Result<Self> {
        let schema = storage
            .schema()
            .ok_or_else(|| Error::Data("dataset is empty".to_string()))?;
        let label_idx = schema.index_of(label_column).map_err(|_| {
            Error::Data(format!("label column '{label_column}' not found in dataset"))
        })?;

        let batch = storage.to_single_batch()?;
        let n_rows = batch.num_rows();
        if n_rows == 0 {
            return Err(Error::Data("dataset has no rows".to_string()));
        }
        if batch.num_columns() < 2 {
            return Err(Error::Data("dataset has no feature columns".to_string()));
        }

        let mut feature_names = Vec::with_capacity(batch.num_columns() - 1);
        let mut columns = Vec::with_capacity(batch.num_columns() - 1);
        for (idx, field) in schema.fields().iter().enumerate() {
            if idx == label_idx {
                continue;
            }
            let column = cast(batch.column(idx), &DataType::Float64)?;
            if column.null_count() > 0 {
                return Err(Error::Data(format!(
                    "feature column '{}' has missing or non-numeric values",
                    field.name()
                )));
            }
            let values = column.as_primitive::<Float64Type>();
            if values.values().iter().any(|v| !v.is_finite()) {
                return Err(Error::Data(format!(
                    "feature column '{}' has NaN or infinite values",
                    field.name()
                )));
            }
            columns.push(values.clone());
            feature_names.push(field.name().clone());
        }
        let features = Array2::from_shape_fn((n_rows, columns.len()), |(row, col)| {
            columns[col].value(row)
        });

        let raw_labels = cast(batch.column(label_idx), &DataType::Utf8)?;
        if raw_labels.null_count() > 0 {
            return Err(Error::Data(format!(
                "label column '{label_column}' has missing values"
            )));
        }
        let raw_labels = raw_labels.as_string::<i32>();
        let names: Vec<&str> = (0..n_rows).map(|row| raw_labels.value(row)).collect();
        let (labels, classes) = encode_labels(&names);

        Self::new(features, labels, classes, feature_names)
    }

    /// Feature matrix, one row per sample.
    #[must_use]
    pub const fn features(&self) -> &Array2<f64> {
        &self.features
    }

    /// Encoded labels, row-aligned with [`Dataset::features`].
    #[must_use]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Class names indexed by encoded label.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Feature column names in matrix order.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }

    /// Number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Number of distinct classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Rows per class, indexed by encoded label.
    #[must_use]
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.classes.len()];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }

    /// Subset of rows, in the given order, keeping the full class list.
    #[must_use]
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), rows),
            labels: rows.iter().map(|&row| self.labels[row]).collect(),
            classes: self.classes.clone(),
            feature_names: self.feature_names.clone(),
        }
    }
}

/// Encode string labels to indices into a sorted class list.
fn encode_labels(names: &[&str]) -> (Vec<usize>, Vec<String>) {
    let distinct: BTreeSet<&str> = names.iter().copied().collect();
    let mut classes: Vec<&str> = distinct.into_iter().collect();
    let numeric: Option<Vec<f64>> = classes.iter().map(|c| c.parse::<f64>().ok()).collect();
    if let Some(values) = numeric {
        let mut paired: Vec<(f64, &str)> = values.into_iter().zip(classes).collect();
        paired.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        classes = paired.into_iter().map(|(_, name)| name).collect();
    }

    let index: HashMap<&str, usize> = classes
        .iter()
        .enumerate()
        .map(|(idx, &name)| (name, idx))
        .collect();
    let labels = names.iter().map(|name| index[name]).collect();
    (labels, classes.into_iter().map(str::to_string).collect())
}
