//! Random forest of `linfa-trees` decision trees
//!
//! Each tree is fit on a bootstrap sample of the training rows and on a
//! random subset of the feature columns. One seeded [`StdRng`] drives both
//! draws, so a given training set and [`ForestParams`] always produce the
//! same forest.

use std::fmt;
use std::fs;
use std::path::Path;

use linfa::traits::{Fit, Predict};
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{MaxFeatures, TrainParams};
use crate::dataset::Dataset;
use crate::{Error, Result};

/// Hyperparameters of a [`RandomForest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Depth limit per tree
    pub max_depth: Option<usize>,
    /// Feature columns drawn per tree
    pub max_features: MaxFeatures,
    /// Sample rows with replacement for each tree
    pub bootstrap: bool,
    /// RNG seed
    pub seed: u64,
}

impl ForestParams {
    /// Parameters with the given tree count and seed, unbounded depth,
    /// `sqrt` feature sampling and bootstrapping.
    #[must_use]
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            max_depth: None,
            max_features: MaxFeatures::default(),
            bootstrap: true,
            seed,
        }
    }

    /// Set the depth limit.
    #[must_use]
    pub const fn max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the per-tree feature count.
    #[must_use]
    pub const fn max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Enable or disable bootstrap sampling.
    #[must_use]
    pub const fn bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }
}

impl From<&TrainParams> for ForestParams {
    fn from(params: &TrainParams) -> Self {
        Self::new(params.n_estimators, params.random_state)
            .max_depth(params.max_depth)
            .max_features(params.max_features)
            .bootstrap(params.bootstrap)
    }
}

#[derive(Serialize, Deserialize)]
struct ForestMember {
    features: Vec<usize>,
    tree: DecisionTree<f64, usize>,
}

/// Fitted ensemble classifier. Immutable once fit.
#[derive(Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    classes: Vec<String>,
    feature_names: Vec<String>,
    members: Vec<ForestMember>,
}

impl fmt::Debug for RandomForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomForest")
            .field("params", &self.params)
            .field("classes", &self.classes)
            .field("feature_names", &self.feature_names)
            .field("n_trees", &self.members.len())
            .finish()
    }
}

impl RandomForest {
    /// Fit a forest on `train`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for a zero tree count or depth,
    /// and [`Error::Model`] if the training set is empty or a tree fails to fit.
    #[tracing::instrument(skip_all, fields(trees = params.n_estimators, rows = train.n_rows()))]
    pub fn fit(params: ForestParams, train: &Dataset) -> Result<Self> {
        if params.n_estimators == 0 {
            return Err(Error::InvalidParameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if params.max_depth == Some(0) {
            return Err(Error::InvalidParameter(
                "max_depth must be positive or null".to_string(),
            ));
        }
        let n_rows = train.n_rows();
        if n_rows == 0 {
            return Err(Error::Model("cannot fit on an empty training set".to_string()));
        }

        let n_features = train.n_features();
        let per_tree = params.max_features.resolve(n_features);
        let all_features: Vec<usize> = (0..n_features).collect();
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut members = Vec::with_capacity(params.n_estimators);
        for index in 0..params.n_estimators {
            let rows: Vec<usize> = if params.bootstrap {
                (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
            } else {
                (0..n_rows).collect()
            };
            let mut features: Vec<usize> = all_features
                .choose_multiple(&mut rng, per_tree)
                .copied()
                .collect();
            features.sort_unstable();

            let records = train
                .features()
                .select(Axis(0), &rows)
                .select(Axis(1), &features);
            let targets: Array1<usize> = rows.iter().map(|&row| train.labels()[row]).collect();
            let sample = linfa::Dataset::new(records, targets);

            let tree = DecisionTree::<f64, usize>::params()
                .split_quality(SplitQuality::Gini)
                .max_depth(params.max_depth)
                .fit(&sample)
                .map_err(|e| Error::Model(format!("tree {index} failed to fit: {e}")))?;
            members.push(ForestMember { features, tree });
        }

        tracing::info!(trees = members.len(), features_per_tree = per_tree, "fitted random forest");
        Ok(Self {
            params,
            classes: train.classes().to_vec(),
            feature_names: train.feature_names().to_vec(),
            members,
        })
    }

    /// Predict class indices by majority vote; ties go to the lower index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Model`] if the column count differs from training.
    pub fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        if features.ncols() != self.feature_names.len() {
            return Err(Error::Model(format!(
                "expected {} feature columns, got {}",
                self.feature_names.len(),
                features.ncols()
            )));
        }
        if features.nrows() == 0 {
            return Ok(Vec::new());
        }

        let mut votes = Array2::<usize>::zeros((features.nrows(), self.classes.len()));
        for member in &self.members {
            let view = features.select(Axis(1), &member.features);
            let predicted: Array1<usize> = member.tree.predict(&view);
            for (row, &class) in predicted.iter().enumerate() {
                votes[[row, class]] += 1;
            }
        }

        Ok(votes.rows().into_iter().map(majority).collect())
    }

    /// Parameters the forest was fit with.
    #[must_use]
    pub const fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Class names indexed by predicted class.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Feature names in the order `predict` expects.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Number of fitted trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.members.len()
    }

    /// Serialize to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Write the JSON form to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory or file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let bytes = self.to_json()?;
        fs::write(path, &bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "saved model");
        Ok(())
    }

    /// Read a forest written by [`RandomForest::save`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] or [`Error::Json`] if the file is unreadable or malformed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn majority(counts: ArrayView1<'_, usize>) -> usize {
    let mut best = 0;
    for (class, &count) in counts.iter().enumerate() {
        if count > counts[best] {
            best = class;
        }
    }
    best
}
