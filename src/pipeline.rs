//! Training runner
//!
//! One invocation is one run: load parameters, load the dataset, split,
//! fit, score, record. Stages run strictly in that order. Parameters are
//! validated before the dataset is opened, and the tracking run is only
//! opened once a model has been fitted and scored, so a failed config or
//! data stage leaves nothing in the tracking store.

use std::path::{Path, PathBuf};

use crate::config::TrainParams;
use crate::dataset::Dataset;
use crate::experiment::{Experiment, RunRecord, RunStatus, Tracker};
use crate::metrics::{evaluate, ClassificationReport};
use crate::model::{ForestParams, RandomForest};
use crate::split::stratified_split;
use crate::Result;

/// Artifact key the fitted model is stored under in each run.
pub const MODEL_ARTIFACT_KEY: &str = "model/model.json";

/// Default experiment name.
pub const DEFAULT_EXPERIMENT: &str = "iris-mlops";

/// Where a run reads its inputs and writes its outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Parameter file with a `train` group
    pub params_path: PathBuf,
    /// CSV or Parquet dataset
    pub data_path: PathBuf,
    /// Name of the label column
    pub label_column: String,
    /// Where the fitted model is written
    pub model_path: PathBuf,
    /// Root of the tracking store
    pub tracking_dir: PathBuf,
    /// Experiment the run is recorded under
    pub experiment: String,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            params_path: PathBuf::from("params.yaml"),
            data_path: PathBuf::from("data/iris.csv"),
            label_column: "target".to_string(),
            model_path: PathBuf::from("models/model.json"),
            tracking_dir: PathBuf::from("mlruns"),
            experiment: DEFAULT_EXPERIMENT.to_string(),
        }
    }
}

impl RunnerOptions {
    /// Default relative paths resolved against `base`.
    #[must_use]
    pub fn in_dir(base: &Path) -> Self {
        let defaults = Self::default();
        Self {
            params_path: base.join(defaults.params_path),
            data_path: base.join(defaults.data_path),
            model_path: base.join(defaults.model_path),
            tracking_dir: base.join(defaults.tracking_dir),
            ..defaults
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Closed run record
    pub run: RunRecord,
    /// Experiment the run belongs to
    pub experiment_id: String,
    /// Held-out scores
    pub report: ClassificationReport,
    /// Rows used for fitting
    pub train_rows: usize,
    /// Rows used for scoring
    pub test_rows: usize,
    /// Model file written
    pub model_path: PathBuf,
    /// Size of the model file
    pub model_bytes: u64,
}

impl RunSummary {
    /// Held-out accuracy.
    #[must_use]
    pub const fn accuracy(&self) -> f64 {
        self.report.accuracy()
    }

    /// Held-out macro F1.
    #[must_use]
    pub const fn f1_macro(&self) -> f64 {
        self.report.f1_macro()
    }
}

/// Executes one training run.
#[derive(Debug, Clone)]
pub struct TrainingRunner {
    options: RunnerOptions,
}

impl TrainingRunner {
    /// Runner for the given paths.
    #[must_use]
    pub const fn new(options: RunnerOptions) -> Self {
        Self { options }
    }

    /// Paths this runner uses.
    #[must_use]
    pub const fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Run every stage and record the result.
    ///
    /// # Errors
    ///
    /// Returns the first stage's error: configuration errors before the
    /// dataset is read, data errors before fitting, and IO errors from
    /// writing the model or the tracking store.
    #[tracing::instrument(skip_all, fields(experiment = %self.options.experiment))]
    pub fn run(&self) -> Result<RunSummary> {
        let options = &self.options;

        let params = TrainParams::from_path(&options.params_path)?;
        tracing::info!(
            test_size = params.test_size,
            random_state = params.random_state,
            n_estimators = params.n_estimators,
            max_depth = ?params.max_depth,
            "loaded parameters"
        );

        let dataset = Dataset::load(&options.data_path, &options.label_column)?;
        let split = stratified_split(&dataset, params.test_size, params.random_state)?;
        let model = RandomForest::fit(ForestParams::from(&params), &split.train)?;
        let report = evaluate(&model, &split.test)?;

        let tracker = Tracker::open(&options.tracking_dir)?;
        let experiment = tracker.experiment(&options.experiment)?;
        let (run, model_bytes) = self.record(&experiment, &params, &model, &report)?;

        Ok(RunSummary {
            run,
            experiment_id: experiment.id().to_string(),
            report,
            train_rows: split.train.n_rows(),
            test_rows: split.test.n_rows(),
            model_path: options.model_path.clone(),
            model_bytes,
        })
    }

    /// Open a run under `experiment` and log params, metrics, and the model.
    fn record(
        &self,
        experiment: &Experiment,
        params: &TrainParams,
        model: &RandomForest,
        report: &ClassificationReport,
    ) -> Result<(RunRecord, u64)> {
        let mut run = experiment.start_run()?;

        run.log_params(params.to_logged_params()?)?;
        for (key, value) in report.summary() {
            run.log_metric(key, value)?;
        }

        model.save(&self.options.model_path)?;
        let artifact = run.log_artifact_file(MODEL_ARTIFACT_KEY, &self.options.model_path)?;

        let record = run.finish(RunStatus::Success)?;
        Ok((record, artifact.size_bytes()))
    }
}

/// Run the pipeline with the given options.
///
/// # Errors
///
/// See [`TrainingRunner::run`].
pub fn run(options: RunnerOptions) -> Result<RunSummary> {
    TrainingRunner::new(options).run()
}
