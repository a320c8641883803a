//! Experiment Tracking
//!
//! Records parameters, metrics, and artifacts of training runs in a local
//! directory tree.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!                              │
//!                              ├──< ParamRecord (N)  [write-once per key]
//!                              ├──< MetricRecord (N) [time-series]
//!                              └──< ArtifactRecord (N) [CAS]
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use trueno_train::experiment::{RunStatus, Tracker};
//!
//! let tracker = Tracker::open("mlruns")?;
//! let experiment = tracker.experiment("iris-mlops")?;
//!
//! let mut run = experiment.start_run()?;
//! run.log_param("n_estimators", "100")?;
//! run.log_metric("accuracy", 0.97)?;
//! run.log_artifact("model/model.json", b"{}")?;
//! run.finish(RunStatus::Success)?;
//! # Ok::<(), trueno_train::Error>(())
//! ```

mod artifact_record;
mod experiment_record;
mod metric_record;
mod param_record;
mod run_record;
mod store;
mod tracker;

pub use artifact_record::{sha256_hash, ArtifactRecord};
pub use experiment_record::ExperimentRecord;
pub use metric_record::MetricRecord;
pub use param_record::ParamRecord;
pub use run_record::{RunRecord, RunState, RunStatus};
pub use store::ExperimentStore;
pub use tracker::{ActiveRun, Experiment, RunDetails, Tracker};
