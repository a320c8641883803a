//! Explicit tracking handles
//!
//! There is no process-wide "current experiment". A [`Tracker`] hands out
//! [`Experiment`] handles, an experiment starts [`ActiveRun`]s, and every
//! write goes through the handle that owns it.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use uuid::Uuid;

use super::{
    ArtifactRecord, ExperimentRecord, ExperimentStore, MetricRecord, ParamRecord, RunRecord,
    RunState, RunStatus,
};
use crate::{Error, Result};

/// Entry point to a tracking store.
#[derive(Debug, Clone)]
pub struct Tracker {
    store: ExperimentStore,
}

impl Tracker {
    /// Open a tracking store rooted at `root`, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        Ok(Self {
            store: ExperimentStore::open(root)?,
        })
    }

    /// Underlying store.
    #[must_use]
    pub const fn store(&self) -> &ExperimentStore {
        &self.store
    }

    /// Handle to the experiment called `name`, created on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn experiment(&self, name: &str) -> Result<Experiment> {
        if let Some(record) = self.store.find_experiment_by_name(name)? {
            return Ok(Experiment {
                store: self.store.clone(),
                record,
            });
        }

        let record = ExperimentRecord::new(self.store.next_experiment_id()?, name);
        self.store.add_experiment(&record)?;
        tracing::info!(experiment_id = record.experiment_id(), name, "created experiment");
        Ok(Experiment {
            store: self.store.clone(),
            record,
        })
    }

    /// Handle to an existing experiment, without creating it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn find_experiment(&self, name: &str) -> Result<Option<Experiment>> {
        Ok(self
            .store
            .find_experiment_by_name(name)?
            .map(|record| Experiment {
                store: self.store.clone(),
                record,
            }))
    }

    /// All experiments, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn list_experiments(&self) -> Result<Vec<ExperimentRecord>> {
        self.store.list_experiments()
    }

    /// Everything recorded for one run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tracking`] if no run has this ID.
    pub fn load_run(&self, run_id: &str) -> Result<RunDetails> {
        let run = self
            .store
            .get_run(run_id)?
            .ok_or_else(|| Error::Tracking(format!("run {run_id} not found")))?;
        let experiment_id = run.experiment_id();
        Ok(RunDetails {
            params: self.store.get_params_for_run(experiment_id, run_id)?,
            metrics: self.store.get_all_metrics_for_run(experiment_id, run_id)?,
            artifacts: self.store.get_artifacts_for_run(experiment_id, run_id)?,
            run,
        })
    }
}

/// Handle to one experiment.
#[derive(Debug, Clone)]
pub struct Experiment {
    store: ExperimentStore,
    record: ExperimentRecord,
}

impl Experiment {
    /// The experiment's record.
    #[must_use]
    pub const fn record(&self) -> &ExperimentRecord {
        &self.record
    }

    /// Experiment ID.
    #[must_use]
    pub fn id(&self) -> &str {
        self.record.experiment_id()
    }

    /// Experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.record.name()
    }

    /// Open a new run.
    ///
    /// # Errors
    ///
    /// Returns an error if the run record cannot be written.
    pub fn start_run(&self) -> Result<ActiveRun> {
        let mut record = RunRecord::new(Uuid::new_v4().simple().to_string(), self.id());
        record.start()?;
        self.store.put_run(&record)?;
        tracing::info!(run_id = record.run_id(), experiment = self.name(), "started run");
        Ok(ActiveRun {
            store: self.store.clone(),
            record,
            params: HashMap::new(),
        })
    }

    /// Runs of this experiment, by start time.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn runs(&self) -> Result<Vec<RunRecord>> {
        self.store.get_runs_for_experiment(self.id())
    }
}

/// An open run. Logging is only possible through this handle, and
/// [`ActiveRun::finish`] consumes it, so a closed run cannot be written to.
///
/// Dropping an unfinished run records it as [`RunStatus::Failed`].
#[derive(Debug)]
pub struct ActiveRun {
    store: ExperimentStore,
    record: RunRecord,
    params: HashMap<String, String>,
}

impl ActiveRun {
    /// Run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        self.record.run_id()
    }

    /// Current run record.
    #[must_use]
    pub const fn record(&self) -> &RunRecord {
        &self.record
    }

    fn ensure_open(&self) -> Result<()> {
        if self.record.state() == RunState::Open {
            Ok(())
        } else {
            Err(Error::Tracking(format!(
                "run {} is not open",
                self.record.run_id()
            )))
        }
    }

    /// Log a parameter. A key can be logged once; logging the same value
    /// again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tracking`] if the key was logged with a different value.
    pub fn log_param(&mut self, key: &str, value: &str) -> Result<()> {
        self.ensure_open()?;
        if let Some(existing) = self.params.get(key) {
            if existing == value {
                return Ok(());
            }
            return Err(Error::Tracking(format!(
                "param '{key}' already logged as '{existing}', refusing '{value}'"
            )));
        }
        self.store.add_param(
            self.record.experiment_id(),
            &ParamRecord::new(self.run_id(), key, value),
        )?;
        self.params.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Log every `(key, value)` pair.
    ///
    /// # Errors
    ///
    /// Stops at the first failing [`ActiveRun::log_param`].
    pub fn log_params<I, K, V>(&mut self, params: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in params {
            self.log_param(key.as_ref(), value.as_ref())?;
        }
        Ok(())
    }

    /// Log a metric at step 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the run is not open or the store write fails.
    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        self.log_metric_at(key, 0, value)
    }

    /// Log a metric at the given step.
    ///
    /// # Errors
    ///
    /// Returns an error if the run is not open or the store write fails.
    pub fn log_metric_at(&mut self, key: &str, step: u64, value: f64) -> Result<()> {
        self.ensure_open()?;
        self.store.add_metric(
            self.record.experiment_id(),
            &MetricRecord::new(self.run_id(), key, step, value),
        )
    }

    /// Store `bytes` as artifact `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the run is not open, the key is invalid, or the
    /// write fails.
    pub fn log_artifact(&mut self, key: &str, bytes: &[u8]) -> Result<ArtifactRecord> {
        self.ensure_open()?;
        self.store
            .put_artifact(self.record.experiment_id(), self.record.run_id(), key, bytes)
    }

    /// Copy a file into the run as artifact `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or any
    /// [`ActiveRun::log_artifact`] error.
    pub fn log_artifact_file<P: AsRef<Path>>(&mut self, key: &str, path: P) -> Result<ArtifactRecord> {
        let bytes = fs::read(path)?;
        self.log_artifact(key, &bytes)
    }

    /// Close the run with a final status. Consumes the handle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tracking`] for a non-final status, or an IO error if
    /// the closed record cannot be written.
    pub fn finish(mut self, status: RunStatus) -> Result<RunRecord> {
        self.close(status)
    }

    /// The run stays open in memory until the closed record is on disk, so
    /// a failed write still leaves `Drop` to record the failure.
    fn close(&mut self, status: RunStatus) -> Result<RunRecord> {
        let mut closed = self.record.clone();
        closed.complete(status)?;
        self.store.put_run(&closed)?;
        self.record = closed;
        tracing::info!(run_id = self.run_id(), ?status, "finished run");
        Ok(self.record.clone())
    }
}

impl Drop for ActiveRun {
    fn drop(&mut self) {
        if self.record.state() != RunState::Open {
            return;
        }
        tracing::warn!(run_id = self.run_id(), "run dropped while open, marking as failed");
        if self.record.complete(RunStatus::Failed).is_ok() {
            if let Err(e) = self.store.put_run(&self.record) {
                tracing::warn!(run_id = self.run_id(), error = %e, "could not record failed run");
            }
        }
    }
}

/// Everything recorded for one run.
#[derive(Debug, Clone)]
pub struct RunDetails {
    /// Run record with final status
    pub run: RunRecord,
    /// Params in logging order
    pub params: Vec<ParamRecord>,
    /// Metrics in logging order
    pub metrics: Vec<MetricRecord>,
    /// Artifacts in logging order
    pub artifacts: Vec<ArtifactRecord>,
}

impl RunDetails {
    /// Value of a logged param.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|param| param.key() == key)
            .map(ParamRecord::value)
    }

    /// Value of a metric at its highest step.
    #[must_use]
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics
            .iter()
            .filter(|metric| metric.key() == key)
            .max_by_key(|metric| metric.step())
            .map(MetricRecord::value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (tempfile::TempDir, Tracker) {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Tracker::open(dir.path().join("mlruns")).unwrap();
        (dir, tracker)
    }

    #[test]
    fn test_experiment_is_reused_by_name() {
        let (_dir, tracker) = tracker();
        let a = tracker.experiment("iris").unwrap();
        let b = tracker.experiment("iris").unwrap();
        let c = tracker.experiment("other").unwrap();

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(tracker.list_experiments().unwrap().len(), 2);
        assert!(tracker.find_experiment("missing").unwrap().is_none());
    }

    #[test]
    fn test_run_lifecycle_is_persisted() {
        let (_dir, tracker) = tracker();
        let experiment = tracker.experiment("iris").unwrap();

        let mut run = experiment.start_run().unwrap();
        let run_id = run.run_id().to_string();
        assert_eq!(
            tracker.store().get_run(&run_id).unwrap().unwrap().status(),
            RunStatus::Running
        );

        run.log_param("n_estimators", "10").unwrap();
        run.log_metric("accuracy", 0.9).unwrap();
        run.log_artifact("model/model.json", b"{}").unwrap();
        let closed = run.finish(RunStatus::Success).unwrap();
        assert_eq!(closed.state(), RunState::Closed);

        let details = tracker.load_run(&run_id).unwrap();
        assert_eq!(details.run.status(), RunStatus::Success);
        assert!(details.run.ended_at().is_some());
        assert_eq!(details.param("n_estimators"), Some("10"));
        assert_eq!(details.metric("accuracy"), Some(0.9));
        assert_eq!(details.artifacts.len(), 1);
        assert_eq!(experiment.runs().unwrap().len(), 1);
    }

    #[test]
    fn test_param_is_immutable() {
        let (_dir, tracker) = tracker();
        let mut run = tracker.experiment("iris").unwrap().start_run().unwrap();

        run.log_param("seed", "42").unwrap();
        run.log_param("seed", "42").unwrap();
        let err = run.log_param("seed", "7").unwrap_err();
        assert!(err.to_string().contains("seed"));

        let details = tracker.load_run(run.run_id()).unwrap();
        assert_eq!(details.params.len(), 1);
    }

    #[test]
    fn test_dropped_run_is_marked_failed() {
        let (_dir, tracker) = tracker();
        let run_id = {
            let run = tracker.experiment("iris").unwrap().start_run().unwrap();
            run.run_id().to_string()
        };
        let details = tracker.load_run(&run_id).unwrap();
        assert_eq!(details.run.status(), RunStatus::Failed);
    }

    #[test]
    fn test_finish_rejects_non_final_status() {
        let (_dir, tracker) = tracker();
        let run = tracker.experiment("iris").unwrap().start_run().unwrap();
        let run_id = run.run_id().to_string();
        assert!(run.finish(RunStatus::Running).is_err());
        // the handle was dropped while still open
        assert_eq!(
            tracker.load_run(&run_id).unwrap().run.status(),
            RunStatus::Failed
        );
    }

    #[test]
    fn test_failed_close_keeps_run_open() {
        let (_dir, tracker) = tracker();
        let experiment = tracker.experiment("iris").unwrap();
        let mut run = experiment.start_run().unwrap();
        let run_id = run.run_id().to_string();

        // A directory at the temp path makes the atomic write fail
        let blocker = tracker
            .store()
            .run_dir(experiment.id(), &run_id)
            .join("run.json.tmp");
        fs::create_dir(&blocker).unwrap();

        assert!(run.close(RunStatus::Success).is_err());
        assert_eq!(run.record().state(), RunState::Open);
        assert!(run.log_metric("accuracy", 0.5).is_ok());

        fs::remove_dir(&blocker).unwrap();
        drop(run);
        assert_eq!(
            tracker.load_run(&run_id).unwrap().run.status(),
            RunStatus::Failed
        );
    }

    #[test]
    fn test_log_artifact_file_copies_content() {
        let (dir, tracker) = tracker();
        let experiment = tracker.experiment("iris").unwrap();
        let mut run = experiment.start_run().unwrap();
        let source = dir.path().join("model.json");
        fs::write(&source, b"{\"members\":[]}").unwrap();

        let record = run.log_artifact_file("model/model.json", &source).unwrap();
        assert_eq!(record.size_bytes(), 14);
        let stored = tracker
            .store()
            .artifact_path(experiment.id(), run.run_id(), "model/model.json");
        assert_eq!(fs::read(stored).unwrap(), fs::read(&source).unwrap());

        assert!(run
            .log_artifact_file("missing", dir.path().join("nope.json"))
            .is_err());
    }

    #[test]
    fn test_unknown_run() {
        let (_dir, tracker) = tracker();
        assert!(tracker.load_run("nope").is_err());
    }
}
