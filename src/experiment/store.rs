//! Experiment Store - file-backed storage for experiment tracking data
//!
//! ## Layout
//!
//! ```text
//! <root>/<experiment_id>/experiment.json
//! <root>/<experiment_id>/<run_id>/run.json
//! <root>/<experiment_id>/<run_id>/params.jsonl
//! <root>/<experiment_id>/<run_id>/metrics.jsonl
//! <root>/<experiment_id>/<run_id>/artifacts.jsonl
//! <root>/<experiment_id>/<run_id>/artifacts/<key>
//! ```
//!
//! Params, metrics, and artifact records are append-only JSON lines.
//! `run.json` is replaced atomically on every status change.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Component, Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunRecord};
use crate::{Error, Result};

const EXPERIMENT_FILE: &str = "experiment.json";
const RUN_FILE: &str = "run.json";
const PARAMS_FILE: &str = "params.jsonl";
const METRICS_FILE: &str = "metrics.jsonl";
const ARTIFACTS_FILE: &str = "artifacts.jsonl";
const ARTIFACTS_DIR: &str = "artifacts";

/// File-backed store for experiment tracking data.
///
/// The store holds no state beyond its root directory; every query reads
/// from disk.
#[derive(Debug, Clone)]
pub struct ExperimentStore {
    root: PathBuf,
}

impl ExperimentStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn experiment_dir(&self, experiment_id: &str) -> PathBuf {
        self.root.join(experiment_id)
    }

    /// Directory holding one run's files.
    #[must_use]
    pub fn run_dir(&self, experiment_id: &str, run_id: &str) -> PathBuf {
        self.experiment_dir(experiment_id).join(run_id)
    }

    /// Check if the store holds no experiments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the root cannot be listed.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.list_experiments()?.is_empty())
    }

    /// Persist a new experiment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tracking`] if the ID is taken, or an IO error.
    pub fn add_experiment(&self, experiment: &ExperimentRecord) -> Result<()> {
        let dir = self.experiment_dir(experiment.experiment_id());
        if self.get_experiment(experiment.experiment_id())?.is_some() {
            return Err(Error::Tracking(format!(
                "experiment {} already exists",
                experiment.experiment_id()
            )));
        }
        fs::create_dir_all(&dir)?;
        write_json_atomic(&dir.join(EXPERIMENT_FILE), experiment)
    }

    /// Get an experiment by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the experiment file exists but cannot be read.
    pub fn get_experiment(&self, experiment_id: &str) -> Result<Option<ExperimentRecord>> {
        read_json_if_exists(&self.experiment_dir(experiment_id).join(EXPERIMENT_FILE))
    }

    /// Find an experiment by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn find_experiment_by_name(&self, name: &str) -> Result<Option<ExperimentRecord>> {
        Ok(self
            .list_experiments()?
            .into_iter()
            .find(|experiment| experiment.name() == name))
    }

    /// All experiments, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed or a record is malformed.
    pub fn list_experiments(&self) -> Result<Vec<ExperimentRecord>> {
        let mut experiments = Vec::new();
        for dir in subdirectories(&self.root)? {
            if let Some(experiment) = read_json_if_exists(&dir.join(EXPERIMENT_FILE))? {
                experiments.push(experiment);
            }
        }
        experiments.sort_by_key(ExperimentRecord::created_at);
        Ok(experiments)
    }

    /// Next unused numeric experiment ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub fn next_experiment_id(&self) -> Result<String> {
        let next = self
            .list_experiments()?
            .iter()
            .filter_map(|experiment| experiment.experiment_id().parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1);
        Ok(next.to_string())
    }

    /// Create or replace a run's `run.json`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tracking`] if the parent experiment does not exist,
    /// or an IO error.
    pub fn put_run(&self, run: &RunRecord) -> Result<()> {
        if self.get_experiment(run.experiment_id())?.is_none() {
            return Err(Error::Tracking(format!(
                "experiment {} does not exist",
                run.experiment_id()
            )));
        }
        let dir = self.run_dir(run.experiment_id(), run.run_id());
        fs::create_dir_all(&dir)?;
        write_json_atomic(&dir.join(RUN_FILE), run)
    }

    /// Get a run by ID, searching every experiment.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed or a record is malformed.
    pub fn get_run(&self, run_id: &str) -> Result<Option<RunRecord>> {
        for experiment in self.list_experiments()? {
            let path = self
                .run_dir(experiment.experiment_id(), run_id)
                .join(RUN_FILE);
            if let Some(run) = read_json_if_exists(&path)? {
                return Ok(Some(run));
            }
        }
        Ok(None)
    }

    /// Get all runs for an experiment, by start time.
    ///
    /// # Errors
    ///
    /// Returns an error if the experiment directory cannot be listed.
    pub fn get_runs_for_experiment(&self, experiment_id: &str) -> Result<Vec<RunRecord>> {
        let dir = self.experiment_dir(experiment_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut runs = Vec::new();
        for run_dir in subdirectories(&dir)? {
            if let Some(run) = read_json_if_exists::<RunRecord>(&run_dir.join(RUN_FILE))? {
                runs.push(run);
            }
        }
        runs.sort_by_key(RunRecord::started_at);
        Ok(runs)
    }

    /// Append a param record.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the record cannot be appended.
    pub fn add_param(&self, experiment_id: &str, param: &ParamRecord) -> Result<()> {
        append_json_line(
            &self.run_dir(experiment_id, param.run_id()).join(PARAMS_FILE),
            param,
        )
    }

    /// All params of a run, in logging order.
    ///
    /// # Errors
    ///
    /// Returns an error if the params file is unreadable or malformed.
    pub fn get_params_for_run(&self, experiment_id: &str, run_id: &str) -> Result<Vec<ParamRecord>> {
        read_json_lines(&self.run_dir(experiment_id, run_id).join(PARAMS_FILE))
    }

    /// Append a metric record.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the record cannot be appended.
    pub fn add_metric(&self, experiment_id: &str, metric: &MetricRecord) -> Result<()> {
        append_json_line(
            &self.run_dir(experiment_id, metric.run_id()).join(METRICS_FILE),
            metric,
        )
    }

    /// All metrics of a run, in logging order.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics file is unreadable or malformed.
    pub fn get_all_metrics_for_run(&self, experiment_id: &str, run_id: &str) -> Result<Vec<MetricRecord>> {
        read_json_lines(&self.run_dir(experiment_id, run_id).join(METRICS_FILE))
    }

    /// Get metrics for a specific run and key, ordered by step.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics file is unreadable or malformed.
    pub fn get_metrics_for_run(
        &self,
        experiment_id: &str,
        run_id: &str,
        key: &str,
    ) -> Result<Vec<MetricRecord>> {
        let mut metrics: Vec<MetricRecord> = self
            .get_all_metrics_for_run(experiment_id, run_id)?
            .into_iter()
            .filter(|m| m.key() == key)
            .collect();

        // Sort by step for time-series ordering
        metrics.sort_by_key(MetricRecord::step);

        Ok(metrics)
    }

    /// Store artifact content under the run and append its record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tracking`] for a key that is empty, absolute, or
    /// escapes the artifact directory, or an IO error.
    pub fn put_artifact(
        &self,
        experiment_id: &str,
        run_id: &str,
        key: &str,
        bytes: &[u8],
    ) -> Result<ArtifactRecord> {
        validate_artifact_key(key)?;
        let run_dir = self.run_dir(experiment_id, run_id);
        let path = run_dir.join(ARTIFACTS_DIR).join(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;

        let record = ArtifactRecord::for_bytes(run_id, key, bytes);
        append_json_line(&run_dir.join(ARTIFACTS_FILE), &record)?;
        tracing::debug!(run_id, key, bytes = bytes.len(), hash = record.cas_hash(), "stored artifact");
        Ok(record)
    }

    /// All artifact records of a run, in logging order.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifacts file is unreadable or malformed.
    pub fn get_artifacts_for_run(&self, experiment_id: &str, run_id: &str) -> Result<Vec<ArtifactRecord>> {
        read_json_lines(&self.run_dir(experiment_id, run_id).join(ARTIFACTS_FILE))
    }

    /// On-disk path of a stored artifact.
    #[must_use]
    pub fn artifact_path(&self, experiment_id: &str, run_id: &str, key: &str) -> PathBuf {
        self.run_dir(experiment_id, run_id).join(ARTIFACTS_DIR).join(key)
    }
}

fn validate_artifact_key(key: &str) -> Result<()> {
    let path = Path::new(key);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if key.is_empty() || escapes {
        return Err(Error::Tracking(format!("invalid artifact key '{key}'")));
    }
    Ok(())
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json_if_exists<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(path)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&line)?;
    Ok(())
}

fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.is_file() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
