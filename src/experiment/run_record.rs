//! Run Record - execution instance of an experiment

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is created but not yet started.
    Pending,
    /// Run is open and accepting params, metrics, and artifacts.
    Running,
    /// Run completed successfully.
    Success,
    /// Run failed with an error.
    Failed,
    /// Run was cancelled by user or system.
    Cancelled,
}

impl RunStatus {
    /// Whether the status ends the run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }

    /// Lifecycle state this status belongs to.
    #[must_use]
    pub const fn state(self) -> RunState {
        match self {
            Self::Pending => RunState::NotStarted,
            Self::Running => RunState::Open,
            Self::Success | Self::Failed | Self::Cancelled => RunState::Closed,
        }
    }
}

/// Lifecycle of a run: `NotStarted -> Open -> Closed`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Created, nothing logged yet
    NotStarted,
    /// Logging allowed
    Open,
    /// Finalized; no further writes
    Closed,
}

/// Run Record represents a single execution of an experiment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    run_id: String,
    experiment_id: String,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Create a new run record in Pending status.
    ///
    /// # Arguments
    ///
    /// * `run_id` - Unique identifier for the run
    /// * `experiment_id` - ID of the parent experiment
    #[must_use]
    pub fn new(run_id: impl Into<String>, experiment_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            status: RunStatus::Pending,
            started_at: None,
            ended_at: None,
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parent experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.status.state()
    }

    /// Get the start timestamp, if the run has started.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the end timestamp, if the run has completed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Start the run, transitioning from Pending to Running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tracking`] unless the run is Pending.
    pub fn start(&mut self) -> Result<()> {
        if self.status != RunStatus::Pending {
            return Err(Error::Tracking(format!(
                "run {} cannot start from status {:?}",
                self.run_id, self.status
            )));
        }
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Complete the run with the given final status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tracking`] unless the run is Running and `status`
    /// is terminal (Success, Failed, or Cancelled).
    pub fn complete(&mut self, status: RunStatus) -> Result<()> {
        if self.status != RunStatus::Running {
            return Err(Error::Tracking(format!(
                "run {} is not open (status {:?})",
                self.run_id, self.status
            )));
        }
        if !status.is_terminal() {
            return Err(Error::Tracking(format!(
                "{status:?} is not a final run status"
            )));
        }
        self.status = status;
        self.ended_at = Some(Utc::now());
        Ok(())
    }
}
