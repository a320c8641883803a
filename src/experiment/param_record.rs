//! Param Record - one logged hyperparameter of a run

use serde::{Deserialize, Serialize};

/// A parameter logged against a run.
///
/// Values are stored as strings; a key is written at most once per run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParamRecord {
    run_id: String,
    key: String,
    value: String,
}

impl ParamRecord {
    /// Create a new param record.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parameter name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the parameter value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}
