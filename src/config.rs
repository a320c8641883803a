//! Training parameter files
//!
//! Parameters live in a nested `train` group of a YAML, TOML, or JSON file:
//!
//! ```yaml
//! train:
//!   test_size: 0.2
//!   random_state: 42
//!   n_estimators: 100
//!   max_depth: null
//! ```
//!
//! Other top-level groups are ignored. Unknown keys inside `train` are kept
//! and logged as run parameters alongside the typed ones.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.json`
    Json,
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
}

impl ConfigFormat {
    /// Detect format from file extension
    #[must_use]
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

/// Named rule for how many feature columns each tree sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureRule {
    /// `floor(sqrt(n_features))`
    Sqrt,
    /// `floor(log2(n_features))`
    Log2,
    /// Every feature
    All,
}

/// Number of feature columns drawn for each tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxFeatures {
    /// Fixed count, clamped to the number of available features
    Count(usize),
    /// Count derived from the number of available features
    Rule(FeatureRule),
}

impl Default for MaxFeatures {
    fn default() -> Self {
        Self::Rule(FeatureRule::Sqrt)
    }
}

impl MaxFeatures {
    /// Resolve to a concrete count in `1..=n_features`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_sign_loss)]
    #[allow(clippy::cast_precision_loss)]
    pub fn resolve(self, n_features: usize) -> usize {
        let count = match self {
            Self::Count(count) => count,
            Self::Rule(FeatureRule::Sqrt) => (n_features as f64).sqrt().floor() as usize,
            Self::Rule(FeatureRule::Log2) => (n_features as f64).log2().floor() as usize,
            Self::Rule(FeatureRule::All) => n_features,
        };
        count.clamp(1, n_features.max(1))
    }
}

impl fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(count) => write!(f, "{count}"),
            Self::Rule(FeatureRule::Sqrt) => f.write_str("sqrt"),
            Self::Rule(FeatureRule::Log2) => f.write_str("log2"),
            Self::Rule(FeatureRule::All) => f.write_str("all"),
        }
    }
}

const fn default_bootstrap() -> bool {
    true
}

/// Hyperparameters of one training run.
///
/// Loaded once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    /// Fraction of rows held out for evaluation, in `(0, 1)`
    pub test_size: f64,
    /// Seed for the split, bootstrap sampling, and feature selection
    pub random_state: u64,
    /// Number of trees in the forest
    pub n_estimators: usize,
    /// Depth limit per tree; `None` grows until leaves are pure
    #[serde(default)]
    pub max_depth: Option<usize>,
    /// Feature columns per tree
    #[serde(default)]
    pub max_features: MaxFeatures,
    /// Fit each tree on a bootstrap sample instead of the full training set
    #[serde(default = "default_bootstrap")]
    pub bootstrap: bool,
    /// Keys the runner does not interpret, logged verbatim
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ParamsFile {
    train: TrainParams,
}

impl TrainParams {
    /// Load and validate the `train` group of a parameter file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file is missing, has an unknown
    /// extension, cannot be parsed, lacks a required key, or holds an
    /// out-of-range value.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_extension(path).ok_or_else(|| {
            Error::config(path, "unknown format (expected .yaml, .yml, .toml or .json)")
        })?;
        let content = fs::read_to_string(path)
            .map_err(|e| Error::config(path, format!("cannot read file: {e}")))?;

        let params = Self::parse(&content, format)
            .map_err(|message| Error::config(path, message))?;
        params
            .validate()
            .map_err(|e| Error::config(path, e.to_string()))?;

        tracing::debug!(path = %path.display(), ?format, "loaded training parameters");
        Ok(params)
    }

    /// Parse parameters from a string without validating them.
    ///
    /// # Errors
    ///
    /// Returns the parser's message if the content is malformed or the
    /// `train` group lacks a required key.
    pub fn parse(content: &str, format: ConfigFormat) -> std::result::Result<Self, String> {
        let file: ParamsFile = match format {
            ConfigFormat::Json => {
                serde_json::from_str(content).map_err(|e| format!("JSON parse error: {e}"))?
            }
            ConfigFormat::Yaml => {
                serde_yaml::from_str(content).map_err(|e| format!("YAML parse error: {e}"))?
            }
            ConfigFormat::Toml => {
                toml::from_str(content).map_err(|e| format!("TOML parse error: {e}"))?
            }
        };
        Ok(file.train)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] naming the first offending key.
    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(Error::InvalidParameter(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.n_estimators == 0 {
            return Err(Error::InvalidParameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(Error::InvalidParameter(
                "max_depth must be positive or null".to_string(),
            ));
        }
        if self.max_features == MaxFeatures::Count(0) {
            return Err(Error::InvalidParameter(
                "max_features must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Flatten into `(key, value)` pairs for the run's parameter log.
    ///
    /// Strings are logged without quotes, `null` as `null`, everything else
    /// in its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if an extra value cannot be serialized.
    pub fn to_logged_params(&self) -> Result<Vec<(String, String)>> {
        let value = serde_json::to_value(self)?;
        let serde_json::Value::Object(map) = value else {
            return Err(Error::InvalidParameter(
                "parameters did not serialize to a mapping".to_string(),
            ));
        };
        Ok(map
            .into_iter()
            .map(|(key, value)| {
                let rendered = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (key, rendered)
            })
            .collect())
    }
}
