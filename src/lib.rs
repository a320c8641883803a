//! # Trueno-Train: Reproducible Classifier Training Runs
//!
//! **Version**: 0.1.0
//!
//! Trueno-Train fits a random forest on a small tabular dataset, scores it on
//! a stratified held-out split, and records parameters, metrics, and the
//! serialized model in a local, file-backed experiment tracker.
//!
//! ## Pipeline
//!
//! ```text
//! params.yaml ─► TrainParams ─┐
//! data/iris.csv ─► Dataset ───┴─► stratified_split ─► RandomForest::fit
//!                                                          │
//!                     mlruns/<exp>/<run>/ ◄─ ActiveRun ◄── evaluate
//! ```
//!
//! Every stage is deterministic under `random_state`: the same parameter
//! file and dataset give the same split, the same forest, and the same scores.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use trueno_train::pipeline::{run, RunnerOptions};
//!
//! let summary = run(RunnerOptions::default())?;
//! println!("Accuracy: {:.4} | F1-macro: {:.4}", summary.accuracy(), summary.f1_macro());
//! # Ok::<(), trueno_train::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod split;
pub mod storage;

pub use error::{Error, ErrorKind, Result};
