//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use trueno_train::pipeline::RunnerOptions;

pub const PARAMS_YAML: &str = "\
train:
  test_size: 0.2
  random_state: 42
  n_estimators: 25
  max_depth: null
";

/// The bundled iris dataset.
pub fn iris_csv() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data/iris.csv")
}

/// Two balanced, well-separated classes on three features.
#[allow(clippy::cast_precision_loss)]
pub fn two_class_csv(rows_per_class: usize) -> String {
    let mut csv = String::from("f0,f1,f2,target\n");
    for i in 0..rows_per_class {
        let t = i as f64 / rows_per_class as f64;
        writeln!(csv, "{:.3},{:.3},{:.3},neg", t, 1.0 - t, 0.5 * t).unwrap();
        writeln!(csv, "{:.3},{:.3},{:.3},pos", 5.0 + t, 6.0 - t, 4.0 + t).unwrap();
    }
    csv
}

/// Workspace with a parameter file and `data/iris.csv`.
pub fn iris_workspace(params: &str) -> (tempfile::TempDir, RunnerOptions) {
    let dir = tempfile::tempdir().unwrap();
    let options = RunnerOptions::in_dir(dir.path());
    fs::write(&options.params_path, params).unwrap();
    fs::create_dir_all(options.data_path.parent().unwrap()).unwrap();
    fs::copy(iris_csv(), &options.data_path).unwrap();
    (dir, options)
}

/// Workspace with a parameter file and a two-class CSV at `data/iris.csv`.
pub fn two_class_workspace(params: &str, rows_per_class: usize) -> (tempfile::TempDir, RunnerOptions) {
    let dir = tempfile::tempdir().unwrap();
    let options = RunnerOptions::in_dir(dir.path());
    fs::write(&options.params_path, params).unwrap();
    fs::create_dir_all(options.data_path.parent().unwrap()).unwrap();
    fs::write(&options.data_path, two_class_csv(rows_per_class)).unwrap();
    (dir, options)
}
