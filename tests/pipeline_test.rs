//! End-to-end training runs against temporary workspaces

mod common;

use std::fs;

use common::{iris_workspace, two_class_workspace, PARAMS_YAML};
use trueno_train::experiment::{RunStatus, Tracker};
use trueno_train::metrics::{ACCURACY, F1_MACRO};
use trueno_train::model::RandomForest;
use trueno_train::pipeline::{run, MODEL_ARTIFACT_KEY};
use trueno_train::ErrorKind;

#[test]
fn test_successful_run_writes_model_and_one_record() {
    let (_dir, options) = iris_workspace(PARAMS_YAML);
    let summary = run(options.clone()).unwrap();

    // 150 rows, test_size 0.2 -> 30 held out, stratified 10/10/10
    assert_eq!(summary.test_rows, 30);
    assert_eq!(summary.train_rows, 120);
    assert_eq!(summary.report.per_class().iter().map(|c| c.support).collect::<Vec<_>>(), [10, 10, 10]);
    assert!(summary.accuracy() >= 0.8, "accuracy {}", summary.accuracy());
    assert!((0.0..=1.0).contains(&summary.f1_macro()));

    let model_meta = fs::metadata(&options.model_path).unwrap();
    assert!(model_meta.len() > 0);
    assert_eq!(model_meta.len(), summary.model_bytes);

    let tracker = Tracker::open(&options.tracking_dir).unwrap();
    let experiment = tracker.find_experiment(&options.experiment).unwrap().unwrap();
    let runs = experiment.runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].run_id(), summary.run.run_id());
    assert_eq!(runs[0].status(), RunStatus::Success);

    let details = tracker.load_run(summary.run.run_id()).unwrap();
    for key in ["test_size", "random_state", "n_estimators", "max_depth"] {
        assert!(details.param(key).is_some(), "missing param {key}");
    }
    assert_eq!(details.param("n_estimators"), Some("25"));
    assert_eq!(details.param("max_depth"), Some("null"));
    assert!((details.metric(ACCURACY).unwrap() - summary.accuracy()).abs() < 1e-12);
    assert!((details.metric(F1_MACRO).unwrap() - summary.f1_macro()).abs() < 1e-12);

    assert_eq!(details.artifacts.len(), 1);
    let artifact = &details.artifacts[0];
    assert_eq!(artifact.key(), MODEL_ARTIFACT_KEY);
    assert_eq!(artifact.size_bytes(), summary.model_bytes);
    let stored = fs::read(tracker.store().artifact_path(
        &summary.experiment_id,
        summary.run.run_id(),
        MODEL_ARTIFACT_KEY,
    ))
    .unwrap();
    assert_eq!(stored, fs::read(&options.model_path).unwrap());
}

#[test]
fn test_saved_model_reloads() {
    let (_dir, options) = iris_workspace(PARAMS_YAML);
    run(options.clone()).unwrap();

    let model = RandomForest::load(&options.model_path).unwrap();
    assert_eq!(model.n_trees(), 25);
    assert_eq!(model.classes(), ["0", "1", "2"]);
    assert_eq!(
        model.feature_names(),
        ["sepal_length", "sepal_width", "petal_length", "petal_width"]
    );
}

#[test]
fn test_same_seed_reproduces_scores() {
    let (_a, first) = iris_workspace(PARAMS_YAML);
    let (_b, second) = iris_workspace(PARAMS_YAML);

    let a = run(first).unwrap();
    let b = run(second).unwrap();
    assert_eq!(a.accuracy(), b.accuracy());
    assert_eq!(a.f1_macro(), b.f1_macro());
    assert_eq!(a.report.confusion(), b.report.confusion());
}

#[test]
fn test_balanced_two_class_run_is_reproducible() {
    let params = "train:\n  test_size: 0.25\n  random_state: 3\n  n_estimators: 10\n  max_depth: 3\n";
    let (_a, first) = two_class_workspace(params, 40);
    let (_b, second) = two_class_workspace(params, 40);

    let a = run(first).unwrap();
    let b = run(second).unwrap();
    assert_eq!(a.test_rows, 20);
    assert_eq!(a.accuracy(), b.accuracy());
    assert!((a.accuracy() - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_repeated_runs_append_records() {
    let (_dir, options) = iris_workspace(PARAMS_YAML);
    let a = run(options.clone()).unwrap();
    let b = run(options.clone()).unwrap();
    assert_ne!(a.run.run_id(), b.run.run_id());
    assert_eq!(a.experiment_id, b.experiment_id);

    let tracker = Tracker::open(&options.tracking_dir).unwrap();
    assert_eq!(tracker.list_experiments().unwrap().len(), 1);
    let runs = tracker.find_experiment(&options.experiment).unwrap().unwrap().runs().unwrap();
    assert_eq!(runs.len(), 2);
}

#[test]
fn test_toml_params() {
    let (dir, mut options) = iris_workspace(PARAMS_YAML);
    let toml_path = dir.path().join("params.toml");
    fs::write(
        &toml_path,
        "[train]\ntest_size = 0.3\nrandom_state = 1\nn_estimators = 5\nmax_depth = 4\n",
    )
    .unwrap();
    options.params_path = toml_path;

    let summary = run(options).unwrap();
    assert_eq!(summary.test_rows, 45);
}

#[test]
fn test_missing_config_key_fails_before_data_loading() {
    let (dir, mut options) = iris_workspace("train:\n  test_size: 0.2\n  random_state: 42\n  max_depth: 3\n");
    // Point at a dataset that does not exist: a config error proves it was never read
    options.data_path = dir.path().join("missing.csv");

    let err = run(options.clone()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains("n_estimators"), "{err}");
    assert!(!options.tracking_dir.exists());
    assert!(!options.model_path.exists());
}

#[test]
fn test_invalid_fraction_is_config_error() {
    let (_dir, options) = iris_workspace("train:\n  test_size: 1.5\n  random_state: 42\n  n_estimators: 5\n");
    let err = run(options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_missing_params_file() {
    let (dir, mut options) = iris_workspace(PARAMS_YAML);
    options.params_path = dir.path().join("nope.yaml");
    assert_eq!(run(options).unwrap_err().kind(), ErrorKind::Config);
}

#[test]
fn test_missing_label_column_fails_before_training() {
    let (_dir, mut options) = iris_workspace(PARAMS_YAML);
    options.label_column = "species".to_string();

    let err = run(options.clone()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Data);
    assert!(err.to_string().contains("species"));
    assert!(!options.tracking_dir.exists());
    assert!(!options.model_path.exists());
}

#[test]
fn test_missing_dataset_is_data_error() {
    let (dir, mut options) = iris_workspace(PARAMS_YAML);
    options.data_path = dir.path().join("missing.csv");
    assert_eq!(run(options).unwrap_err().kind(), ErrorKind::Data);
}

#[test]
fn test_unwritable_model_path_fails_run() {
    let (dir, mut options) = iris_workspace(PARAMS_YAML);
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    options.model_path = blocker.join("model.json");

    let err = run(options.clone()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);

    // The run was opened before the model write and is recorded as failed
    let tracker = Tracker::open(&options.tracking_dir).unwrap();
    let runs = tracker.find_experiment(&options.experiment).unwrap().unwrap().runs().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status(), RunStatus::Failed);
}

#[test]
fn test_nan_feature_is_data_error() {
    let (_dir, options) = iris_workspace(PARAMS_YAML);
    let csv = fs::read_to_string(&options.data_path).unwrap();
    let mut lines: Vec<String> = csv.lines().map(str::to_string).collect();
    lines[1] = "NaN,3.5,1.4,0.2,0".to_string();
    fs::write(&options.data_path, lines.join("\n") + "\n").unwrap();

    let err = run(options.clone()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Data);
    assert!(err.to_string().contains("sepal_length"), "{err}");
    assert!(!options.tracking_dir.exists());
    assert!(!options.model_path.exists());
}
