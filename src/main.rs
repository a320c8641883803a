//! `trueno-train` command line

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trueno_train::experiment::{RunStatus, Tracker};
use trueno_train::metrics::{ACCURACY, F1_MACRO};
use trueno_train::pipeline::{RunnerOptions, TrainingRunner, DEFAULT_EXPERIMENT};

#[derive(Parser, Debug)]
#[command(name = "trueno-train", version, about = "Train a random forest and track the run")]
struct Cli {
    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit, evaluate, and record one run
    Train(TrainArgs),
    /// List the runs of an experiment
    Runs {
        #[command(flatten)]
        store: StoreArgs,
        /// Experiment name
        #[arg(long, default_value = DEFAULT_EXPERIMENT)]
        experiment: String,
    },
    /// Show params, metrics, and artifacts of one run
    Show {
        #[command(flatten)]
        store: StoreArgs,
        /// Run ID
        run_id: String,
    },
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Root of the tracking store
    #[arg(long, default_value = "mlruns")]
    tracking_dir: PathBuf,
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Parameter file (.yaml, .toml or .json) with a `train` group
    #[arg(long, default_value = "params.yaml")]
    params: PathBuf,
    /// Dataset (CSV with header, or Parquet)
    #[arg(long, default_value = "data/iris.csv")]
    data: PathBuf,
    /// Label column name
    #[arg(long, default_value = "target")]
    label: String,
    /// Where to write the fitted model
    #[arg(long, default_value = "models/model.json")]
    model_out: PathBuf,
    #[command(flatten)]
    store: StoreArgs,
    /// Experiment the run is recorded under
    #[arg(long, default_value = DEFAULT_EXPERIMENT)]
    experiment: String,
}

impl From<TrainArgs> for RunnerOptions {
    fn from(args: TrainArgs) -> Self {
        Self {
            params_path: args.params,
            data_path: args.data,
            label_column: args.label,
            model_path: args.model_out,
            tracking_dir: args.store.tracking_dir,
            experiment: args.experiment,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Train(args) => train(args),
        Command::Runs { store, experiment } => list_runs(&store, &experiment),
        Command::Show { store, run_id } => show_run(&store, &run_id),
    }
}

fn train(args: TrainArgs) -> anyhow::Result<()> {
    let runner = TrainingRunner::new(args.into());
    let summary = runner.run().context("training run failed")?;

    println!("Training complete (run {})", summary.run.run_id());
    println!(
        "Accuracy: {:.4} | F1-macro: {:.4}",
        summary.accuracy(),
        summary.f1_macro()
    );
    Ok(())
}

fn list_runs(store: &StoreArgs, experiment: &str) -> anyhow::Result<()> {
    let tracker = Tracker::open(&store.tracking_dir)
        .with_context(|| format!("cannot open tracking store {}", store.tracking_dir.display()))?;
    let Some(experiment) = tracker.find_experiment(experiment)? else {
        anyhow::bail!("experiment '{experiment}' not found");
    };

    println!("{:<34} {:<10} {:>9} {:>9}", "RUN", "STATUS", ACCURACY, F1_MACRO);
    for run in experiment.runs()? {
        let details = tracker.load_run(run.run_id())?;
        println!(
            "{:<34} {:<10} {:>9} {:>9}",
            run.run_id(),
            format!("{:?}", run.status()),
            format_metric(details.metric(ACCURACY)),
            format_metric(details.metric(F1_MACRO)),
        );
    }
    Ok(())
}

fn show_run(store: &StoreArgs, run_id: &str) -> anyhow::Result<()> {
    let tracker = Tracker::open(&store.tracking_dir)
        .with_context(|| format!("cannot open tracking store {}", store.tracking_dir.display()))?;
    let details = tracker.load_run(run_id)?;
    let run = &details.run;

    println!("run:        {}", run.run_id());
    println!("experiment: {}", run.experiment_id());
    println!("status:     {:?}", run.status());
    if let Some(started) = run.started_at() {
        println!("started:    {started}");
    }
    if let Some(ended) = run.ended_at() {
        println!("ended:      {ended}");
    }
    if run.status() != RunStatus::Success {
        println!("(run did not complete successfully)");
    }

    println!("\nparams:");
    for param in &details.params {
        println!("  {} = {}", param.key(), param.value());
    }
    println!("\nmetrics:");
    for metric in &details.metrics {
        println!("  {} [step {}] = {:.4}", metric.key(), metric.step(), metric.value());
    }
    println!("\nartifacts:");
    for artifact in &details.artifacts {
        println!(
            "  {} ({} bytes, {})",
            artifact.key(),
            artifact.size_bytes(),
            artifact.cas_hash()
        );
    }
    Ok(())
}

fn format_metric(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}
