use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use esp_trainer::evaluation::TestWindow;
use esp_trainer::persistence;
use esp_trainer::stream::{SyntheticConfig, SyntheticGenerator};
use esp_trainer::training::TrainingReport;
use esp_trainer::{AppConfig, CentroidEngine, ManualClock, Mode, TrainingSession};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Moving-average window of the reference engine
const ENGINE_WINDOW: usize = 4;

#[derive(Parser, Debug)]
#[command(
    name = "esp_cli",
    about = "Offline harness for the ESP trainer session"
)]
struct Cli {
    /// JSON configuration file (defaults to assets/esp_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record synthetic samples, train the centroid engine and score a test recording
    Simulate {
        #[arg(long, default_value_t = 3)]
        dimensions: usize,
        #[arg(long, default_value_t = 3)]
        labels: u32,
        #[arg(long, default_value_t = 2)]
        samples_per_label: usize,
        #[arg(long, default_value_t = 20)]
        rows_per_sample: usize,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Save the training and test datasets into this directory
        #[arg(long)]
        save_dir: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print per-label sample counts and names of a training file
    Inspect {
        #[arg(long)]
        training: PathBuf,
    },
    /// Train on a training file and print predicted labels for a test file
    Evaluate {
        #[arg(long)]
        training: PathBuf,
        #[arg(long)]
        test: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::default(),
    };

    match cli.command {
        Commands::Simulate {
            dimensions,
            labels,
            samples_per_label,
            rows_per_sample,
            seed,
            save_dir,
            output,
        } => {
            let plan = SimulationPlan {
                dimensions,
                labels,
                samples_per_label,
                rows_per_sample,
                seed,
            };
            run_simulate(config, &plan, save_dir, output)
        }
        Commands::Inspect { training } => run_inspect(&training),
        Commands::Evaluate { training, test } => run_evaluate(config, &training, &test),
    }
}

struct SimulationPlan {
    dimensions: usize,
    labels: u32,
    samples_per_label: usize,
    rows_per_sample: usize,
    seed: u64,
}

/// Session on a manual clock, so training can be triggered without waiting
fn offline_session(config: AppConfig, dimensions: usize) -> (TrainingSession, Arc<ManualClock>) {
    let config = config.with_dimensions(dimensions);
    let clock = Arc::new(ManualClock::new());
    let engine = Box::new(CentroidEngine::new(dimensions, ENGINE_WINDOW));
    let session = TrainingSession::with_time_source(config, engine, clock.clone());
    (session, clock)
}

/// Let the debounce elapse, launch the run and block until it is applied
fn train_now(session: &mut TrainingSession, clock: &ManualClock, delay: Duration) -> Result<TrainingReport> {
    clock.advance(delay);
    session.tick().context("ticking the session")?;
    match session.wait_for_training() {
        Some(report) => Ok(report),
        None => bail!("no training run was launched"),
    }
}

fn feed(session: &mut TrainingSession, rows: Vec<Vec<f64>>) -> Result<()> {
    session.buffer().push(rows).context("feeding rows")?;
    session.tick().context("ticking the session")?;
    Ok(())
}

fn run_simulate(
    config: AppConfig,
    plan: &SimulationPlan,
    save_dir: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    if plan.labels == 0 || plan.labels > config.training.max_labels {
        bail!(
            "labels must be between 1 and {}",
            config.training.max_labels
        );
    }
    let delay = Duration::from_millis(config.training.training_delay_ms);
    let (mut session, clock) = offline_session(config, plan.dimensions);
    let mut generator = SyntheticGenerator::new(SyntheticConfig {
        dimensions: plan.dimensions,
        rows_per_batch: plan.rows_per_sample,
        seed: plan.seed,
        ..SyntheticConfig::default()
    });

    session.set_mode(Mode::Training);
    for label in 1..=plan.labels {
        for _ in 0..plan.samples_per_label {
            session.start_recording();
            feed(&mut session, generator.batch(label))?;
            session
                .finish_recording(label)
                .with_context(|| format!("recording a sample for label {label}"))?;
        }
    }

    let mut expected = Vec::new();
    session.start_recording();
    for label in 1..=plan.labels {
        feed(&mut session, generator.batch(label))?;
        expected.extend(std::iter::repeat(label).take(plan.rows_per_sample));
    }
    session.record_test_data().context("recording test data")?;

    session.request_training();
    let training = train_now(&mut session, &clock, delay)?;

    let predictions = session.test_data().predictions().to_vec();
    let correct = predictions
        .iter()
        .zip(&expected)
        .filter(|(p, e)| p == e)
        .count();

    if let Some(dir) = save_dir {
        let paths = session_paths(&dir);
        session
            .save_training(&paths.0)
            .with_context(|| format!("saving {}", paths.0.display()))?;
        session
            .save_test(&paths.1)
            .with_context(|| format!("saving {}", paths.1.display()))?;
    }

    let report = SimulationReport {
        dimensions: plan.dimensions,
        labels: plan.labels,
        training_samples: session.store().total_samples(),
        training_succeeded: training.succeeded(),
        training_generation: training.generation,
        status: session.status(),
        test_rows: predictions.len(),
        correct,
        accuracy: if predictions.is_empty() {
            0.0
        } else {
            correct as f64 / predictions.len() as f64
        },
        advice: session.training_data_advice(),
    };
    emit_json(&report, output)?;

    Ok(ExitCode::from(if training.succeeded() { 0 } else { 2 }))
}

fn session_paths(dir: &Path) -> (PathBuf, PathBuf) {
    let defaults = AppConfig::default().persistence;
    (
        dir.join(defaults.training_file),
        dir.join(defaults.test_file),
    )
}

fn run_inspect(training: &Path) -> Result<ExitCode> {
    let data = persistence::read_training(training)
        .with_context(|| format!("reading {}", training.display()))?;

    let mut labels: Vec<LabelSummary> = Vec::new();
    for sample in data.iter() {
        match labels.iter_mut().find(|l| l.label == sample.label) {
            Some(summary) => {
                summary.samples += 1;
                summary.rows += sample.data.num_rows();
            }
            None => labels.push(LabelSummary {
                label: sample.label,
                name: data.class_name(sample.label).unwrap_or_default().to_string(),
                samples: 1,
                rows: sample.data.num_rows(),
            }),
        }
    }
    labels.sort_by_key(|l| l.label);

    let report = InspectReport {
        dataset_name: &data.dataset_name,
        num_dimensions: data.num_dimensions,
        num_samples: data.num_samples(),
        labels,
    };
    emit_json(&report, None)?;
    Ok(ExitCode::from(0))
}

fn run_evaluate(config: AppConfig, training: &Path, test: &Path) -> Result<ExitCode> {
    let dimensions = persistence::read_training(training)
        .with_context(|| format!("reading {}", training.display()))?
        .num_dimensions;
    let delay = Duration::from_millis(config.training.training_delay_ms);
    let (mut session, clock) = offline_session(config, dimensions);

    session
        .load_training(training)
        .with_context(|| format!("loading {}", training.display()))?;
    let report = train_now(&mut session, &clock, delay)?;
    session
        .load_test(test)
        .with_context(|| format!("loading {}", test.display()))?;

    let window = session.test_window(None);
    emit_json(
        &EvaluateReport {
            training_succeeded: report.succeeded(),
            status: session.status(),
            window: &window,
        },
        None,
    )?;
    Ok(ExitCode::from(if report.succeeded() { 0 } else { 2 }))
}

fn emit_json<T: Serialize>(value: &T, output_path: Option<PathBuf>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }
    Ok(())
}

#[derive(Serialize)]
struct SimulationReport<'a> {
    dimensions: usize,
    labels: u32,
    training_samples: usize,
    training_succeeded: bool,
    training_generation: u64,
    status: &'a str,
    test_rows: usize,
    correct: usize,
    accuracy: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    advice: String,
}

#[derive(Serialize)]
struct LabelSummary {
    label: u32,
    name: String,
    samples: usize,
    rows: usize,
}

#[derive(Serialize)]
struct InspectReport<'a> {
    dataset_name: &'a str,
    num_dimensions: usize,
    num_samples: usize,
    labels: Vec<LabelSummary>,
}

#[derive(Serialize)]
struct EvaluateReport<'a> {
    training_succeeded: bool,
    status: &'a str,
    window: &'a TestWindow,
}
