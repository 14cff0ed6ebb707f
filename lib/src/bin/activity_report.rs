//! Command-line entry point: run the pipeline on a CSV file and print the report.

use activity_quality::{Pipeline, PipelineConfig, PipelineResult};
use clap::Parser;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "activity-report", version = activity_quality::VERSION)]
#[command(about = "Classify exercise quality from activity-monitor readings")]
struct Args {
    /// CSV file with a header row and the label column.
    #[arg(short, long)]
    input: PathBuf,

    /// JSON configuration; unspecified fields keep their defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the random seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the training worker count.
    #[arg(long)]
    workers: Option<usize>,

    /// Directory for the diagnostic plot data (scores.csv, oob_error.csv).
    #[arg(long)]
    plots_dir: Option<PathBuf>,

    /// Also write the report as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Log level: error, warn, info, debug or trace.
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

fn run(args: &Args) -> PipelineResult<()> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    let report = Pipeline::new(config)?.run_path(&args.input)?;
    println!("{report}");

    if let Some(dir) = &args.plots_dir {
        for path in report.write_plot_data(dir)? {
            tracing::info!(path = %path.display(), "wrote plot data");
        }
    }
    if let Some(path) = &args.json {
        report.to_json(path)?;
        tracing::info!(path = %path.display(), "wrote JSON report");
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(false)
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err}");
        std::process::exit(1);
    }
}
