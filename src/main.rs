use anyhow::bail;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use gpcleanrs::{discover_cases, split_and_run, Config};

#[derive(Parser)]
#[command(name = "gpcleanrs")]
#[command(about = "Clean GP files and SliceInfo files and derive missing landmarks", version)]
struct Cli {
    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory with one subdirectory per case
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Number of cases processed in parallel
    #[arg(short, long)]
    workers: Option<usize>,

    /// Append-only log of the cases dispatched in each chunk
    #[arg(long)]
    failure_log: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let start = Instant::now();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(root) = cli.root {
        config.root_dir = root;
    }
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(log) = cli.failure_log {
        config.failure_log = log;
    }
    config.validate()?;

    let cases = discover_cases(&config.root_dir)?;
    let report = split_and_run(&cases, &config)?;

    info!("TOTAL TIME: {:.2?}", start.elapsed());

    let failed = report.failed().count();
    if failed > 0 {
        bail!("{} of {} cases failed", failed, report.outcomes.len());
    }
    Ok(())
}
