use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

mod cli;

use cli::{Cli, Commands};
use gridpilot::artifact::{ArtifactStore, FsArtifactStore};
use gridpilot::config::Config;
use gridpilot::domain::load_dataset;
use gridpilot::oracle::HttpOracle;
use gridpilot::pool::build_pool;
use gridpilot::recorder::ResultRecorder;
use gridpilot::sandbox::HttpSandbox;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gridpilot")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let log_file = log_dir.join(format!("gridpilot_{}.log", timestamp));

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    let cli = Cli::parse();

    let mut config =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match &cli.command {
        Commands::Run {
            dataset,
            max_revisions,
            model,
        } => {
            if let Some(n) = max_revisions {
                config.revision.max_revisions = *n;
            }
            if let Some(m) = model {
                config.oracle.model = m.clone();
            }
            run_batch(config, dataset, cli.verbose).await
        }
        Commands::Report { id } => show_report(&config, id),
    }
}

async fn run_batch(config: Config, dataset_path: &Path, verbose: bool) -> Result<()> {
    let tasks = load_dataset(dataset_path)
        .with_context(|| format!("Failed to load dataset {}", dataset_path.display()))?;
    info!("Loaded {} tasks from {}", tasks.len(), dataset_path.display());
    if verbose {
        println!(
            "{} {} tasks, model {}, max revisions {}",
            "Loaded:".cyan(),
            tasks.len(),
            config.oracle.model,
            config.revision.max_revisions
        );
    }

    fs::create_dir_all(&config.storage.output_dir).context("Failed to create output directory")?;

    let oracle = Arc::new(HttpOracle::new(config.oracle.clone())?);
    let backend = Arc::new(HttpSandbox::new(&config.sandbox)?);
    let store: Arc<dyn ArtifactStore> =
        Arc::new(FsArtifactStore::new(config.storage.output_dir.clone()));

    let pool = Arc::new(build_pool(oracle, backend, store, &config)?);

    {
        let pool = pool.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("{}", "Shutting down, releasing sandbox sessions...".yellow());
                pool.shutdown();
            }
        });
    }

    let summary = pool.run(tasks).await?;

    let rate = if summary.total == 0 {
        0.0
    } else {
        summary.solved as f64 / summary.total as f64 * 100.0
    };
    println!(
        "{} {}/{} tasks solved ({:.1}%), mean revisions {:.2}",
        "Done:".green(),
        summary.solved,
        summary.total,
        rate,
        summary.mean_revisions()
    );
    println!(
        "Reports written to {}",
        config.storage.report_dir.display()
    );
    Ok(())
}

fn show_report(config: &Config, id: &str) -> Result<()> {
    let recorder = ResultRecorder::new(&config.storage.report_dir)?;
    match recorder.load(id)? {
        Some(report) => {
            let status = if report.success {
                "solved".green()
            } else {
                "failed".red()
            };
            println!(
                "{} {} ({} attempts, {} revisions)",
                status, report.task_id, report.attempts, report.revisions
            );
            if let Some(cause) = report.cause {
                println!("cause: {:?}", cause);
            }
            if let Some(path) = &report.artifact_path {
                println!("artifact: {}", path.display());
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        None => println!("{} no report recorded for task {}", "Not found:".yellow(), id),
    }
    Ok(())
}
