//! # inventoryst CLI interface
//!
//! Command parsing, tracing setup and the async [`run`] entrypoint used by
//! `main` and by the integration tests. Page handling, change detection and job
//! coordination live in `inventoryst-core`; this module only wires the
//! configuration, the built-in connectors and the publisher together.
//!
//! ## Exit codes
//! - `0`: every requested job succeeded
//! - `2`: the run completed but at least one job failed
//! - `1`: the run was aborted (unreadable config, missing output directory, ...)

use crate::connectors;
use crate::load_config::load_config;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use inventoryst_core::coordinator::{Coordinator, RunSummary};
use inventoryst_core::publish::Publisher;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// CLI for inventoryst: inventory SaaS platforms into Markdown pages.
#[derive(Parser, Debug)]
#[clap(
    name = "inventoryst",
    version,
    about = "Inventory SaaS platforms through their APIs and publish the results as Markdown pages"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the configured jobs and publish their pages
    Run {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Job to run instead of the configured list (repeatable)
        #[clap(long = "job")]
        jobs: Vec<String>,
        /// Output directory, overriding config and OUTPUT_DIRECTORY
        #[clap(long)]
        output_dir: Option<PathBuf>,
    },
    /// List the available jobs
    Jobs,
}

/// How a completed command should end the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    JobsFailed,
}

impl Outcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::JobsFailed => ExitCode::from(2),
        }
    }
}

/// Default log level: `debug` when `STAGE=dev`, `info` otherwise.
pub fn default_log_level(stage: Option<&str>) -> &'static str {
    match stage {
        Some(stage) if stage.eq_ignore_ascii_case("dev") => "debug",
        _ => "info",
    }
}

/// Installs the global fmt subscriber. `RUST_LOG` takes precedence over `STAGE`.
pub fn init_tracing() {
    let stage = std::env::var("STAGE").ok();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(stage.as_deref())));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<Outcome> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Run {
            config,
            jobs,
            output_dir,
        } => {
            let mut config = load_config(&config)?;
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if !jobs.is_empty() {
                config.jobs = jobs;
            }
            config.trace_loaded();

            let registry = connectors::registry();
            let publisher = Publisher::new(&config.output_dir, Utc::now().date_naive());
            tracing::info!(command = "run", "Starting inventory run");
            let summary = Coordinator::new(&registry, &publisher, &config.platforms)
                .run(&config.jobs)
                .await
                .context("Inventory run aborted")?;

            print_summary(&summary);
            if summary.all_succeeded() {
                Ok(Outcome::Success)
            } else {
                tracing::warn!(failed = ?summary.failed, "Some jobs failed");
                Ok(Outcome::JobsFailed)
            }
        }
        Commands::Jobs => {
            for id in connectors::registry().ids() {
                println!("{id}");
            }
            Ok(Outcome::Success)
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Inventory run finished: {} processed, {} failed, {} pages changed",
        summary.processed.len(),
        summary.failed.len(),
        summary.pages_changed
    );
    for metrics in &summary.metrics {
        println!(
            "  {:<14} {:?} api_calls={} pages_changed={} duration={:.2}s",
            metrics.job,
            metrics.state,
            metrics.api_calls,
            metrics.pages_changed,
            metrics.duration.as_secs_f64()
        );
    }
}
