//! CLI for LLM Workbench.
//!
//! This crate provides the `workbench` binary: load configuration, wire
//! the benchmark runner, execute a run for a profile and write the result
//! snapshot. Report rendering beyond a short terminal summary lives in
//! separate tooling that consumes the JSON snapshots.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use llm_workbench_core::{ExecutionMode, HardwareProfile, WorkbenchConfig};
use llm_workbench_runner::{io, BenchmarkRunner, RunOptions, RunStatus};

/// LLM Workbench CLI.
#[derive(Parser, Debug)]
#[command(name = "workbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML). Built-in defaults when omitted.
    #[arg(short, long, global = true, env = "WORKBENCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the benchmark for a hardware profile and write the snapshot.
    Run {
        /// Hardware profile: light, medium or heavy.
        #[arg(short, long)]
        profile: String,

        /// Scheduling mode override: sequential, bounded_parallel or
        /// fully_concurrent.
        #[arg(short, long)]
        mode: Option<String>,

        /// Sample size override.
        #[arg(short, long)]
        samples: Option<usize>,

        /// Output directory override for result snapshots.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List configured profiles and their instances.
    Profiles,

    /// List registered benchmark tasks.
    Tasks,
}

/// Run the CLI with the process arguments.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => WorkbenchConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => WorkbenchConfig::default(),
    };

    match cli.command {
        Commands::Run {
            profile,
            mode,
            samples,
            output,
        } => run_benchmark(config, &profile, mode.as_deref(), samples, output).await,
        Commands::Profiles => {
            list_profiles(&config);
            Ok(())
        }
        Commands::Tasks => {
            list_tasks(&config);
            Ok(())
        }
    }
}

async fn run_benchmark(
    config: WorkbenchConfig,
    profile: &str,
    mode: Option<&str>,
    samples: Option<usize>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let profile: HardwareProfile = profile.parse()?;
    let mode = mode.map(str::parse::<ExecutionMode>).transpose()?;
    let output_dir = output.unwrap_or_else(|| config.output_dir.clone());

    let runner = BenchmarkRunner::from_config(config)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("running benchmark on profile '{profile}'"));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let run = runner
        .run_with(
            profile,
            RunOptions {
                sample_size: samples,
                mode,
            },
        )
        .await;
    spinner.finish_and_clear();

    let path = io::write_snapshot(&run, &output_dir)
        .with_context(|| format!("writing snapshot to {}", output_dir.display()))?;

    match run.status {
        RunStatus::Completed => {
            println!("{} profile '{}'", "completed".green().bold(), profile);
            println!(
                "  work items: {} ({} completed, {} failed, {} timeout)",
                run.metrics.total_tasks,
                run.metrics.completed_tasks,
                run.metrics.failed_tasks,
                run.metrics.timeout_tasks
            );
            println!(
                "  token reduction: {}",
                format_percent(run.comparison.token_reduction_percent)
            );
            println!(
                "  time reduction:  {}",
                format_percent(run.comparison.time_reduction_percent)
            );
            println!(
                "  confidence: {:?} (effect size {:.2})",
                run.comparison.confidence, run.comparison.significance
            );
            println!("  snapshot: {}", path.display());
            Ok(())
        }
        RunStatus::Failed => {
            let message = run
                .error_message
                .unwrap_or_else(|| "unknown error".to_string());
            println!("{} profile '{}': {}", "failed".red().bold(), profile, message);
            println!("  snapshot: {}", path.display());
            anyhow::bail!("benchmark run failed: {message}")
        }
    }
}

fn format_percent(value: f64) -> String {
    let text = format!("{value:+.1}%");
    if value > 0.0 {
        text.green().to_string()
    } else if value < 0.0 {
        text.red().to_string()
    } else {
        text
    }
}

fn list_profiles(config: &WorkbenchConfig) {
    for (profile, pc) in &config.profiles {
        println!(
            "{} (sample size {})",
            profile.to_string().bold(),
            pc.sample_size
        );
        for instance in &pc.instances {
            println!(
                "  {} {} @ {} (max_concurrent {}, timeout {}s)",
                instance.name,
                instance.model_id,
                instance.url(),
                instance.max_concurrent,
                instance.timeout_secs
            );
        }
    }
}

fn list_tasks(config: &WorkbenchConfig) {
    let registry = llm_workbench_core::TaskRegistry::with_default_tasks(&config.tasks);
    for task in registry.list_tasks() {
        println!(
            "{} [{}] {}",
            task.id.bold(),
            task.workflow_category,
            task.name
        );
    }
}
