mod cli;
mod dataset;
mod metrics;
mod oracle;
mod policy;
mod report;
#[cfg(test)]
mod test_fixtures;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "eval", version, about = "Offline outcome evaluator for the planner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score a policy against the oracle over a labeled dataset.
    Evaluate {
        /// JSONL dataset of recorded multi-candidate runs.
        dataset: PathBuf,
        /// Policy to score: `baseline` or `model`.
        #[arg(long, default_value = "baseline")]
        policy: String,
        /// Model bundle directory (required for `--policy model`).
        #[arg(long)]
        bundle: Option<PathBuf>,
        #[arg(long, default_value = "eval-results")]
        out: PathBuf,
    },
    /// Reprint a written metrics artifact.
    Report { path: PathBuf },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Evaluate {
            dataset,
            policy,
            bundle,
            out,
        } => cli::evaluate_dataset(&dataset, &policy, bundle.as_deref(), &out),
        Command::Report { path } => cli::report_metrics(&path),
    }
}
