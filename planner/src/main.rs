//! Planner CLI: decide, inspect encodings, and validate audit bundles.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use planner::core::decide::Baseline;
use planner::core::router::{RouteFeatures, TransitionEstimates, candidate_toolchains, order_toolchains};
use planner::core::tokenizer::{encode, vocabulary};
use planner::core::types::{JobKind, Risk, SystemState, TaskContext, UniverseDefaults};
use planner::decide::{DecisionRequest, run_decision};
use planner::io::bundle::{load_bundle, write_bundle};
use planner::io::config::load_config;
use planner::io::transitions::TransitionSnapshot;
use planner::predictor::PredictorCell;

#[derive(Parser)]
#[command(
    name = "planner",
    version,
    about = "Policy-gated action selection for the task dispatcher"
)]
struct Cli {
    /// Planner configuration file.
    #[arg(long, default_value = "planner.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decide strategy and budgets for a task and write the audit bundle.
    Decide {
        /// Task context JSON file.
        #[arg(long)]
        task: PathBuf,
        #[arg(long)]
        universe: String,
        #[arg(long, value_parser = parse_job_kind)]
        job_kind: JobKind,
        /// Baseline strategy (externally computed).
        #[arg(long)]
        strategy: String,
        #[arg(long, default_value_t = 1)]
        max_candidates: u32,
        #[arg(long, default_value_t = 1800)]
        timeout_cap_secs: u64,
        #[arg(long, default_value_t = 1)]
        max_iterations: u32,
        #[arg(long, default_value = "")]
        objective: String,
        #[arg(long, default_value_t = 0)]
        queue_depth: u32,
        #[arg(long, default_value_t = 0)]
        running_jobs: u32,
        /// Directory that receives one bundle directory per decision.
        #[arg(long, default_value = "decisions")]
        out: PathBuf,
    },
    /// Print the token sequence for a planner input JSON file.
    Encode {
        #[arg(long)]
        input: PathBuf,
    },
    /// Dump the enumerable token vocabulary.
    Vocab,
    /// Print the blended toolchain order for a job kind and tags.
    Route {
        #[arg(long, value_parser = parse_job_kind)]
        job_kind: JobKind,
        #[arg(long, value_delimiter = ',', default_value = "")]
        tags: Vec<String>,
    },
    /// Validate the configuration and, optionally, a written bundle.
    Validate {
        /// Bundle directory to re-validate against the schemas.
        #[arg(long)]
        bundle: Option<PathBuf>,
    },
}

fn main() {
    planner::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Decide {
            task,
            universe,
            job_kind,
            strategy,
            max_candidates,
            timeout_cap_secs,
            max_iterations,
            objective,
            queue_depth,
            running_jobs,
            out,
        } => cmd_decide(CmdDecide {
            config_path: cli.config,
            task_path: task,
            universe,
            job_kind,
            baseline: Baseline {
                strategy,
                max_candidates,
                timeout_cap_secs,
                max_iterations,
            },
            objective,
            queue_depth,
            running_jobs,
            out,
        }),
        Command::Encode { input } => cmd_encode(&cli.config, &input),
        Command::Vocab => cmd_vocab(&cli.config),
        Command::Route { job_kind, tags } => cmd_route(&cli.config, job_kind, &tags),
        Command::Validate { bundle } => cmd_validate(&cli.config, bundle.as_deref()),
    }
}

struct CmdDecide {
    config_path: PathBuf,
    task_path: PathBuf,
    universe: String,
    job_kind: JobKind,
    baseline: Baseline,
    objective: String,
    queue_depth: u32,
    running_jobs: u32,
    out: PathBuf,
}

fn cmd_decide(args: CmdDecide) -> Result<()> {
    let config = load_config(&args.config_path)?;
    let task: TaskContext = read_json_file(&args.task_path).context("load task context")?;

    let request = DecisionRequest {
        task: &task,
        job_kind: args.job_kind,
        universe_id: &args.universe,
        universe_defaults: UniverseDefaults {
            default_strategy: args.baseline.strategy.clone(),
            default_objective: args.objective.clone(),
        },
        baseline: &args.baseline,
        system_state: SystemState {
            queue_depth: args.queue_depth,
            running_jobs: args.running_jobs,
            available_toolchains: config.routing.toolchain_priority.clone(),
        },
        world_id: None,
        objective_id: (!args.objective.is_empty()).then(|| args.objective.clone()),
    };

    let predictor = PredictorCell::new();
    let bundle = run_decision(&config, &request, &predictor, Utc::now())?;

    let short_hash: String = bundle.action.input_hash.chars().take(12).collect();
    let bundle_dir = args.out.join(format!("{}-{}", task.id, short_hash));
    let paths = write_bundle(&bundle_dir, &bundle)?;

    println!(
        "decide: task={} strategy={} candidates={} timeout_secs={} iterations={} fallback={} reason={} bundle={}",
        task.id,
        bundle.plan.strategy_executed,
        bundle.plan.max_candidates_executed,
        bundle.plan.timeout_seconds_executed,
        bundle.plan.max_iterations_executed,
        bundle.plan.fallback_applied,
        bundle
            .plan
            .fallback_reason
            .map(|reason| reason.as_str())
            .unwrap_or("none"),
        paths.dir.display()
    );
    Ok(())
}

fn cmd_encode(config_path: &Path, input_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let input = read_json_file(input_path).context("load planner input")?;
    for token in encode(&input, &config.token_limits()) {
        println!("{token}");
    }
    Ok(())
}

fn cmd_vocab(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let space = config.build_action_space()?;
    for token in vocabulary(&space) {
        println!("{token}");
    }
    Ok(())
}

fn cmd_route(config_path: &Path, job_kind: JobKind, tags: &[String]) -> Result<()> {
    let config = load_config(config_path)?;
    let tags: Vec<String> = tags
        .iter()
        .filter(|tag| !tag.trim().is_empty())
        .cloned()
        .collect();
    let (candidates, matched) = candidate_toolchains(
        &config.routing.rules,
        &config.routing.toolchain_priority,
        job_kind,
        &tags,
    );

    let snapshot = config
        .routing
        .transitions_path
        .as_deref()
        .map(|path| TransitionSnapshot::load(path, config.routing.min_samples));
    let features = RouteFeatures {
        risk: Risk::Medium,
        tags,
    };
    let ranked = order_toolchains(
        &candidates,
        job_kind.domain(),
        job_kind,
        &features,
        snapshot
            .as_ref()
            .map(|snapshot| snapshot as &dyn TransitionEstimates),
        config.routing.blend_weight,
    );

    if let Some(rule) = matched {
        println!(
            "route: rule matched speculate={} parallelism={}",
            rule.speculate, rule.parallelism
        );
    }
    for entry in ranked {
        println!(
            "route: toolchain={} score={:.4} empirical={}",
            entry.toolchain,
            entry.score,
            entry
                .empirical
                .map(|rate| format!("{rate:.4}"))
                .unwrap_or_else(|| "none".to_string())
        );
    }
    Ok(())
}

fn cmd_validate(config_path: &Path, bundle_dir: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    config.build_action_space()?;
    println!("validate: config ok");
    if let Some(dir) = bundle_dir {
        load_bundle(dir).with_context(|| format!("validate bundle {}", dir.display()))?;
        println!("validate: bundle ok {}", dir.display());
    }
    Ok(())
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

fn parse_job_kind(raw: &str) -> Result<JobKind, String> {
    match raw {
        "code_fix" => Ok(JobKind::CodeFix),
        "code_feature" => Ok(JobKind::CodeFeature),
        "code_refactor" => Ok(JobKind::CodeRefactor),
        "asset_generation" => Ok(JobKind::AssetGeneration),
        other => Err(format!(
            "unknown job kind {other} (expected code_fix, code_feature, code_refactor, asset_generation)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_decide_args() {
        let cli = Cli::parse_from([
            "planner",
            "decide",
            "--task",
            "task.json",
            "--universe",
            "u1",
            "--job-kind",
            "code_fix",
            "--strategy",
            "single_shot",
            "--max-candidates",
            "2",
        ]);
        match cli.command {
            Command::Decide {
                job_kind,
                max_candidates,
                timeout_cap_secs,
                ..
            } => {
                assert_eq!(job_kind, JobKind::CodeFix);
                assert_eq!(max_candidates, 2);
                assert_eq!(timeout_cap_secs, 1800);
            }
            _ => panic!("expected decide"),
        }
    }

    #[test]
    fn rejects_unknown_job_kind() {
        let result = Cli::try_parse_from([
            "planner",
            "route",
            "--job-kind",
            "video_editing",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_validate_with_bundle() {
        let cli = Cli::parse_from(["planner", "validate", "--bundle", "decisions/t-1"]);
        assert!(matches!(cli.command, Command::Validate { bundle: Some(_) }));
    }
}
