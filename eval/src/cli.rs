//! CLI command implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{debug, info};

use planner::core::tokenizer::TokenLimits;
use planner::predictor::{CommandPredictor, Predictor};

use crate::dataset::load_dataset;
use crate::metrics::evaluate;
use crate::policy::SelectionPolicy;
use crate::report::{MetricsArtifact, file_sha256, load_metrics, new_run_id, print_summary, write_metrics};

/// Evaluate a policy over a dataset and persist the metrics artifact.
pub fn evaluate_dataset(
    dataset_path: &Path,
    policy_name: &str,
    bundle_dir: Option<&Path>,
    out_dir: &Path,
) -> Result<()> {
    let policy = resolve_policy(policy_name, bundle_dir)?;
    let examples = load_dataset(dataset_path).context("load dataset")?;
    debug!(examples = examples.len(), policy = policy.name(), "dataset loaded");

    info!(policy = policy.name(), "evaluation started");
    let metrics = evaluate(&examples, &policy);

    let artifact = MetricsArtifact {
        eval_run_id: new_run_id(),
        created_at: Utc::now().to_rfc3339(),
        dataset_path: dataset_path.display().to_string(),
        dataset_sha256: file_sha256(dataset_path).context("hash dataset")?,
        policy: policy.name().to_string(),
        metrics,
    };
    let path = write_metrics(out_dir, &artifact).context("write metrics")?;
    print_summary(&artifact);
    println!("evaluate: metrics={}", path.display());
    Ok(())
}

/// Reprint a previously written metrics artifact.
pub fn report_metrics(path: &Path) -> Result<()> {
    let artifact = load_metrics(path)?;
    print_summary(&artifact);
    Ok(())
}

fn resolve_policy(policy_name: &str, bundle_dir: Option<&Path>) -> Result<SelectionPolicy> {
    match policy_name {
        "baseline" => Ok(SelectionPolicy::Baseline),
        "model" => {
            let dir = bundle_dir
                .ok_or_else(|| anyhow::anyhow!("--bundle is required for the model policy"))?;
            let predictor = CommandPredictor::load(dir)
                .map_err(|err| anyhow::anyhow!("load model bundle: {err}"))?;
            Ok(SelectionPolicy::Model {
                predictor: Arc::new(predictor) as Arc<dyn Predictor>,
                limits: TokenLimits::default(),
            })
        }
        other => bail!("unknown policy {other} (expected baseline or model)"),
    }
}
