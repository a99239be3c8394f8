//! Metrics artifact persistence and the printed summary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::metrics::EvalMetrics;

/// Metadata + metrics for one evaluation run, persisted to `metrics.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsArtifact {
    pub eval_run_id: String,
    pub created_at: String,
    pub dataset_path: String,
    /// SHA-256 of the dataset file for reproducibility tracking.
    pub dataset_sha256: String,
    pub policy: String,
    pub metrics: EvalMetrics,
}

pub fn new_run_id() -> String {
    format!(
        "eval-{}-{:04x}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        rand::random::<u16>()
    )
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    Ok(hex::encode(hasher.finalize()))
}

/// Write the artifact under `<out>/<eval_run_id>/metrics.json`.
pub fn write_metrics(out_dir: &Path, artifact: &MetricsArtifact) -> Result<PathBuf> {
    let run_dir = out_dir.join(&artifact.eval_run_id);
    fs::create_dir_all(&run_dir).with_context(|| format!("create {}", run_dir.display()))?;
    let path = run_dir.join("metrics.json");
    let mut contents = serde_json::to_string_pretty(artifact).context("serialize metrics")?;
    contents.push('\n');
    fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

pub fn load_metrics(path: &Path) -> Result<MetricsArtifact> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

pub fn print_summary(artifact: &MetricsArtifact) {
    let metrics = &artifact.metrics;
    println!(
        "report: run={} policy={} dataset={}",
        artifact.eval_run_id, artifact.policy, artifact.dataset_path
    );
    println!(
        "report: examples={} selections={} passes={} pass_rate={:.3}",
        metrics.examples, metrics.selections, metrics.passes, metrics.pass_rate
    );
    println!(
        "report: mean_time_to_pass={} duration_per_pass={} cost_per_pass={}",
        fmt_opt(metrics.mean_time_to_pass),
        fmt_opt(metrics.duration_per_pass),
        fmt_opt(metrics.cost_per_pass)
    );
    println!(
        "report: oracle_match_rate={} ({}/{})",
        fmt_opt(metrics.oracle_match_rate),
        metrics.oracle_matches,
        metrics.oracle_comparable
    );
    println!(
        "report: mean_regret={} over {} examples",
        fmt_opt(metrics.mean_regret),
        metrics.regret_examples
    );
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.3}"),
        None => "n/a".to_string(),
    }
}
