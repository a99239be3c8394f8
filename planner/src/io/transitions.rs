//! Point-in-time snapshot of the historical transition store.
//!
//! The store file is appended to by other parts of the system; this reader
//! takes a snapshot at load time, never locks, and tolerates a missing or
//! partially written file by serving no estimates.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::router::{RouteFeatures, TransitionEstimates};
use crate::core::types::{JobKind, TaskDomain};

/// One aggregated transition row.
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionRecord {
    pub toolchain: String,
    pub domain: TaskDomain,
    pub job_kind: JobKind,
    pub successes: u64,
    pub attempts: u64,
}

/// Immutable aggregate counts keyed by `(toolchain, domain, job_kind)`.
#[derive(Debug, Default)]
pub struct TransitionSnapshot {
    counts: BTreeMap<(String, TaskDomain, JobKind), (u64, u64)>,
    min_samples: u64,
}

impl TransitionSnapshot {
    /// Load a snapshot from a JSON array of records.
    ///
    /// Any read or parse problem yields an empty snapshot with a warning:
    /// the router then degrades to neutral estimates.
    pub fn load(path: &Path, min_samples: u64) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "transition store unreadable");
                return Self {
                    counts: BTreeMap::new(),
                    min_samples,
                };
            }
        };
        let records: Vec<TransitionRecord> = match serde_json::from_str(&contents) {
            Ok(records) => records,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "transition store malformed");
                return Self {
                    counts: BTreeMap::new(),
                    min_samples,
                };
            }
        };

        let mut counts: BTreeMap<(String, TaskDomain, JobKind), (u64, u64)> = BTreeMap::new();
        for record in records {
            let entry = counts
                .entry((record.toolchain, record.domain, record.job_kind))
                .or_insert((0, 0));
            entry.0 += record.successes;
            entry.1 += record.attempts;
        }
        debug!(path = %path.display(), keys = counts.len(), "transition snapshot loaded");
        Self {
            counts,
            min_samples,
        }
    }
}

impl TransitionEstimates for TransitionSnapshot {
    /// Empirical success rate, or `None` below the sample floor.
    ///
    /// Counts are aggregated per `(toolchain, domain, job_kind)`; the finer
    /// route features do not partition the stored aggregates.
    fn success_probability(
        &self,
        toolchain: &str,
        domain: TaskDomain,
        job_kind: JobKind,
        _features: &RouteFeatures,
    ) -> Option<f64> {
        let (successes, attempts) = self
            .counts
            .get(&(toolchain.to_string(), domain, job_kind))
            .copied()?;
        if attempts < self.min_samples.max(1) {
            return None;
        }
        Some(successes as f64 / attempts as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features() -> RouteFeatures {
        RouteFeatures::default()
    }

    #[test]
    fn missing_file_serves_no_estimates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let snapshot = TransitionSnapshot::load(&temp.path().join("absent.json"), 1);
        assert_eq!(
            snapshot.success_probability("codex", TaskDomain::Code, JobKind::CodeFix, &features()),
            None
        );
    }

    #[test]
    fn aggregates_rows_and_applies_sample_floor() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("transitions.json");
        fs::write(
            &path,
            r#"[
  {"toolchain": "codex", "domain": "code", "job_kind": "code_fix", "successes": 6, "attempts": 8},
  {"toolchain": "codex", "domain": "code", "job_kind": "code_fix", "successes": 3, "attempts": 4},
  {"toolchain": "rare", "domain": "code", "job_kind": "code_fix", "successes": 1, "attempts": 2}
]"#,
        )
        .expect("write");
        let snapshot = TransitionSnapshot::load(&path, 5);
        let rate = snapshot
            .success_probability("codex", TaskDomain::Code, JobKind::CodeFix, &features())
            .expect("rate");
        assert!((rate - 0.75).abs() < 1e-9);
        assert_eq!(
            snapshot.success_probability("rare", TaskDomain::Code, JobKind::CodeFix, &features()),
            None
        );
    }

    #[test]
    fn malformed_file_degrades_to_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("transitions.json");
        fs::write(&path, "[{ truncated").expect("write");
        let snapshot = TransitionSnapshot::load(&path, 1);
        assert_eq!(
            snapshot.success_probability("codex", TaskDomain::Code, JobKind::CodeFix, &features()),
            None
        );
    }
}
