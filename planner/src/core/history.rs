//! Deterministic selection of similar past runs.
//!
//! Candidates come from the archived-run and world-run stores. Selection is a
//! pure function of the query and the candidate list: identical inputs always
//! produce identical, identically-ordered output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{JobKind, RunOutcome};

/// Flattened record of a past run, as read from a history source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryCandidate {
    pub run_id: String,
    /// Runs without a known start time are never selected.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub job_kind: Option<JobKind>,
    #[serde(default)]
    pub world_id: Option<String>,
    #[serde(default)]
    pub objective_id: Option<String>,
    pub outcome: RunOutcome,
    pub strategy: String,
    #[serde(default)]
    pub duration_secs: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub failing_gates: Vec<String>,
    #[serde(default)]
    pub failure_codes: Vec<String>,
}

/// What the current decision is about, for similarity ranking.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    pub job_kind: JobKind,
    pub now: DateTime<Utc>,
    pub tags: Vec<String>,
    pub world_id: Option<String>,
    pub objective_id: Option<String>,
}

const TAG_OVERLAP_CAP: i64 = 4;

/// Pick the `n` most relevant candidates.
///
/// Candidates without a start time are dropped. The remainder is sorted
/// ascending by `(started_at, run_id)` and deduplicated on that key before
/// ranking, so merged sources iterate deterministically. Ranking is by
/// integer relevance score descending, then recency descending, then
/// `run_id` ascending.
pub fn select(
    query: &HistoryQuery,
    candidates: Vec<HistoryCandidate>,
    n: usize,
) -> Vec<HistoryCandidate> {
    let mut known: Vec<HistoryCandidate> = candidates
        .into_iter()
        .filter(|candidate| candidate.started_at.is_some())
        .collect();
    known.sort_by(|a, b| {
        a.started_at
            .cmp(&b.started_at)
            .then_with(|| a.run_id.cmp(&b.run_id))
    });
    known.dedup_by(|a, b| a.started_at == b.started_at && a.run_id == b.run_id);

    let mut scored: Vec<(i64, HistoryCandidate)> = known
        .into_iter()
        .map(|candidate| (relevance(query, &candidate), candidate))
        .collect();
    scored.sort_by(|(score_a, a), (score_b, b)| {
        score_b
            .cmp(score_a)
            .then_with(|| b.started_at.cmp(&a.started_at))
            .then_with(|| a.run_id.cmp(&b.run_id))
    });
    scored.truncate(n);
    scored.into_iter().map(|(_, candidate)| candidate).collect()
}

/// Integer relevance score; no floats so ordering is exact.
fn relevance(query: &HistoryQuery, candidate: &HistoryCandidate) -> i64 {
    let mut score = 0i64;
    if candidate.job_kind == Some(query.job_kind) {
        score += 3;
    }
    if query.objective_id.is_some() && candidate.objective_id == query.objective_id {
        score += 2;
    }
    if query.world_id.is_some() && candidate.world_id == query.world_id {
        score += 2;
    }
    let overlap = query
        .tags
        .iter()
        .filter(|tag| candidate.tags.contains(tag))
        .count() as i64;
    score += overlap.min(TAG_OVERLAP_CAP);
    if let Some(started_at) = candidate.started_at {
        let age = query.now.signed_duration_since(started_at);
        if age <= chrono::Duration::days(1) {
            score += 2;
        } else if age <= chrono::Duration::days(7) {
            score += 1;
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate(run_id: &str, days_ago: i64, job_kind: JobKind) -> HistoryCandidate {
        HistoryCandidate {
            run_id: run_id.to_string(),
            started_at: Some(now() - chrono::Duration::days(days_ago)),
            job_kind: Some(job_kind),
            world_id: None,
            objective_id: None,
            outcome: RunOutcome::Passed,
            strategy: "single_shot".to_string(),
            duration_secs: Some(120),
            tags: Vec::new(),
            failing_gates: Vec::new(),
            failure_codes: Vec::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).single().expect("timestamp")
    }

    fn query() -> HistoryQuery {
        HistoryQuery {
            job_kind: JobKind::CodeFix,
            now: now(),
            tags: vec!["shader".to_string()],
            world_id: None,
            objective_id: None,
        }
    }

    #[test]
    fn drops_candidates_without_start_time() {
        let mut unknown = candidate("u", 1, JobKind::CodeFix);
        unknown.started_at = None;
        let selected = select(&query(), vec![unknown], 4);
        assert!(selected.is_empty());
    }

    #[test]
    fn ranks_matching_job_kind_and_tags_first() {
        let mut tagged = candidate("tagged", 30, JobKind::CodeFix);
        tagged.tags = vec!["shader".to_string()];
        let other_kind = candidate("other", 30, JobKind::AssetGeneration);
        let selected = select(&query(), vec![other_kind, tagged], 2);
        assert_eq!(selected[0].run_id, "tagged");
        assert_eq!(selected[1].run_id, "other");
    }

    #[test]
    fn recent_runs_outrank_old_ones_at_equal_similarity() {
        let old = candidate("old", 30, JobKind::CodeFix);
        let recent = candidate("recent", 1, JobKind::CodeFix);
        let selected = select(&query(), vec![old.clone(), recent], 2);
        assert_eq!(selected[0].run_id, "recent");
        assert_eq!(selected[1].run_id, "old");
    }

    #[test]
    fn equal_scores_break_by_run_id() {
        let b = candidate("b", 2, JobKind::CodeFix);
        let mut a = candidate("a", 2, JobKind::CodeFix);
        a.started_at = b.started_at;
        let selected = select(&query(), vec![b, a], 2);
        assert_eq!(selected[0].run_id, "a");
    }

    #[test]
    fn deduplicates_merged_sources() {
        let first = candidate("dup", 3, JobKind::CodeFix);
        let second = candidate("dup", 3, JobKind::CodeFix);
        let selected = select(&query(), vec![first, second], 8);
        assert_eq!(selected.len(), 1);
    }

    #[test]
    fn truncates_to_n() {
        let candidates: Vec<HistoryCandidate> = (0..10)
            .map(|index| candidate(&format!("run-{index}"), index + 10, JobKind::CodeFix))
            .collect();
        let selected = select(&query(), candidates, 3);
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn identical_inputs_yield_identical_order() {
        let candidates = vec![
            candidate("x", 1, JobKind::CodeFix),
            candidate("y", 5, JobKind::CodeFix),
            candidate("z", 9, JobKind::AssetGeneration),
        ];
        let first = select(&query(), candidates.clone(), 3);
        let second = select(&query(), candidates, 3);
        assert_eq!(first, second);
    }
}
