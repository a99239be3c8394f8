//! The versioned planner input document and its builder.
//!
//! A planner input is built once per decision request, never mutated, and
//! persisted as an audit artifact. Identical logical content must always
//! serialize identically, so every collection in the document is stored in a
//! deterministic order and the document contains no floating-point fields.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::action_space::{ActionSpace, ActionSpaceSnapshot};
use crate::core::history::{self, HistoryCandidate, HistoryQuery};
use crate::core::keywords::{MAX_KEYWORDS, extract_keywords};
use crate::core::types::{
    DurationBucket, JobKind, Priority, Risk, RunOutcome, Size, SystemState, TaskContext,
    UniverseDefaults,
};

pub const PLANNER_INPUT_SCHEMA_VERSION: &str = "planner_input_v1";

/// Most similar runs embedded per input.
pub const MAX_SIMILAR_RUNS: usize = 8;

/// Failing gate names / failure codes kept per history summary.
pub const MAX_FAILURE_ITEMS: usize = 4;

/// Bounded task view inside the planner input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskSummary {
    pub task_id: String,
    /// Deterministic extraction order (frequency, then lexical).
    pub keywords: Vec<String>,
    /// Sorted and deduplicated.
    pub tags: Vec<String>,
    pub priority: Priority,
    pub risk: Risk,
    pub size: Size,
    pub tool_hint: Option<String>,
    pub attempt: u32,
}

/// Fixed-shape summary of one similar past run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistorySummary {
    pub run_id: String,
    /// RFC 3339; kept for audit and for the most-recent-first ordering.
    pub started_at: String,
    pub outcome: RunOutcome,
    pub strategy: String,
    pub duration_bucket: DurationBucket,
    /// Sorted, capped at [`MAX_FAILURE_ITEMS`].
    pub failing_gates: Vec<String>,
    /// Sorted, capped at [`MAX_FAILURE_ITEMS`].
    pub failure_codes: Vec<String>,
}

/// The versioned, hashable decision-request snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannerInput {
    pub schema_version: String,
    pub created_at: String,
    pub universe_id: String,
    pub job_kind: JobKind,
    pub universe_defaults: UniverseDefaults,
    pub task_summary: TaskSummary,
    /// Most-recent-first, at most [`MAX_SIMILAR_RUNS`] entries.
    pub history: Vec<HistorySummary>,
    pub action_space: ActionSpaceSnapshot,
    pub system_state: SystemState,
}

/// Everything the builder needs for one decision request.
#[derive(Debug)]
pub struct BuildInput<'a> {
    pub task: &'a TaskContext,
    pub job_kind: JobKind,
    pub universe_id: &'a str,
    pub universe_defaults: UniverseDefaults,
    pub action_space: &'a ActionSpace,
    pub history: Vec<HistoryCandidate>,
    pub system_state: SystemState,
    pub world_id: Option<String>,
    pub objective_id: Option<String>,
    pub now: DateTime<Utc>,
}

/// Assemble a planner input from a task context and its surroundings.
///
/// Classifications are clamped to the closed enumerations, keywords are
/// extracted deterministically, and the most relevant history is selected
/// and embedded most-recent-first.
pub fn build_planner_input(input: BuildInput<'_>) -> PlannerInput {
    let task = input.task;

    let mut tags = task.tags.clone();
    tags.sort();
    tags.dedup();

    let tool_hint = task
        .tool_hint
        .as_deref()
        .map(str::trim)
        .filter(|hint| !hint.is_empty())
        .map(str::to_string);

    let task_summary = TaskSummary {
        task_id: task.id.clone(),
        keywords: extract_keywords(&task.title, &task.description, MAX_KEYWORDS),
        tags: tags.clone(),
        priority: Priority::clamp(task.priority.as_deref()),
        risk: Risk::clamp(task.risk.as_deref()),
        size: Size::clamp(task.size.as_deref()),
        tool_hint,
        attempt: task.attempt,
    };

    let query = HistoryQuery {
        job_kind: input.job_kind,
        now: input.now,
        tags,
        world_id: input.world_id,
        objective_id: input.objective_id,
    };
    let selected = history::select(&query, input.history, MAX_SIMILAR_RUNS);
    let history = summarize_history(selected);

    let mut system_state = input.system_state;
    system_state.available_toolchains.sort();
    system_state.available_toolchains.dedup();

    PlannerInput {
        schema_version: PLANNER_INPUT_SCHEMA_VERSION.to_string(),
        created_at: input.now.to_rfc3339(),
        universe_id: input.universe_id.to_string(),
        job_kind: input.job_kind,
        universe_defaults: input.universe_defaults,
        task_summary,
        history,
        action_space: input.action_space.snapshot(),
        system_state,
    }
}

/// Summaries are embedded most-recent-first regardless of relevance rank.
fn summarize_history(mut selected: Vec<HistoryCandidate>) -> Vec<HistorySummary> {
    selected.sort_by(|a, b| {
        b.started_at
            .cmp(&a.started_at)
            .then_with(|| a.run_id.cmp(&b.run_id))
    });
    selected
        .into_iter()
        .map(|candidate| HistorySummary {
            run_id: candidate.run_id,
            started_at: candidate
                .started_at
                .map(|started_at| started_at.to_rfc3339())
                .unwrap_or_default(),
            outcome: candidate.outcome,
            strategy: candidate.strategy,
            duration_bucket: DurationBucket::for_duration_secs(candidate.duration_secs),
            failing_gates: sorted_capped(candidate.failing_gates),
            failure_codes: sorted_capped(candidate.failure_codes),
        })
        .collect()
}

fn sorted_capped(mut items: Vec<String>) -> Vec<String> {
    items.sort();
    items.dedup();
    items.truncate(MAX_FAILURE_ITEMS);
    items
}

impl PlannerInput {
    /// Canonical SHA-256 content hash of the document.
    ///
    /// Serialization goes through `serde_json::Value`, whose object keys are
    /// sorted, so logically identical documents hash identically regardless
    /// of how they were produced.
    pub fn content_hash(&self) -> Result<String> {
        let value = serde_json::to_value(self).context("serialize planner input")?;
        let canonical = serde_json::to_string(&value).context("canonicalize planner input")?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}
