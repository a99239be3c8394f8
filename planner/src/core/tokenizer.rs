//! Deterministic encoding of a planner input into a fixed-vocabulary token
//! sequence.
//!
//! Unbounded-cardinality fields (universe ids, objectives, tags, keywords,
//! toolchains, failure codes, gate names) are hash-bucketed into a fixed
//! number of buckets so the whole vocabulary can be enumerated at
//! model-build time. Changing [`BUCKET_HASH_VERSION`] invalidates any
//! previously trained model.

use sha2::{Digest, Sha256};

use crate::core::action_space::ActionSpace;
use crate::core::planner_input::{HistorySummary, MAX_FAILURE_ITEMS, PlannerInput};
use crate::core::types::{DurationBucket, JobKind, Priority, Risk, RunOutcome, Size};

pub const BOS: &str = "<bos>";
pub const EOS: &str = "<eos>";
pub const SEP: &str = "<sep>";

/// Buckets per hashed field.
pub const HASH_BUCKETS: u32 = 1024;

/// Identifies the bucket hash. Any change here retrains the model.
pub const BUCKET_HASH_VERSION: &str = "sha256-trunc32-v1";

/// Distinct `<hist_i>` position tokens; also the hard cap on encoded entries.
pub const MAX_HISTORY_POSITIONS: usize = 8;

/// Bucket tokens kept per set-valued field (tags, keywords, toolchains).
const MAX_SET_TOKENS: usize = 8;

const STRATEGY_UNKNOWN: &str = "strategy:unknown";
const TOOL_HINT_NONE: &str = "tool_hint:none";

const FIELD_KEYS: &[&str] = &[
    "universe_id",
    "job_kind",
    "default_strategy",
    "default_objective",
    "priority",
    "risk",
    "size",
    "tool_hint",
    "attempt",
    "tags",
    "keywords",
    "queue_depth",
    "running_jobs",
    "toolchains",
    "outcome",
    "strategy",
    "duration",
    "failure_codes",
    "failing_gates",
];

const BUCKET_PREFIXES: &[&str] = &["u", "obj", "tag", "kw", "tool", "code", "gate"];

/// Length bounds for one encoding call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLimits {
    pub max_similar_runs: usize,
    pub max_tokens_per_history_entry: usize,
    pub max_total_tokens: usize,
}

impl Default for TokenLimits {
    fn default() -> Self {
        Self {
            max_similar_runs: MAX_HISTORY_POSITIONS,
            max_tokens_per_history_entry: 24,
            max_total_tokens: 256,
        }
    }
}

/// Stable hash-bucket token for an unbounded raw string.
pub fn bucket_token(prefix: &str, raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(b":");
    hasher.update(raw.as_bytes());
    let digest = hasher.finalize();
    let word = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    format!("{prefix}#{:04}", word % HASH_BUCKETS)
}

/// Encode a planner input into a bounded token sequence.
///
/// The output always starts with `<bos>`, ends with `<eos>`, and never
/// exceeds `limits.max_total_tokens`. Two logically identical inputs encode
/// to byte-identical sequences: every set-valued field is sorted and
/// deduplicated before emission.
pub fn encode(input: &PlannerInput, limits: &TokenLimits) -> Vec<String> {
    let known_strategies = snapshot_strategies(input);
    let mut tokens = vec![BOS.to_string()];

    tokens.push("universe_id".to_string());
    tokens.push(bucket_token("u", &input.universe_id));
    tokens.push("job_kind".to_string());
    tokens.push(format!("job:{}", input.job_kind.as_str()));
    tokens.push("default_strategy".to_string());
    tokens.push(strategy_token(
        &input.universe_defaults.default_strategy,
        &known_strategies,
    ));
    tokens.push("default_objective".to_string());
    tokens.push(bucket_token("obj", &input.universe_defaults.default_objective));
    tokens.push(SEP.to_string());

    let task = &input.task_summary;
    tokens.push("priority".to_string());
    tokens.push(format!("priority:{}", task.priority.as_str()));
    tokens.push("risk".to_string());
    tokens.push(format!("risk:{}", task.risk.as_str()));
    tokens.push("size".to_string());
    tokens.push(format!("size:{}", task.size.as_str()));
    tokens.push("tool_hint".to_string());
    tokens.push(tool_hint_token(task.tool_hint.as_deref(), &known_strategies));
    tokens.push("attempt".to_string());
    tokens.push(attempt_token(task.attempt));
    tokens.push("tags".to_string());
    tokens.extend(bucket_set("tag", &task.tags));
    tokens.push("keywords".to_string());
    tokens.extend(bucket_set("kw", &task.keywords));
    tokens.push(SEP.to_string());

    let system = &input.system_state;
    tokens.push("queue_depth".to_string());
    tokens.push(load_token("queue", system.queue_depth));
    tokens.push("running_jobs".to_string());
    tokens.push(load_token("running", system.running_jobs));
    tokens.push("toolchains".to_string());
    tokens.extend(bucket_set("tool", &system.available_toolchains));
    tokens.push(SEP.to_string());

    let entry_cap = limits.max_similar_runs.min(MAX_HISTORY_POSITIONS);
    for (position, entry) in input.history.iter().take(entry_cap).enumerate() {
        let mut block = history_block(position, entry, &known_strategies);
        block.truncate(limits.max_tokens_per_history_entry);
        tokens.extend(block);
    }

    let cap = limits.max_total_tokens.max(2);
    if tokens.len() > cap - 1 {
        tokens.truncate(cap - 1);
    }
    if tokens.last().map(String::as_str) == Some(SEP) {
        tokens.pop();
    }
    tokens.push(EOS.to_string());
    tokens
}

/// Enumerate the full vocabulary for a deployment's action space.
///
/// Independent of any particular input, so it can be fixed at model-build
/// time.
pub fn vocabulary(space: &ActionSpace) -> Vec<String> {
    let mut vocab: Vec<String> = Vec::new();
    vocab.push(BOS.to_string());
    vocab.push(EOS.to_string());
    vocab.push(SEP.to_string());
    for position in 0..MAX_HISTORY_POSITIONS {
        vocab.push(format!("<hist_{position}>"));
    }
    vocab.extend(FIELD_KEYS.iter().map(|key| (*key).to_string()));

    for kind in JobKind::ALL {
        vocab.push(format!("job:{}", kind.as_str()));
    }
    let strategies = space.all_strategies();
    for strategy in &strategies {
        vocab.push(format!("strategy:{strategy}"));
        vocab.push(format!("tool_hint:{strategy}"));
    }
    vocab.push(STRATEGY_UNKNOWN.to_string());
    vocab.push(TOOL_HINT_NONE.to_string());
    for priority in Priority::ALL {
        vocab.push(format!("priority:{}", priority.as_str()));
    }
    for risk in Risk::ALL {
        vocab.push(format!("risk:{}", risk.as_str()));
    }
    for size in Size::ALL {
        vocab.push(format!("size:{}", size.as_str()));
    }
    for outcome in RunOutcome::ALL {
        vocab.push(format!("outcome:{}", outcome.as_str()));
    }
    for bucket in DurationBucket::ALL {
        vocab.push(format!("duration:{}", bucket.as_str()));
    }
    for level in ["0", "1", "2", "3plus"] {
        vocab.push(format!("attempt:{level}"));
    }
    for level in ["empty", "low", "medium", "high"] {
        vocab.push(format!("queue:{level}"));
    }
    for level in ["none", "low", "medium", "high"] {
        vocab.push(format!("running:{level}"));
    }

    for prefix in BUCKET_PREFIXES {
        for bucket in 0..HASH_BUCKETS {
            vocab.push(format!("{prefix}#{bucket:04}"));
        }
    }
    vocab
}

fn history_block(
    position: usize,
    entry: &HistorySummary,
    known_strategies: &[String],
) -> Vec<String> {
    let mut block = vec![format!("<hist_{position}>")];
    block.push("outcome".to_string());
    block.push(format!("outcome:{}", entry.outcome.as_str()));
    block.push("strategy".to_string());
    block.push(strategy_token(&entry.strategy, known_strategies));
    block.push("duration".to_string());
    block.push(format!("duration:{}", entry.duration_bucket.as_str()));
    block.push("failure_codes".to_string());
    block.extend(bucket_list("code", &entry.failure_codes));
    block.push("failing_gates".to_string());
    block.extend(bucket_list("gate", &entry.failing_gates));
    block
}

fn snapshot_strategies(input: &PlannerInput) -> Vec<String> {
    let mut strategies: Vec<String> = input
        .action_space
        .strategies
        .values()
        .flatten()
        .cloned()
        .collect();
    strategies.sort();
    strategies.dedup();
    strategies
}

fn strategy_token(strategy: &str, known: &[String]) -> String {
    if known.iter().any(|name| name == strategy) {
        format!("strategy:{strategy}")
    } else {
        STRATEGY_UNKNOWN.to_string()
    }
}

fn tool_hint_token(hint: Option<&str>, known: &[String]) -> String {
    match hint {
        Some(hint) if known.iter().any(|name| name == hint) => format!("tool_hint:{hint}"),
        _ => TOOL_HINT_NONE.to_string(),
    }
}

fn attempt_token(attempt: u32) -> String {
    match attempt {
        0 => "attempt:0".to_string(),
        1 => "attempt:1".to_string(),
        2 => "attempt:2".to_string(),
        _ => "attempt:3plus".to_string(),
    }
}

fn load_token(prefix: &str, value: u32) -> String {
    let level = match (prefix, value) {
        ("queue", 0) => "empty",
        (_, 0) => "none",
        (_, 1..=2) => "low",
        (_, 3..=8) => "medium",
        (_, _) => "high",
    };
    format!("{prefix}:{level}")
}

/// Sorted, deduplicated bucket tokens for a set-valued field.
///
/// Sorting happens on the bucket tokens, after hashing, so the emission
/// order is independent of the order the raw values arrived in.
fn bucket_set(prefix: &str, values: &[String]) -> Vec<String> {
    let mut buckets: Vec<String> = values
        .iter()
        .map(|value| bucket_token(prefix, value))
        .collect();
    buckets.sort();
    buckets.dedup();
    buckets.truncate(MAX_SET_TOKENS);
    buckets
}

/// Like [`bucket_set`] but capped at the per-summary failure-item bound
/// before hashing.
fn bucket_list(prefix: &str, values: &[String]) -> Vec<String> {
    let capped = &values[..values.len().min(MAX_FAILURE_ITEMS)];
    let mut buckets: Vec<String> = capped
        .iter()
        .map(|value| bucket_token(prefix, value))
        .collect();
    buckets.sort();
    buckets.dedup();
    buckets
}
