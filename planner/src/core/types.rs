//! Shared deterministic types for planner core logic.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use serde::{Deserialize, Serialize};

/// Read-only view of a task as owned by the upstream task store.
///
/// Classification fields arrive as free-form strings and are clamped to the
/// closed enumerations below when the planner input is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskContext {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub risk: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    /// Preferred strategy name, if the task store recorded one.
    #[serde(default)]
    pub tool_hint: Option<String>,
    #[serde(default)]
    pub attempt: u32,
}

/// Kind of work a task dispatches as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    CodeFix,
    CodeFeature,
    CodeRefactor,
    AssetGeneration,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::CodeFix,
        JobKind::CodeFeature,
        JobKind::CodeRefactor,
        JobKind::AssetGeneration,
    ];

    pub fn domain(self) -> TaskDomain {
        match self {
            JobKind::CodeFix | JobKind::CodeFeature | JobKind::CodeRefactor => TaskDomain::Code,
            JobKind::AssetGeneration => TaskDomain::Asset,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::CodeFix => "code_fix",
            JobKind::CodeFeature => "code_feature",
            JobKind::CodeRefactor => "code_refactor",
            JobKind::AssetGeneration => "asset_generation",
        }
    }
}

/// Task domain parameterizing the action space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskDomain {
    Code,
    Asset,
}

impl TaskDomain {
    pub const ALL: [TaskDomain; 2] = [TaskDomain::Code, TaskDomain::Asset];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskDomain::Code => "code",
            TaskDomain::Asset => "asset",
        }
    }
}

/// Task priority, clamped from the task store's free-form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Critical,
    ];

    /// Clamp a raw classification to the enumeration. Absent or unknown
    /// values default to `Normal`.
    pub fn clamp(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("low") => Priority::Low,
            Some("normal") => Priority::Normal,
            Some("high") => Priority::High,
            Some("critical") => Priority::Critical,
            _ => Priority::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

/// Task risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl Risk {
    pub const ALL: [Risk; 3] = [Risk::Low, Risk::Medium, Risk::High];

    /// Clamp a raw classification; absent or unknown values default to `Medium`.
    pub fn clamp(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("low") => Risk::Low,
            Some("medium") => Risk::Medium,
            Some("high") => Risk::High,
            _ => Risk::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Risk::Low => "low",
            Risk::Medium => "medium",
            Risk::High => "high",
        }
    }
}

/// Task size classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Size {
    Small,
    Medium,
    Large,
}

impl Size {
    pub const ALL: [Size; 3] = [Size::Small, Size::Medium, Size::Large];

    /// Clamp a raw classification; absent or unknown values default to `Medium`.
    pub fn clamp(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("small") => Size::Small,
            Some("medium") => Size::Medium,
            Some("large") => Size::Large,
            _ => Size::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Size::Small => "small",
            Size::Medium => "medium",
            Size::Large => "large",
        }
    }
}

/// Outcome recorded for a past run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunOutcome {
    Passed,
    Failed,
    Timeout,
    Aborted,
}

impl RunOutcome {
    pub const ALL: [RunOutcome; 4] = [
        RunOutcome::Passed,
        RunOutcome::Failed,
        RunOutcome::Timeout,
        RunOutcome::Aborted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Passed => "passed",
            RunOutcome::Failed => "failed",
            RunOutcome::Timeout => "timeout",
            RunOutcome::Aborted => "aborted",
        }
    }
}

/// Coarse duration bucket used in history summaries and tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationBucket {
    #[serde(rename = "lt_1m")]
    Lt1m,
    #[serde(rename = "lt_5m")]
    Lt5m,
    #[serde(rename = "lt_15m")]
    Lt15m,
    #[serde(rename = "lt_1h")]
    Lt1h,
    #[serde(rename = "lt_4h")]
    Lt4h,
    #[serde(rename = "ge_4h")]
    Ge4h,
    #[serde(rename = "unknown")]
    Unknown,
}

impl DurationBucket {
    pub const ALL: [DurationBucket; 7] = [
        DurationBucket::Lt1m,
        DurationBucket::Lt5m,
        DurationBucket::Lt15m,
        DurationBucket::Lt1h,
        DurationBucket::Lt4h,
        DurationBucket::Ge4h,
        DurationBucket::Unknown,
    ];

    /// Map a raw duration in seconds onto the fixed ladder.
    pub fn for_duration_secs(duration_secs: Option<u64>) -> Self {
        match duration_secs {
            None => DurationBucket::Unknown,
            Some(secs) if secs < 60 => DurationBucket::Lt1m,
            Some(secs) if secs < 5 * 60 => DurationBucket::Lt5m,
            Some(secs) if secs < 15 * 60 => DurationBucket::Lt15m,
            Some(secs) if secs < 60 * 60 => DurationBucket::Lt1h,
            Some(secs) if secs < 4 * 60 * 60 => DurationBucket::Lt4h,
            Some(_) => DurationBucket::Ge4h,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DurationBucket::Lt1m => "lt_1m",
            DurationBucket::Lt5m => "lt_5m",
            DurationBucket::Lt15m => "lt_15m",
            DurationBucket::Lt1h => "lt_1h",
            DurationBucket::Lt4h => "lt_4h",
            DurationBucket::Ge4h => "ge_4h",
            DurationBucket::Unknown => "unknown",
        }
    }
}

/// Universe-level defaults embedded in the planner input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UniverseDefaults {
    pub default_strategy: String,
    pub default_objective: String,
}

/// Snapshot of dispatcher load at decision time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemState {
    pub queue_depth: u32,
    pub running_jobs: u32,
    /// Sorted before the document is built; the tokenizer relies on it.
    pub available_toolchains: Vec<String>,
}
