//! Test-only helpers for constructing deterministic planner fixtures.

use chrono::{DateTime, TimeZone, Utc};

use crate::core::action_space::ActionSpace;
use crate::core::decide::{
    Baseline, DecideRequest, DecisionBundle, PlannerMode, PredictFailure, PredictionStatus,
    RawPrediction, resolve_decision,
};
use crate::core::history::HistoryCandidate;
use crate::core::planner_input::{BuildInput, build_planner_input};
use crate::core::types::{
    JobKind, RunOutcome, SystemState, TaskContext, UniverseDefaults,
};
use crate::predictor::Predictor;

/// Fixed wall clock so fixtures hash identically across runs.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0)
        .single()
        .expect("fixed timestamp")
}

/// Deterministic task with default fields.
pub fn task_context(id: &str) -> TaskContext {
    TaskContext {
        id: id.to_string(),
        title: format!("{} title", id),
        description: format!("{} description", id),
        tags: vec!["shader".to_string()],
        priority: Some("high".to_string()),
        risk: None,
        size: Some("small".to_string()),
        tool_hint: None,
        attempt: 0,
    }
}

/// History candidate started `days_ago` days before [`fixed_now`].
pub fn history_candidate(run_id: &str, days_ago: i64) -> HistoryCandidate {
    HistoryCandidate {
        run_id: run_id.to_string(),
        started_at: Some(fixed_now() - chrono::Duration::days(days_ago)),
        job_kind: Some(JobKind::CodeFix),
        world_id: None,
        objective_id: None,
        outcome: RunOutcome::Passed,
        strategy: "single_shot".to_string(),
        duration_secs: Some(300),
        tags: vec!["shader".to_string()],
        failing_gates: Vec::new(),
        failure_codes: Vec::new(),
    }
}

/// Builder input over the default action space and a quiet system.
pub fn build_input<'a>(
    task: &'a TaskContext,
    history: Vec<HistoryCandidate>,
) -> BuildInput<'a> {
    static SPACE: std::sync::OnceLock<ActionSpace> = std::sync::OnceLock::new();
    let space = SPACE.get_or_init(ActionSpace::default_space);
    BuildInput {
        task,
        job_kind: JobKind::CodeFix,
        universe_id: "universe-1",
        universe_defaults: UniverseDefaults {
            default_strategy: "single_shot".to_string(),
            default_objective: "ship".to_string(),
        },
        action_space: space,
        history,
        system_state: SystemState {
            queue_depth: 2,
            running_jobs: 1,
            available_toolchains: vec!["codex".to_string(), "claude_code".to_string()],
        },
        world_id: None,
        objective_id: None,
        now: fixed_now(),
    }
}

/// Baseline used across decision tests: `single_shot`, 2 candidates, 1800 s.
pub fn baseline() -> Baseline {
    Baseline {
        strategy: "single_shot".to_string(),
        max_candidates: 2,
        timeout_cap_secs: 1800,
        max_iterations: 4,
    }
}

pub fn prediction(
    strategy: &str,
    candidates_bin: Option<u32>,
    minutes_bin: Option<u32>,
    iterations_bin: Option<u32>,
    confidence: f64,
) -> RawPrediction {
    RawPrediction {
        strategy: strategy.to_string(),
        candidates_bin,
        minutes_bin,
        iterations_bin,
        confidence,
    }
}

/// Decide request with the threshold and hash fixed for tests.
pub fn decide_request<'a>(
    mode: PlannerMode,
    space: &'a ActionSpace,
    baseline: &'a Baseline,
    prediction: PredictionStatus,
) -> DecideRequest<'a> {
    let model_ref = match &prediction {
        PredictionStatus::Received(_) | PredictionStatus::Failed(_) => {
            Some("tuned_v1".to_string())
        }
        _ => None,
    };
    DecideRequest {
        mode,
        space,
        domain: crate::core::types::TaskDomain::Code,
        baseline,
        confidence_threshold: 0.8,
        prediction,
        model_ref,
        input_hash: "0a".repeat(32),
        now: fixed_now(),
    }
}

/// Complete schema-valid decision bundle (off mode over the default space).
pub fn decision_bundle() -> DecisionBundle {
    let task = task_context("task-1");
    let input = build_planner_input(build_input(&task, vec![history_candidate("run-1", 1)]));
    let input_hash = input.content_hash().expect("hash");
    let space = ActionSpace::default_space();
    let baseline = baseline();
    let (action, plan) = resolve_decision(DecideRequest {
        mode: PlannerMode::Off,
        space: &space,
        domain: crate::core::types::TaskDomain::Code,
        baseline: &baseline,
        confidence_threshold: 0.8,
        prediction: PredictionStatus::NotRequested,
        model_ref: None,
        input_hash,
        now: fixed_now(),
    });
    DecisionBundle {
        input,
        action,
        plan,
    }
}

/// In-memory predictor returning a fixed result.
#[derive(Debug)]
pub struct FakePredictor {
    result: Result<RawPrediction, PredictFailure>,
}

impl FakePredictor {
    pub fn returning(prediction: RawPrediction) -> Self {
        Self {
            result: Ok(prediction),
        }
    }

    pub fn failing(failure: PredictFailure) -> Self {
        Self {
            result: Err(failure),
        }
    }
}

impl Predictor for FakePredictor {
    fn model_ref(&self) -> &str {
        "fake_model_v1"
    }

    fn predict(&self, _tokens: &[String]) -> Result<RawPrediction, PredictFailure> {
        self.result.clone()
    }
}
