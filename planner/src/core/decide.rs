//! Policy decision engine: turns a (possibly absent) prediction into a final,
//! auditable execution plan.
//!
//! The engine never errors. Every failure path resolves to the externally
//! supplied baseline with `fallback_applied = true` and the first failing
//! reason from a closed enumeration. The learned policy may only shrink
//! resource budgets within the pre-selected strategy, never grow them and
//! never switch strategies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::action_space::{ActionSpace, BinKind, nearest_bin};
use crate::core::planner_input::PlannerInput;
use crate::core::types::TaskDomain;

pub const PLANNER_ACTION_SCHEMA_VERSION: &str = "planner_action_v1";
pub const EXECUTED_PLAN_SCHEMA_VERSION: &str = "executed_plan_v1";

/// `model_ref` recorded when no learned model drove the action.
pub const BASELINE_MODEL_REF: &str = "baseline_heuristic_v0";

/// Run mode, set externally per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerMode {
    /// Baseline only; the predictor is never invoked.
    Off,
    /// Predictor runs for data collection but never drives execution.
    Log,
    /// Predictions become binding when every safety check passes.
    Enforce,
}

/// Closed enumeration of fallback reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    PlannerOff,
    LogOnly,
    LowConfidence,
    MalformedPrediction,
    PredictionOutOfSpace,
    PredictionInvalid,
    SwarmMismatch,
    MaxCandidatesExceedsCap,
    TimeoutExceedsCap,
    InferenceFailed,
    ModelUnavailable,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackReason::PlannerOff => "planner_off",
            FallbackReason::LogOnly => "log_only",
            FallbackReason::LowConfidence => "low_confidence",
            FallbackReason::MalformedPrediction => "malformed_prediction",
            FallbackReason::PredictionOutOfSpace => "prediction_out_of_space",
            FallbackReason::PredictionInvalid => "prediction_invalid",
            FallbackReason::SwarmMismatch => "swarm_mismatch",
            FallbackReason::MaxCandidatesExceedsCap => "max_candidates_exceeds_cap",
            FallbackReason::TimeoutExceedsCap => "timeout_exceeds_cap",
            FallbackReason::InferenceFailed => "inference_failed",
            FallbackReason::ModelUnavailable => "model_unavailable",
        }
    }
}

/// Externally computed baseline the policy may only shrink against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Baseline {
    pub strategy: String,
    pub max_candidates: u32,
    pub timeout_cap_secs: u64,
    pub max_iterations: u32,
}

/// Raw 4-tuple + confidence as produced by the predictor.
///
/// Absent or `null` bins are the NA sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawPrediction {
    pub strategy: String,
    #[serde(default)]
    pub candidates_bin: Option<u32>,
    #[serde(default)]
    pub minutes_bin: Option<u32>,
    #[serde(default)]
    pub iterations_bin: Option<u32>,
    pub confidence: f64,
}

/// Why a prediction could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictFailure {
    /// Output did not decode as a prediction.
    Malformed(String),
    /// Spawn failure, timeout, or non-zero exit.
    Inference(String),
}

/// What the predictor layer handed the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionStatus {
    /// Mode `off`: the predictor was never consulted.
    NotRequested,
    /// Bundle absent or its load failed (memoized).
    Unavailable(String),
    Failed(PredictFailure),
    Received(RawPrediction),
}

/// Discretized budgets recorded in the action document.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Budgets {
    pub candidates_bin: Option<u32>,
    pub minutes_bin: Option<u32>,
    pub iterations_bin: Option<u32>,
}

/// The decision document, one per request, immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannerAction {
    pub schema_version: String,
    pub created_at: String,
    pub strategy: String,
    pub budgets: Budgets,
    pub confidence: f64,
    pub abstain_to_default: bool,
    pub reason: Option<String>,
    pub model_ref: String,
    pub input_hash: String,
}

/// Resolved values handed to the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutedPlan {
    pub schema_version: String,
    pub strategy_executed: String,
    pub max_candidates_executed: u32,
    pub timeout_seconds_executed: u64,
    pub max_iterations_executed: u32,
    pub fallback_applied: bool,
    pub fallback_reason: Option<FallbackReason>,
}

/// Complete auditable decision: input, action, and executed plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionBundle {
    pub input: PlannerInput,
    pub action: PlannerAction,
    pub plan: ExecutedPlan,
}

/// One decision request, fully resolved inputs only.
#[derive(Debug)]
pub struct DecideRequest<'a> {
    pub mode: PlannerMode,
    pub space: &'a ActionSpace,
    pub domain: TaskDomain,
    pub baseline: &'a Baseline,
    pub confidence_threshold: f64,
    pub prediction: PredictionStatus,
    /// `model_ref` of the loaded predictor, when one produced output.
    pub model_ref: Option<String>,
    pub input_hash: String,
    pub now: DateTime<Utc>,
}

/// Resolve a decision. Total: every input combination yields a complete
/// action + plan pair.
pub fn resolve_decision(request: DecideRequest<'_>) -> (PlannerAction, ExecutedPlan) {
    match request.mode {
        PlannerMode::Off => {
            let action = baseline_action(&request, 1.0, true, Some(FallbackReason::PlannerOff));
            let plan = baseline_plan(request.baseline, false, None);
            (action, plan)
        }
        PlannerMode::Log => {
            let action = match &request.prediction {
                PredictionStatus::Received(prediction) => recorded_action(
                    &request,
                    prediction,
                    true,
                    Some(FallbackReason::LogOnly),
                ),
                _ => baseline_action(&request, 0.0, true, Some(FallbackReason::LogOnly)),
            };
            let plan = baseline_plan(request.baseline, true, Some(FallbackReason::LogOnly));
            (action, plan)
        }
        PlannerMode::Enforce => enforce(&request),
    }
}

/// The eight ordered checks; first failure wins.
fn enforce(request: &DecideRequest<'_>) -> (PlannerAction, ExecutedPlan) {
    let prediction = match &request.prediction {
        PredictionStatus::NotRequested | PredictionStatus::Unavailable(_) => {
            return reject(request, None, FallbackReason::ModelUnavailable);
        }
        PredictionStatus::Failed(PredictFailure::Malformed(_)) => {
            return reject(request, None, FallbackReason::MalformedPrediction);
        }
        PredictionStatus::Failed(PredictFailure::Inference(_)) => {
            return reject(request, None, FallbackReason::InferenceFailed);
        }
        PredictionStatus::Received(prediction) => prediction,
    };

    if prediction.confidence < request.confidence_threshold {
        return reject(request, Some(prediction), FallbackReason::LowConfidence);
    }
    if !well_formed(prediction) {
        return reject(request, Some(prediction), FallbackReason::MalformedPrediction);
    }
    if !in_space(request.space, request.domain, prediction) {
        return reject(request, Some(prediction), FallbackReason::PredictionOutOfSpace);
    }
    if !request.space.is_valid(
        request.domain,
        &prediction.strategy,
        prediction.candidates_bin,
        prediction.minutes_bin,
        prediction.iterations_bin,
    ) {
        return reject(request, Some(prediction), FallbackReason::PredictionInvalid);
    }
    if prediction.strategy != request.baseline.strategy {
        return reject(request, Some(prediction), FallbackReason::SwarmMismatch);
    }
    if let Some(candidates) = prediction.candidates_bin
        && candidates > request.baseline.max_candidates
    {
        return reject(request, Some(prediction), FallbackReason::MaxCandidatesExceedsCap);
    }
    if let Some(minutes) = prediction.minutes_bin
        && u64::from(minutes) * 60 > request.baseline.timeout_cap_secs
    {
        return reject(request, Some(prediction), FallbackReason::TimeoutExceedsCap);
    }

    let action = recorded_action(request, prediction, false, None);
    // NA bins are never adopted; the baseline value stays.
    let plan = ExecutedPlan {
        schema_version: EXECUTED_PLAN_SCHEMA_VERSION.to_string(),
        strategy_executed: request.baseline.strategy.clone(),
        max_candidates_executed: prediction
            .candidates_bin
            .unwrap_or(request.baseline.max_candidates),
        timeout_seconds_executed: prediction
            .minutes_bin
            .map(|minutes| u64::from(minutes) * 60)
            .unwrap_or(request.baseline.timeout_cap_secs),
        max_iterations_executed: prediction
            .iterations_bin
            .unwrap_or(request.baseline.max_iterations),
        fallback_applied: false,
        fallback_reason: None,
    };
    (action, plan)
}

fn well_formed(prediction: &RawPrediction) -> bool {
    !prediction.strategy.trim().is_empty()
        && prediction.confidence.is_finite()
        && (0.0..=1.0).contains(&prediction.confidence)
}

fn in_space(space: &ActionSpace, domain: TaskDomain, prediction: &RawPrediction) -> bool {
    space
        .strategies_for(domain)
        .iter()
        .any(|name| *name == prediction.strategy)
        && space.bin_in_space(BinKind::Candidates, prediction.candidates_bin)
        && space.bin_in_space(BinKind::Minutes, prediction.minutes_bin)
        && space.bin_in_space(BinKind::Iterations, prediction.iterations_bin)
}

fn reject(
    request: &DecideRequest<'_>,
    prediction: Option<&RawPrediction>,
    reason: FallbackReason,
) -> (PlannerAction, ExecutedPlan) {
    let action = match prediction {
        Some(prediction) => recorded_action(request, prediction, true, Some(reason)),
        None => baseline_action(request, 0.0, true, Some(reason)),
    };
    let plan = baseline_plan(request.baseline, true, Some(reason));
    (action, plan)
}

/// Action carrying the predictor's values, whether adopted or rejected.
fn recorded_action(
    request: &DecideRequest<'_>,
    prediction: &RawPrediction,
    abstain: bool,
    reason: Option<FallbackReason>,
) -> PlannerAction {
    PlannerAction {
        schema_version: PLANNER_ACTION_SCHEMA_VERSION.to_string(),
        created_at: request.now.to_rfc3339(),
        strategy: prediction.strategy.clone(),
        budgets: Budgets {
            candidates_bin: prediction.candidates_bin,
            minutes_bin: prediction.minutes_bin,
            iterations_bin: prediction.iterations_bin,
        },
        confidence: recorded_confidence(prediction.confidence),
        abstain_to_default: abstain,
        reason: reason.map(|reason| reason.as_str().to_string()),
        model_ref: request
            .model_ref
            .clone()
            .unwrap_or_else(|| BASELINE_MODEL_REF.to_string()),
        input_hash: request.input_hash.clone(),
    }
}

/// Action synthesized from the baseline, bins mapped via the ladders.
fn baseline_action(
    request: &DecideRequest<'_>,
    confidence: f64,
    abstain: bool,
    reason: Option<FallbackReason>,
) -> PlannerAction {
    let baseline = request.baseline;
    let minutes = u32::try_from(baseline.timeout_cap_secs / 60).unwrap_or(u32::MAX);
    PlannerAction {
        schema_version: PLANNER_ACTION_SCHEMA_VERSION.to_string(),
        created_at: request.now.to_rfc3339(),
        strategy: baseline.strategy.clone(),
        budgets: Budgets {
            candidates_bin: nearest_bin(
                Some(baseline.max_candidates),
                request.space.bins_for(BinKind::Candidates),
            ),
            minutes_bin: nearest_bin(Some(minutes), request.space.bins_for(BinKind::Minutes)),
            iterations_bin: nearest_bin(
                Some(baseline.max_iterations),
                request.space.bins_for(BinKind::Iterations),
            ),
        },
        confidence,
        abstain_to_default: abstain,
        reason: reason.map(|reason| reason.as_str().to_string()),
        model_ref: BASELINE_MODEL_REF.to_string(),
        input_hash: request.input_hash.clone(),
    }
}

fn baseline_plan(
    baseline: &Baseline,
    fallback_applied: bool,
    fallback_reason: Option<FallbackReason>,
) -> ExecutedPlan {
    ExecutedPlan {
        schema_version: EXECUTED_PLAN_SCHEMA_VERSION.to_string(),
        strategy_executed: baseline.strategy.clone(),
        max_candidates_executed: baseline.max_candidates,
        timeout_seconds_executed: baseline.timeout_cap_secs,
        max_iterations_executed: baseline.max_iterations,
        fallback_applied,
        fallback_reason,
    }
}

/// Confidence recorded in documents must stay a finite number in [0, 1].
fn recorded_confidence(confidence: f64) -> f64 {
    if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{baseline, decide_request, prediction};

    fn space() -> ActionSpace {
        ActionSpace::default_space()
    }

    #[test]
    fn off_mode_is_baseline_without_fallback() {
        let space = space();
        let baseline = baseline();
        let request = decide_request(
            PlannerMode::Off,
            &space,
            &baseline,
            PredictionStatus::NotRequested,
        );
        let (action, plan) = resolve_decision(request);
        assert_eq!(action.model_ref, BASELINE_MODEL_REF);
        assert!(!plan.fallback_applied);
        assert_eq!(plan.fallback_reason, None);
        assert_eq!(action.reason.as_deref(), Some("planner_off"));
        assert_eq!(plan.max_candidates_executed, baseline.max_candidates);
    }

    #[test]
    fn log_mode_records_prediction_but_abstains() {
        let space = space();
        let baseline = baseline();
        let predicted = prediction("single_shot", Some(1), Some(15), None, 0.99);
        let request = decide_request(
            PlannerMode::Log,
            &space,
            &baseline,
            PredictionStatus::Received(predicted),
        );
        let (action, plan) = resolve_decision(request);
        assert!(plan.fallback_applied);
        assert_eq!(plan.fallback_reason, Some(FallbackReason::LogOnly));
        assert!(action.abstain_to_default);
        assert_eq!(action.reason.as_deref(), Some("log_only"));
        assert_eq!(action.budgets.candidates_bin, Some(1));
        assert_eq!(plan.timeout_seconds_executed, baseline.timeout_cap_secs);
    }

    #[test]
    fn log_mode_is_log_only_even_when_inference_fails() {
        let space = space();
        let baseline = baseline();
        let request = decide_request(
            PlannerMode::Log,
            &space,
            &baseline,
            PredictionStatus::Failed(PredictFailure::Inference("timeout".to_string())),
        );
        let (_, plan) = resolve_decision(request);
        assert_eq!(plan.fallback_reason, Some(FallbackReason::LogOnly));
    }

    #[test]
    fn enforce_adopts_a_valid_shrinking_prediction() {
        let space = space();
        let baseline = baseline();
        let predicted = prediction("single_shot", Some(1), Some(15), None, 0.9);
        let request = decide_request(
            PlannerMode::Enforce,
            &space,
            &baseline,
            PredictionStatus::Received(predicted),
        );
        let (action, plan) = resolve_decision(request);
        assert!(!plan.fallback_applied);
        assert_eq!(plan.max_candidates_executed, 1);
        assert_eq!(plan.timeout_seconds_executed, 900);
        assert_eq!(plan.max_iterations_executed, baseline.max_iterations);
        assert!(!action.abstain_to_default);
        assert_eq!(action.reason, None);
    }

    #[test]
    fn enforce_rejects_strategy_switch() {
        let space = space();
        let baseline = baseline();
        let predicted = prediction("iterative_refine", Some(1), Some(15), Some(4), 0.95);
        let request = decide_request(
            PlannerMode::Enforce,
            &space,
            &baseline,
            PredictionStatus::Received(predicted),
        );
        let (_, plan) = resolve_decision(request);
        assert!(plan.fallback_applied);
        assert_eq!(plan.fallback_reason, Some(FallbackReason::SwarmMismatch));
        assert_eq!(plan.max_candidates_executed, baseline.max_candidates);
        assert_eq!(plan.timeout_seconds_executed, baseline.timeout_cap_secs);
    }

    #[test]
    fn enforce_rejects_low_confidence_first() {
        let space = space();
        let baseline = baseline();
        // Also out of space, but confidence is checked first.
        let predicted = prediction("iterative_refine", Some(4), Some(15), None, 0.2);
        let request = decide_request(
            PlannerMode::Enforce,
            &space,
            &baseline,
            PredictionStatus::Received(predicted),
        );
        let (_, plan) = resolve_decision(request);
        assert_eq!(plan.fallback_reason, Some(FallbackReason::LowConfidence));
    }

    #[test]
    fn enforce_rejects_non_finite_confidence_as_malformed() {
        let space = space();
        let baseline = baseline();
        let predicted = prediction("single_shot", Some(1), Some(15), None, f64::NAN);
        let request = decide_request(
            PlannerMode::Enforce,
            &space,
            &baseline,
            PredictionStatus::Received(predicted),
        );
        let (action, plan) = resolve_decision(request);
        assert_eq!(
            plan.fallback_reason,
            Some(FallbackReason::MalformedPrediction)
        );
        assert_eq!(action.confidence, 0.0);
    }

    #[test]
    fn enforce_rejects_out_of_space_bins() {
        let space = space();
        let baseline = baseline();
        let predicted = prediction("single_shot", Some(1), Some(17), None, 0.9);
        let request = decide_request(
            PlannerMode::Enforce,
            &space,
            &baseline,
            PredictionStatus::Received(predicted),
        );
        let (_, plan) = resolve_decision(request);
        assert_eq!(
            plan.fallback_reason,
            Some(FallbackReason::PredictionOutOfSpace)
        );
    }

    #[test]
    fn enforce_rejects_invalid_combination() {
        let space = space();
        let mut baseline = baseline();
        baseline.strategy = "speculate_vote".to_string();
        // In space, but speculate_vote needs at least two candidates.
        let predicted = prediction("speculate_vote", Some(1), Some(15), None, 0.9);
        let request = decide_request(
            PlannerMode::Enforce,
            &space,
            &baseline,
            PredictionStatus::Received(predicted),
        );
        let (_, plan) = resolve_decision(request);
        assert_eq!(plan.fallback_reason, Some(FallbackReason::PredictionInvalid));
    }

    #[test]
    fn enforce_rejects_candidates_above_cap() {
        let space = space();
        let mut baseline = baseline();
        baseline.strategy = "speculate_vote".to_string();
        baseline.max_candidates = 2;
        let predicted = prediction("speculate_vote", Some(3), Some(15), None, 0.9);
        let request = decide_request(
            PlannerMode::Enforce,
            &space,
            &baseline,
            PredictionStatus::Received(predicted),
        );
        let (_, plan) = resolve_decision(request);
        assert_eq!(
            plan.fallback_reason,
            Some(FallbackReason::MaxCandidatesExceedsCap)
        );
        assert_eq!(plan.max_candidates_executed, 2);
    }

    #[test]
    fn enforce_rejects_timeout_above_cap() {
        let space = space();
        let mut baseline = baseline();
        baseline.timeout_cap_secs = 600;
        let predicted = prediction("single_shot", Some(1), Some(15), None, 0.9);
        let request = decide_request(
            PlannerMode::Enforce,
            &space,
            &baseline,
            PredictionStatus::Received(predicted),
        );
        let (_, plan) = resolve_decision(request);
        assert_eq!(plan.fallback_reason, Some(FallbackReason::TimeoutExceedsCap));
        assert_eq!(plan.timeout_seconds_executed, 600);
    }

    #[test]
    fn enforce_treats_unavailable_and_failed_distinctly() {
        let space = space();
        let baseline = baseline();
        let (_, plan) = resolve_decision(decide_request(
            PlannerMode::Enforce,
            &space,
            &baseline,
            PredictionStatus::Unavailable("missing bundle".to_string()),
        ));
        assert_eq!(plan.fallback_reason, Some(FallbackReason::ModelUnavailable));

        let (_, plan) = resolve_decision(decide_request(
            PlannerMode::Enforce,
            &space,
            &baseline,
            PredictionStatus::Failed(PredictFailure::Inference("killed".to_string())),
        ));
        assert_eq!(plan.fallback_reason, Some(FallbackReason::InferenceFailed));

        let (_, plan) = resolve_decision(decide_request(
            PlannerMode::Enforce,
            &space,
            &baseline,
            PredictionStatus::Failed(PredictFailure::Malformed("not json".to_string())),
        ));
        assert_eq!(
            plan.fallback_reason,
            Some(FallbackReason::MalformedPrediction)
        );
    }

    #[test]
    fn na_bins_keep_baseline_values() {
        let space = space();
        let baseline = baseline();
        let predicted = prediction("single_shot", None, None, None, 0.9);
        let request = decide_request(
            PlannerMode::Enforce,
            &space,
            &baseline,
            PredictionStatus::Received(predicted),
        );
        let (_, plan) = resolve_decision(request);
        assert!(!plan.fallback_applied);
        assert_eq!(plan.max_candidates_executed, baseline.max_candidates);
        assert_eq!(plan.timeout_seconds_executed, baseline.timeout_cap_secs);
        assert_eq!(plan.max_iterations_executed, baseline.max_iterations);
    }

    #[test]
    fn executed_budgets_never_exceed_baseline_caps() {
        let space = space();
        let baseline = baseline();
        let predictions = [
            prediction("single_shot", Some(1), Some(5), None, 0.9),
            prediction("single_shot", Some(5), Some(120), None, 0.9),
            prediction("iterative_refine", Some(1), Some(30), Some(8), 0.9),
            prediction("single_shot", None, None, None, 0.1),
            prediction("", None, None, None, f64::INFINITY),
        ];
        for predicted in predictions {
            let request = decide_request(
                PlannerMode::Enforce,
                &space,
                &baseline,
                PredictionStatus::Received(predicted),
            );
            let (_, plan) = resolve_decision(request);
            assert!(plan.max_candidates_executed <= baseline.max_candidates);
            assert!(plan.timeout_seconds_executed <= baseline.timeout_cap_secs);
        }
    }
}
