//! Orchestration of one decision: wiring history sources, the input builder,
//! the memoized predictor, and the decision engine into an auditable bundle.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::core::decide::{
    Baseline, DecideRequest, DecisionBundle, PlannerMode, PredictionStatus, resolve_decision,
};
use crate::core::planner_input::{BuildInput, build_planner_input};
use crate::core::tokenizer::encode;
use crate::core::types::{JobKind, SystemState, TaskContext, UniverseDefaults};
use crate::io::config::PlannerConfig;
use crate::io::history_store::load_history_sources;
use crate::predictor::PredictorCell;

/// One decision request, as handed over by the dispatcher.
#[derive(Debug)]
pub struct DecisionRequest<'a> {
    pub task: &'a TaskContext,
    pub job_kind: JobKind,
    pub universe_id: &'a str,
    pub universe_defaults: UniverseDefaults,
    pub baseline: &'a Baseline,
    pub system_state: SystemState,
    pub world_id: Option<String>,
    pub objective_id: Option<String>,
}

/// Run one decision end-to-end.
///
/// The only error paths here are configuration problems; predictor and
/// history failures resolve into the bundle's fallback fields instead.
#[instrument(skip_all, fields(task_id = %request.task.id, job_kind = ?request.job_kind))]
pub fn run_decision(
    config: &PlannerConfig,
    request: &DecisionRequest<'_>,
    predictor: &PredictorCell,
    now: DateTime<Utc>,
) -> Result<DecisionBundle> {
    let space = config
        .build_action_space()
        .context("build action space from config")?;

    let history = load_history_sources(
        config.history.archived_runs_dir.as_deref(),
        config.history.world_runs_dir.as_deref(),
    );
    debug!(candidates = history.len(), "history candidates gathered");

    let input = build_planner_input(BuildInput {
        task: request.task,
        job_kind: request.job_kind,
        universe_id: request.universe_id,
        universe_defaults: request.universe_defaults.clone(),
        action_space: &space,
        history,
        system_state: request.system_state.clone(),
        world_id: request.world_id.clone(),
        objective_id: request.objective_id.clone(),
        now,
    });
    let input_hash = input.content_hash().context("hash planner input")?;

    let (prediction, model_ref) = match config.mode {
        PlannerMode::Off => (PredictionStatus::NotRequested, None),
        PlannerMode::Log | PlannerMode::Enforce => {
            let tokens = encode(&input, &config.token_limits());
            match predictor.get_or_load(config.model.bundle_dir.as_deref()) {
                Err(error) => (PredictionStatus::Unavailable(error), None),
                Ok(model) => {
                    let model_ref = model.model_ref().to_string();
                    match model.predict(&tokens) {
                        Ok(raw) => (PredictionStatus::Received(raw), Some(model_ref)),
                        Err(failure) => {
                            warn!(model_ref = %model_ref, ?failure, "prediction failed");
                            (PredictionStatus::Failed(failure), Some(model_ref))
                        }
                    }
                }
            }
        }
    };

    let (action, plan) = resolve_decision(DecideRequest {
        mode: config.mode,
        space: &space,
        domain: request.job_kind.domain(),
        baseline: request.baseline,
        confidence_threshold: config.confidence_threshold,
        prediction,
        model_ref,
        input_hash,
        now,
    });

    info!(
        strategy = %plan.strategy_executed,
        max_candidates = plan.max_candidates_executed,
        timeout_secs = plan.timeout_seconds_executed,
        fallback = plan.fallback_applied,
        reason = ?plan.fallback_reason,
        "decision resolved"
    );

    Ok(DecisionBundle {
        input,
        action,
        plan,
    })
}
