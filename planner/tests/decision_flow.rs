//! End-to-end decision flow: build, decide, persist, and re-validate.

use std::sync::Arc;

use planner::core::decide::{FallbackReason, PlannerMode};
use planner::decide::{DecisionRequest, run_decision};
use planner::io::bundle::{load_bundle, write_bundle};
use planner::io::config::PlannerConfig;
use planner::predictor::PredictorCell;
use planner::core::types::{JobKind, SystemState, UniverseDefaults};
use planner::test_support::{FakePredictor, baseline, fixed_now, prediction, task_context};

fn enforce_config() -> PlannerConfig {
    let mut config = PlannerConfig::default();
    config.mode = PlannerMode::Enforce;
    config
}

fn request<'a>(
    task: &'a planner::core::types::TaskContext,
    baseline: &'a planner::core::decide::Baseline,
) -> DecisionRequest<'a> {
    DecisionRequest {
        task,
        job_kind: JobKind::CodeFix,
        universe_id: "universe-e2e",
        universe_defaults: UniverseDefaults {
            default_strategy: baseline.strategy.clone(),
            default_objective: "ship".to_string(),
        },
        baseline,
        system_state: SystemState {
            queue_depth: 3,
            running_jobs: 1,
            available_toolchains: vec!["codex".to_string()],
        },
        world_id: None,
        objective_id: None,
    }
}

#[test]
fn adopted_decision_round_trips_through_the_audit_bundle() {
    let config = enforce_config();
    let task = task_context("task-e2e");
    let baseline = baseline();
    let cell = PredictorCell::preloaded(Arc::new(FakePredictor::returning(prediction(
        "single_shot",
        Some(1),
        Some(15),
        None,
        0.9,
    ))));

    let bundle = run_decision(&config, &request(&task, &baseline), &cell, fixed_now())
        .expect("decision");
    assert!(!bundle.plan.fallback_applied);
    assert_eq!(bundle.plan.max_candidates_executed, 1);
    assert_eq!(bundle.plan.timeout_seconds_executed, 900);

    let temp = tempfile::tempdir().expect("tempdir");
    let paths = write_bundle(&temp.path().join("bundle"), &bundle).expect("write bundle");
    let loaded = load_bundle(&paths.dir).expect("load bundle");
    assert_eq!(loaded, bundle);
}

#[test]
fn rejected_decision_still_produces_a_schema_valid_bundle() {
    let config = enforce_config();
    let task = task_context("task-e2e");
    let baseline = baseline();
    let cell = PredictorCell::preloaded(Arc::new(FakePredictor::returning(prediction(
        "iterative_refine",
        Some(1),
        Some(15),
        Some(4),
        0.95,
    ))));

    let bundle = run_decision(&config, &request(&task, &baseline), &cell, fixed_now())
        .expect("decision");
    assert!(bundle.plan.fallback_applied);
    assert_eq!(bundle.plan.fallback_reason, Some(FallbackReason::SwarmMismatch));
    assert_eq!(bundle.plan.max_candidates_executed, baseline.max_candidates);

    let temp = tempfile::tempdir().expect("tempdir");
    write_bundle(&temp.path().join("bundle"), &bundle).expect("rejected bundle still validates");
}

#[test]
fn identical_requests_produce_identical_hashes_and_encodings() {
    let config = enforce_config();
    let task = task_context("task-e2e");
    let baseline = baseline();

    let first = run_decision(
        &config,
        &request(&task, &baseline),
        &PredictorCell::preloaded(Arc::new(FakePredictor::returning(prediction(
            "single_shot",
            Some(1),
            Some(15),
            None,
            0.9,
        )))),
        fixed_now(),
    )
    .expect("decision");
    let second = run_decision(
        &config,
        &request(&task, &baseline),
        &PredictorCell::preloaded(Arc::new(FakePredictor::returning(prediction(
            "single_shot",
            Some(1),
            Some(15),
            None,
            0.9,
        )))),
        fixed_now(),
    )
    .expect("decision");

    assert_eq!(first.input, second.input);
    assert_eq!(first.action.input_hash, second.action.input_hash);
    let limits = config.token_limits();
    assert_eq!(
        planner::core::tokenizer::encode(&first.input, &limits),
        planner::core::tokenizer::encode(&second.input, &limits)
    );
}
