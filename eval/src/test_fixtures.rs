//! Test-only fixtures for dataset rows.

use planner::core::planner_input::{PlannerInput, build_planner_input};
use planner::test_support::{build_input, task_context};

use crate::dataset::{ActionTuple, CandidateRun, EvalExample};

/// Deterministic recorded planner input.
pub fn planner_input() -> PlannerInput {
    let task = task_context("task-eval");
    build_planner_input(build_input(&task, Vec::new()))
}

/// Candidate with the default `single_shot` action tuple.
pub fn candidate(verified: bool, duration_secs: f64, cost: f64) -> CandidateRun {
    CandidateRun {
        action: ActionTuple {
            strategy: "single_shot".to_string(),
            candidates_bin: Some(1),
            minutes_bin: Some(15),
            iterations_bin: None,
        },
        verified,
        duration_secs,
        cost,
    }
}

pub fn example(example_id: &str, candidates: Vec<CandidateRun>) -> EvalExample {
    EvalExample {
        example_id: example_id.to_string(),
        planner_input: planner_input(),
        candidates,
    }
}
