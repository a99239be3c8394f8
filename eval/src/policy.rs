//! Selection policies scored against the oracle.

use std::sync::Arc;

use tracing::warn;

use planner::core::tokenizer::{TokenLimits, encode};
use planner::predictor::Predictor;

use crate::dataset::{CandidateRun, EvalExample};

/// How a candidate is chosen per example.
pub enum SelectionPolicy {
    /// Static baseline: the first recorded candidate.
    Baseline,
    /// Learned policy: the predictor's action, when a recorded candidate
    /// matches it.
    Model {
        predictor: Arc<dyn Predictor>,
        limits: TokenLimits,
    },
}

impl std::fmt::Debug for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectionPolicy::Baseline => f.write_str("Baseline"),
            SelectionPolicy::Model { limits, .. } => f
                .debug_struct("Model")
                .field("limits", limits)
                .finish_non_exhaustive(),
        }
    }
}

impl SelectionPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            SelectionPolicy::Baseline => "baseline",
            SelectionPolicy::Model { .. } => "model",
        }
    }

    /// The chosen candidate, or `None` when the policy's action is not
    /// reachable among the recorded candidates.
    pub fn choose<'a>(&self, example: &'a EvalExample) -> Option<&'a CandidateRun> {
        match self {
            SelectionPolicy::Baseline => example.candidates.first(),
            SelectionPolicy::Model { predictor, limits } => {
                let tokens = encode(&example.planner_input, limits);
                match predictor.predict(&tokens) {
                    Ok(prediction) => example
                        .candidates
                        .iter()
                        .find(|candidate| candidate.action.matches_prediction(&prediction)),
                    Err(failure) => {
                        warn!(example_id = %example.example_id, ?failure, "prediction failed; selection undefined");
                        None
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{candidate, example};
    use planner::core::decide::{PredictFailure, RawPrediction};
    use planner::test_support::{FakePredictor, prediction};

    fn model(prediction_result: Result<RawPrediction, PredictFailure>) -> SelectionPolicy {
        let predictor: Arc<dyn Predictor> = match prediction_result {
            Ok(prediction) => Arc::new(FakePredictor::returning(prediction)),
            Err(failure) => Arc::new(FakePredictor::failing(failure)),
        };
        SelectionPolicy::Model {
            predictor,
            limits: TokenLimits::default(),
        }
    }

    #[test]
    fn baseline_picks_the_first_candidate() {
        let row = example(
            "ex-1",
            vec![candidate(false, 10.0, 1.0), candidate(true, 5.0, 1.0)],
        );
        let chosen = SelectionPolicy::Baseline.choose(&row).expect("chosen");
        assert!(!chosen.verified);
    }

    #[test]
    fn model_picks_the_matching_candidate() {
        let mut fast = candidate(true, 5.0, 1.0);
        fast.action.candidates_bin = Some(2);
        let row = example("ex-1", vec![candidate(false, 10.0, 1.0), fast]);
        let policy = model(Ok(prediction("single_shot", Some(2), Some(15), None, 0.9)));
        let chosen = policy.choose(&row).expect("chosen");
        assert_eq!(chosen.action.candidates_bin, Some(2));
    }

    #[test]
    fn unreachable_prediction_leaves_selection_undefined() {
        let row = example("ex-1", vec![candidate(true, 5.0, 1.0)]);
        let policy = model(Ok(prediction("speculate_vote", Some(3), Some(30), None, 0.9)));
        assert!(policy.choose(&row).is_none());
    }

    #[test]
    fn prediction_failure_leaves_selection_undefined() {
        let row = example("ex-1", vec![candidate(true, 5.0, 1.0)]);
        let policy = model(Err(PredictFailure::Inference("down".to_string())));
        assert!(policy.choose(&row).is_none());
    }
}
