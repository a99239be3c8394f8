//! Labeled dataset of historical multi-candidate runs.
//!
//! One JSON Lines file, one example per line. Each example carries the
//! recorded planner input and every candidate execution observed for the
//! same task. Malformed datasets fail fast; this tool runs offline.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use planner::core::decide::RawPrediction;
use planner::core::planner_input::PlannerInput;

/// One labeled example: a recorded input plus its candidate executions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalExample {
    pub example_id: String,
    pub planner_input: PlannerInput,
    pub candidates: Vec<CandidateRun>,
}

/// One candidate execution and its measured outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateRun {
    pub action: ActionTuple,
    pub verified: bool,
    pub duration_secs: f64,
    pub cost: f64,
}

/// The discrete 4-tuple an action is compared by.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionTuple {
    pub strategy: String,
    #[serde(default)]
    pub candidates_bin: Option<u32>,
    #[serde(default)]
    pub minutes_bin: Option<u32>,
    #[serde(default)]
    pub iterations_bin: Option<u32>,
}

impl ActionTuple {
    /// Serialized form used as the final deterministic tie-break.
    pub fn sort_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.strategy,
            bin_key(self.candidates_bin),
            bin_key(self.minutes_bin),
            bin_key(self.iterations_bin)
        )
    }

    pub fn matches_prediction(&self, prediction: &RawPrediction) -> bool {
        self.strategy == prediction.strategy
            && self.candidates_bin == prediction.candidates_bin
            && self.minutes_bin == prediction.minutes_bin
            && self.iterations_bin == prediction.iterations_bin
    }
}

fn bin_key(bin: Option<u32>) -> String {
    match bin {
        Some(value) => value.to_string(),
        None => "na".to_string(),
    }
}

/// Load and validate a JSONL dataset.
pub fn load_dataset(path: &Path) -> Result<Vec<EvalExample>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read dataset {}", path.display()))?;
    let mut examples = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let example: EvalExample = serde_json::from_str(line)
            .with_context(|| format!("parse dataset line {}", index + 1))?;
        example
            .validate()
            .with_context(|| format!("validate dataset line {}", index + 1))?;
        examples.push(example);
    }
    if examples.is_empty() {
        bail!("dataset {} has no examples", path.display());
    }
    Ok(examples)
}

impl EvalExample {
    fn validate(&self) -> Result<()> {
        if self.example_id.trim().is_empty() {
            bail!("example_id must be non-empty");
        }
        if self.candidates.is_empty() {
            bail!("candidates must be non-empty");
        }
        for (index, candidate) in self.candidates.iter().enumerate() {
            if candidate.action.strategy.trim().is_empty() {
                bail!("candidates[{index}].action.strategy must be non-empty");
            }
            if !candidate.duration_secs.is_finite() || candidate.duration_secs < 0.0 {
                bail!("candidates[{index}].duration_secs must be finite and >= 0");
            }
            if !candidate.cost.is_finite() || candidate.cost < 0.0 {
                bail!("candidates[{index}].cost must be finite and >= 0");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{candidate, example};
    use std::fs;

    #[test]
    fn sort_key_spells_out_na_bins() {
        let action = ActionTuple {
            strategy: "single_shot".to_string(),
            candidates_bin: Some(1),
            minutes_bin: None,
            iterations_bin: None,
        };
        assert_eq!(action.sort_key(), "single_shot|1|na|na");
    }

    #[test]
    fn loads_a_jsonl_dataset() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("dataset.jsonl");
        let row = example("ex-1", vec![candidate(true, 10.0, 1.0)]);
        let mut contents = serde_json::to_string(&row).expect("serialize");
        contents.push('\n');
        contents.push('\n');
        fs::write(&path, contents).expect("write");

        let examples = load_dataset(&path).expect("load");
        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].example_id, "ex-1");
    }

    #[test]
    fn rejects_examples_without_candidates() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("dataset.jsonl");
        let row = example("ex-1", Vec::new());
        fs::write(&path, serde_json::to_string(&row).expect("serialize")).expect("write");
        let err = load_dataset(&path).expect_err("empty candidates");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn rejects_non_finite_durations() {
        let row = example("ex-1", vec![candidate(true, f64::NAN, 1.0)]);
        assert!(row.validate().is_err());
    }
}
