//! Metric accumulation as a pure fold over the dataset.
//!
//! Rows are scored independently (safe to parallelize); the per-row oracle
//! and regret computation stays single-threaded to preserve the
//! deterministic tie-break order. Accumulators are local fold state, not
//! module-level counters.

use serde::{Deserialize, Serialize};

use crate::dataset::{CandidateRun, EvalExample};
use crate::oracle::{fail_penalty, oracle_candidate};
use crate::policy::SelectionPolicy;

/// Scored outcome of one example under one policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RowScore {
    pub selected: bool,
    pub passed: bool,
    pub selected_duration: Option<f64>,
    pub selected_cost: Option<f64>,
    /// Defined only when both oracle and chosen actions are defined tuples.
    pub oracle_match: Option<bool>,
    /// Defined only when the oracle passed.
    pub regret: Option<f64>,
}

/// Score one example: oracle, selection, match, and regret.
pub fn score_example(example: &EvalExample, chosen: Option<&CandidateRun>) -> RowScore {
    let oracle = oracle_candidate(&example.candidates);

    let oracle_match = match (oracle, chosen) {
        (Some(oracle), Some(chosen)) => Some(oracle.action == chosen.action),
        _ => None,
    };

    let regret = oracle.filter(|oracle| oracle.verified).map(|oracle| {
        let effective = match chosen {
            Some(chosen) if chosen.verified => chosen.duration_secs,
            // Failing or undefined selections always cost more than any
            // observed passing duration.
            _ => fail_penalty(&example.candidates),
        };
        effective - oracle.duration_secs
    });

    RowScore {
        selected: chosen.is_some(),
        passed: chosen.is_some_and(|chosen| chosen.verified),
        selected_duration: chosen.map(|chosen| chosen.duration_secs),
        selected_cost: chosen.map(|chosen| chosen.cost),
        oracle_match,
        regret,
    }
}

/// Fold state for the metric reduction.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Accumulator {
    examples: usize,
    selections: usize,
    passes: usize,
    pass_duration_total: f64,
    selection_duration_total: f64,
    selection_cost_total: f64,
    oracle_comparable: usize,
    oracle_matches: usize,
    regret_examples: usize,
    regret_total: f64,
}

impl Accumulator {
    pub fn fold(mut self, row: &RowScore) -> Self {
        self.examples += 1;
        if row.selected {
            self.selections += 1;
        }
        if let Some(duration) = row.selected_duration {
            self.selection_duration_total += duration;
        }
        if let Some(cost) = row.selected_cost {
            self.selection_cost_total += cost;
        }
        if row.passed {
            self.passes += 1;
            if let Some(duration) = row.selected_duration {
                self.pass_duration_total += duration;
            }
        }
        if let Some(matched) = row.oracle_match {
            self.oracle_comparable += 1;
            if matched {
                self.oracle_matches += 1;
            }
        }
        if let Some(regret) = row.regret {
            self.regret_examples += 1;
            self.regret_total += regret;
        }
        self
    }

    pub fn finalize(self) -> EvalMetrics {
        let ratio = |numer: f64, denom: usize| (denom > 0).then(|| numer / denom as f64);
        EvalMetrics {
            examples: self.examples,
            selections: self.selections,
            passes: self.passes,
            pass_rate: if self.examples > 0 {
                self.passes as f64 / self.examples as f64
            } else {
                0.0
            },
            mean_time_to_pass: ratio(self.pass_duration_total, self.passes),
            duration_per_pass: ratio(self.selection_duration_total, self.passes),
            cost_per_pass: ratio(self.selection_cost_total, self.passes),
            oracle_comparable: self.oracle_comparable,
            oracle_matches: self.oracle_matches,
            oracle_match_rate: (self.oracle_comparable > 0)
                .then(|| self.oracle_matches as f64 / self.oracle_comparable as f64),
            regret_examples: self.regret_examples,
            mean_regret: ratio(self.regret_total, self.regret_examples),
        }
    }
}

/// Final metrics for one policy over one dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalMetrics {
    pub examples: usize,
    pub selections: usize,
    pub passes: usize,
    pub pass_rate: f64,
    pub mean_time_to_pass: Option<f64>,
    pub duration_per_pass: Option<f64>,
    pub cost_per_pass: Option<f64>,
    pub oracle_comparable: usize,
    pub oracle_matches: usize,
    pub oracle_match_rate: Option<f64>,
    pub regret_examples: usize,
    pub mean_regret: Option<f64>,
}

/// Score a policy across the dataset with a pure reduction.
pub fn evaluate(examples: &[EvalExample], policy: &SelectionPolicy) -> EvalMetrics {
    examples
        .iter()
        .map(|example| score_example(example, policy.choose(example)))
        .fold(Accumulator::default(), |acc, row| acc.fold(&row))
        .finalize()
}
