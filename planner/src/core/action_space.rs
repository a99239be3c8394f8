//! Per-domain action space: strategies, resource-budget bin ladders, and the
//! combinatorial validity predicate.
//!
//! The action space is built once from configuration and never mutated. All
//! functions here are pure so the decision engine and the tokenizer can rely
//! on identical answers for identical inputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::types::TaskDomain;

/// The three discretized resource budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinKind {
    Candidates,
    Minutes,
    Iterations,
}

/// Immutable per-deployment action space.
///
/// Bins are positive integers; the "not applicable" sentinel is represented
/// as `None` wherever a bin value travels (`Option<u32>`) and is a member of
/// every ladder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpace {
    strategies: BTreeMap<TaskDomain, Vec<String>>,
    candidates_bins: Vec<u32>,
    minutes_bins: Vec<u32>,
    iterations_bins: Vec<u32>,
}

/// Serializable snapshot embedded in the planner input document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionSpaceSnapshot {
    pub strategies: BTreeMap<String, Vec<String>>,
    pub candidates_bins: Vec<u32>,
    pub minutes_bins: Vec<u32>,
    pub iterations_bins: Vec<u32>,
}

impl ActionSpace {
    /// Build an action space from ladders and per-domain strategy sets.
    ///
    /// Ladders must be non-empty, strictly increasing, and positive; strategy
    /// sets must be non-empty. Violations are configuration errors and are
    /// rejected before any decision runs.
    pub fn new(
        strategies: BTreeMap<TaskDomain, Vec<String>>,
        candidates_bins: Vec<u32>,
        minutes_bins: Vec<u32>,
        iterations_bins: Vec<u32>,
    ) -> anyhow::Result<Self> {
        for (domain, set) in &strategies {
            if set.is_empty() {
                anyhow::bail!("no strategies configured for domain {}", domain.as_str());
            }
        }
        validate_ladder("candidates_bins", &candidates_bins)?;
        validate_ladder("minutes_bins", &minutes_bins)?;
        validate_ladder("iterations_bins", &iterations_bins)?;
        Ok(Self {
            strategies,
            candidates_bins,
            minutes_bins,
            iterations_bins,
        })
    }

    /// Default deployment action space.
    pub fn default_space() -> Self {
        let mut strategies = BTreeMap::new();
        strategies.insert(
            TaskDomain::Code,
            vec![
                "single_shot".to_string(),
                "speculate_vote".to_string(),
                "iterative_refine".to_string(),
            ],
        );
        strategies.insert(
            TaskDomain::Asset,
            vec!["single_shot".to_string(), "iterative_refine".to_string()],
        );
        Self {
            strategies,
            candidates_bins: vec![1, 2, 3, 5],
            minutes_bins: vec![5, 15, 30, 60, 120],
            iterations_bins: vec![1, 2, 4, 8],
        }
    }

    /// Ordered bin ladder for a budget kind (NA sentinel implicit).
    pub fn bins_for(&self, kind: BinKind) -> &[u32] {
        match kind {
            BinKind::Candidates => &self.candidates_bins,
            BinKind::Minutes => &self.minutes_bins,
            BinKind::Iterations => &self.iterations_bins,
        }
    }

    /// Strategy identifiers valid in a domain, in configured order.
    pub fn strategies_for(&self, domain: TaskDomain) -> &[String] {
        self.strategies
            .get(&domain)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All strategy identifiers across domains, sorted and deduplicated.
    pub fn all_strategies(&self) -> Vec<String> {
        let mut all: Vec<String> = self.strategies.values().flatten().cloned().collect();
        all.sort();
        all.dedup();
        all
    }

    /// Whether a bin value is a member of the ladder (NA always is).
    pub fn bin_in_space(&self, kind: BinKind, bin: Option<u32>) -> bool {
        match bin {
            None => true,
            Some(value) => self.bins_for(kind).contains(&value),
        }
    }

    /// Combinatorial validity of a full 4-tuple within a domain.
    ///
    /// Membership of each component is required; on top of that the strategy
    /// constrains which budgets make sense:
    /// - `single_shot`: one candidate (or NA), one iteration (or NA)
    /// - `speculate_vote`: at least two candidates, one iteration (or NA)
    /// - `iterative_refine`: one candidate (or NA), at least two iterations
    ///
    /// Strategies configured beyond these accept any in-ladder combination.
    pub fn is_valid(
        &self,
        domain: TaskDomain,
        strategy: &str,
        candidates_bin: Option<u32>,
        minutes_bin: Option<u32>,
        iterations_bin: Option<u32>,
    ) -> bool {
        if !self
            .strategies_for(domain)
            .iter()
            .any(|name| name == strategy)
        {
            return false;
        }
        if !self.bin_in_space(BinKind::Candidates, candidates_bin)
            || !self.bin_in_space(BinKind::Minutes, minutes_bin)
            || !self.bin_in_space(BinKind::Iterations, iterations_bin)
        {
            return false;
        }
        match strategy {
            "single_shot" => {
                matches!(candidates_bin, None | Some(1)) && matches!(iterations_bin, None | Some(1))
            }
            "speculate_vote" => {
                matches!(candidates_bin, Some(value) if value >= 2)
                    && matches!(iterations_bin, None | Some(1))
            }
            "iterative_refine" => {
                matches!(candidates_bin, None | Some(1))
                    && matches!(iterations_bin, Some(value) if value >= 2)
            }
            _ => true,
        }
    }

    /// Snapshot for embedding in the planner input document.
    pub fn snapshot(&self) -> ActionSpaceSnapshot {
        let strategies = self
            .strategies
            .iter()
            .map(|(domain, set)| (domain.as_str().to_string(), set.clone()))
            .collect();
        ActionSpaceSnapshot {
            strategies,
            candidates_bins: self.candidates_bins.clone(),
            minutes_bins: self.minutes_bins.clone(),
            iterations_bins: self.iterations_bins.clone(),
        }
    }
}

/// Map a raw integer onto the nearest configured bin.
///
/// Nearest by absolute difference, ties broken toward the smaller bin.
/// `None` maps to the NA sentinel.
pub fn nearest_bin(raw: Option<u32>, ladder: &[u32]) -> Option<u32> {
    let raw = raw?;
    let mut best: Option<u32> = None;
    for &bin in ladder {
        let distance = bin.abs_diff(raw);
        match best {
            None => best = Some(bin),
            Some(current) => {
                let current_distance = current.abs_diff(raw);
                if distance < current_distance || (distance == current_distance && bin < current) {
                    best = Some(bin);
                }
            }
        }
    }
    best
}

fn validate_ladder(name: &str, ladder: &[u32]) -> anyhow::Result<()> {
    if ladder.is_empty() {
        anyhow::bail!("{name} must be non-empty");
    }
    if ladder.contains(&0) {
        anyhow::bail!("{name} bins must be positive");
    }
    if ladder.windows(2).any(|pair| pair[0] >= pair[1]) {
        anyhow::bail!("{name} must be strictly increasing");
    }
    Ok(())
}
