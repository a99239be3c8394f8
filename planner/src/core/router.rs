//! Toolchain routing: static rule matching blended with empirical success
//! rates from the historical transition store.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::core::types::{JobKind, Risk, TaskDomain};

/// Neutral estimate used when a candidate has no historical data.
pub const NEUTRAL_PROBABILITY: f64 = 0.5;

/// One externally configured match-then-use routing rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoutingRule {
    /// Job kinds this rule applies to; empty matches all.
    pub job_kinds: Vec<JobKind>,
    /// Any-of tag match; empty matches all.
    pub tags_any: Vec<String>,
    pub toolchains: Vec<String>,
    /// Appended after `toolchains` when the rule matches.
    pub fallback: Vec<String>,
    pub speculate: bool,
    pub parallelism: u32,
}

impl Default for RoutingRule {
    fn default() -> Self {
        Self {
            job_kinds: Vec::new(),
            tags_any: Vec::new(),
            toolchains: Vec::new(),
            fallback: Vec::new(),
            speculate: false,
            parallelism: 1,
        }
    }
}

/// Features describing the current routing decision.
#[derive(Debug, Clone)]
pub struct RouteFeatures {
    pub risk: Risk,
    pub tags: Vec<String>,
}

impl Default for RouteFeatures {
    fn default() -> Self {
        Self {
            risk: Risk::Medium,
            tags: Vec::new(),
        }
    }
}

/// Read-only view of the historical transition store.
///
/// Implementations read eventually-consistent snapshots and must never
/// block writers; `None` means no usable estimate.
pub trait TransitionEstimates {
    fn success_probability(
        &self,
        toolchain: &str,
        domain: TaskDomain,
        job_kind: JobKind,
        features: &RouteFeatures,
    ) -> Option<f64>;
}

/// A candidate with its blended score, highest first after ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedToolchain {
    pub toolchain: String,
    pub score: f64,
    /// Empirical estimate that went into the blend, if any.
    pub empirical: Option<f64>,
}

/// Resolve the candidate list: first matching rule (toolchains + fallback),
/// otherwise the global priority list. Duplicates keep their first position.
pub fn candidate_toolchains<'a>(
    rules: &'a [RoutingRule],
    priority: &[String],
    job_kind: JobKind,
    tags: &[String],
) -> (Vec<String>, Option<&'a RoutingRule>) {
    let matched = rules.iter().find(|rule| rule_matches(rule, job_kind, tags));
    let raw: Vec<String> = match matched {
        Some(rule) => rule
            .toolchains
            .iter()
            .chain(rule.fallback.iter())
            .cloned()
            .collect(),
        None => priority.to_vec(),
    };
    let mut seen = Vec::new();
    for toolchain in raw {
        if !seen.contains(&toolchain) {
            seen.push(toolchain);
        }
    }
    (seen, matched)
}

fn rule_matches(rule: &RoutingRule, job_kind: JobKind, tags: &[String]) -> bool {
    let kind_ok = rule.job_kinds.is_empty() || rule.job_kinds.contains(&job_kind);
    let tags_ok = rule.tags_any.is_empty() || rule.tags_any.iter().any(|tag| tags.contains(tag));
    kind_ok && tags_ok
}

/// Order candidates by blending static priority with empirical success.
///
/// Static score is normalized list position (first = 1.0, descending).
/// With a store, `combined = (1 - weight) * static + weight * empirical`,
/// where a candidate without data gets [`NEUTRAL_PROBABILITY`]. Without a
/// store the ordering is purely static. Ties keep the static order.
pub fn order_toolchains(
    candidates: &[String],
    domain: TaskDomain,
    job_kind: JobKind,
    features: &RouteFeatures,
    store: Option<&dyn TransitionEstimates>,
    weight: f64,
) -> Vec<RankedToolchain> {
    let total = candidates.len();
    if total == 0 {
        return Vec::new();
    }
    let weight = weight.clamp(0.0, 1.0);

    let mut ranked: Vec<RankedToolchain> = candidates
        .iter()
        .enumerate()
        .map(|(index, toolchain)| {
            let static_score = (total - index) as f64 / total as f64;
            let empirical = store.and_then(|store| {
                store.success_probability(toolchain, domain, job_kind, features)
            });
            let score = match store {
                Some(_) => {
                    let observed = empirical.unwrap_or(NEUTRAL_PROBABILITY);
                    (1.0 - weight) * static_score + weight * observed
                }
                None => static_score,
            };
            RankedToolchain {
                toolchain: toolchain.clone(),
                score,
                empirical,
            }
        })
        .collect();

    // Stable sort keeps the static order for equal scores.
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    ranked
}
