//! Planner configuration stored as TOML.
//!
//! Configuration errors are fatal at startup, never at decision time: the
//! loader validates everything before the first decision runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::action_space::ActionSpace;
use crate::core::decide::PlannerMode;
use crate::core::router::RoutingRule;
use crate::core::tokenizer::TokenLimits;
use crate::core::types::TaskDomain;

/// Planner configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlannerConfig {
    /// Run mode: `off`, `log`, or `enforce`.
    pub mode: PlannerMode,

    /// Minimum predicted confidence for a prediction to become binding.
    pub confidence_threshold: f64,

    pub model: ModelConfig,
    pub limits: LimitsConfig,
    pub history: HistoryConfig,
    pub routing: RoutingConfig,
    pub action_space: ActionSpaceConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory holding `manifest.toml`; absent means no model.
    pub bundle_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_similar_runs: usize,
    pub max_tokens_per_history_entry: usize,
    pub max_total_tokens: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    pub archived_runs_dir: Option<PathBuf>,
    pub world_runs_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoutingConfig {
    /// Global toolchain order used when no rule matches.
    pub toolchain_priority: Vec<String>,
    /// Weight of the empirical estimate in the blended score.
    pub blend_weight: f64,
    /// Transition-store snapshot; absent disables the empirical blend.
    pub transitions_path: Option<PathBuf>,
    /// Transitions below this attempt count yield no estimate.
    pub min_samples: u64,
    pub rules: Vec<RoutingRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ActionSpaceConfig {
    pub candidates_bins: Vec<u32>,
    pub minutes_bins: Vec<u32>,
    pub iterations_bins: Vec<u32>,
    /// Strategy sets keyed by domain name (`code`, `asset`).
    pub strategies: BTreeMap<String, Vec<String>>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            mode: PlannerMode::Off,
            confidence_threshold: 0.8,
            model: ModelConfig::default(),
            limits: LimitsConfig::default(),
            history: HistoryConfig::default(),
            routing: RoutingConfig::default(),
            action_space: ActionSpaceConfig::default(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = TokenLimits::default();
        Self {
            max_similar_runs: limits.max_similar_runs,
            max_tokens_per_history_entry: limits.max_tokens_per_history_entry,
            max_total_tokens: limits.max_total_tokens,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            toolchain_priority: vec!["codex".to_string(), "claude_code".to_string()],
            blend_weight: 0.35,
            transitions_path: None,
            min_samples: 5,
            rules: Vec::new(),
        }
    }
}

impl Default for ActionSpaceConfig {
    fn default() -> Self {
        let space = ActionSpace::default_space();
        let snapshot = space.snapshot();
        Self {
            candidates_bins: snapshot.candidates_bins,
            minutes_bins: snapshot.minutes_bins,
            iterations_bins: snapshot.iterations_bins,
            strategies: snapshot.strategies,
        }
    }
}

impl PlannerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            return Err(anyhow!("confidence_threshold must be in [0, 1]"));
        }
        if self.limits.max_similar_runs == 0 {
            return Err(anyhow!("limits.max_similar_runs must be > 0"));
        }
        if self.limits.max_tokens_per_history_entry == 0 {
            return Err(anyhow!("limits.max_tokens_per_history_entry must be > 0"));
        }
        if self.limits.max_total_tokens < 16 {
            return Err(anyhow!("limits.max_total_tokens must be >= 16"));
        }
        if !self.routing.blend_weight.is_finite()
            || !(0.0..=1.0).contains(&self.routing.blend_weight)
        {
            return Err(anyhow!("routing.blend_weight must be in [0, 1]"));
        }
        for (index, toolchain) in self.routing.toolchain_priority.iter().enumerate() {
            if toolchain.trim().is_empty() {
                return Err(anyhow!("routing.toolchain_priority[{index}] is empty"));
            }
        }
        for (index, rule) in self.routing.rules.iter().enumerate() {
            if rule.toolchains.is_empty() {
                return Err(anyhow!("routing.rules[{index}].toolchains must be non-empty"));
            }
            if rule.parallelism == 0 {
                return Err(anyhow!("routing.rules[{index}].parallelism must be >= 1"));
            }
        }
        // Ladders and strategy sets get their own validation when the
        // action space is built.
        self.build_action_space()?;
        Ok(())
    }

    /// Build the immutable action space from this configuration.
    pub fn build_action_space(&self) -> Result<ActionSpace> {
        let mut strategies = BTreeMap::new();
        for (name, set) in &self.action_space.strategies {
            let domain = match name.as_str() {
                "code" => TaskDomain::Code,
                "asset" => TaskDomain::Asset,
                other => return Err(anyhow!("action_space.strategies has unknown domain {other}")),
            };
            strategies.insert(domain, set.clone());
        }
        if strategies.is_empty() {
            return Err(anyhow!("action_space.strategies must configure a domain"));
        }
        ActionSpace::new(
            strategies,
            self.action_space.candidates_bins.clone(),
            self.action_space.minutes_bins.clone(),
            self.action_space.iterations_bins.clone(),
        )
    }

    pub fn token_limits(&self) -> TokenLimits {
        TokenLimits {
            max_similar_runs: self.limits.max_similar_runs,
            max_tokens_per_history_entry: self.limits.max_tokens_per_history_entry,
            max_total_tokens: self.limits.max_total_tokens,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PlannerConfig::default()`.
pub fn load_config(path: &Path) -> Result<PlannerConfig> {
    if !path.exists() {
        let cfg = PlannerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PlannerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, PlannerConfig::default());
        assert_eq!(cfg.mode, PlannerMode::Off);
    }

    #[test]
    fn parses_a_full_config() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("planner.toml");
        fs::write(
            &path,
            r#"
mode = "enforce"
confidence_threshold = 0.75

[model]
bundle_dir = "models/current"

[limits]
max_total_tokens = 192

[routing]
toolchain_priority = ["codex"]
blend_weight = 0.5

[[routing.rules]]
job_kinds = ["asset_generation"]
toolchains = ["blender_pipeline"]
fallback = ["comfyui_pipeline"]
parallelism = 2
"#,
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.mode, PlannerMode::Enforce);
        assert_eq!(cfg.limits.max_total_tokens, 192);
        assert_eq!(cfg.routing.rules.len(), 1);
        assert_eq!(cfg.routing.rules[0].parallelism, 2);
        cfg.build_action_space().expect("default space still valid");
    }

    #[test]
    fn rejects_bad_threshold() {
        let cfg = PlannerConfig {
            confidence_threshold: 1.5,
            ..PlannerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_unknown_action_space_domain() {
        let mut cfg = PlannerConfig::default();
        cfg.action_space
            .strategies
            .insert("video".to_string(), vec!["single_shot".to_string()]);
        let err = cfg.validate().expect_err("unknown domain");
        assert!(err.to_string().contains("unknown domain"));
    }

    #[test]
    fn rejects_rule_without_toolchains() {
        let mut cfg = PlannerConfig::default();
        cfg.routing.rules.push(RoutingRule::default());
        assert!(cfg.validate().is_err());
    }
}
