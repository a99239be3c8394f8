//! Durable audit artifacts for one decision.
//!
//! Every decision produces three JSON documents: the planner input, the
//! planner action, and the executed plan. Each validates against a shipped
//! JSON Schema; a violation is a bug in this crate, not a runtime condition
//! to tolerate.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde::Serialize;
use serde_json::Value;

use crate::core::decide::DecisionBundle;

const PLANNER_INPUT_SCHEMA: &str = include_str!("../../schemas/planner_input.v1.schema.json");
const PLANNER_ACTION_SCHEMA: &str = include_str!("../../schemas/planner_action.v1.schema.json");
const EXECUTED_PLAN_SCHEMA: &str = include_str!("../../schemas/executed_plan.v1.schema.json");

/// File layout of a written decision bundle.
#[derive(Debug, Clone)]
pub struct BundlePaths {
    pub dir: PathBuf,
    pub input_path: PathBuf,
    pub action_path: PathBuf,
    pub plan_path: PathBuf,
}

impl BundlePaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            input_path: dir.join("planner_input.json"),
            action_path: dir.join("planner_action.json"),
            plan_path: dir.join("executed_plan.json"),
        }
    }
}

/// Validate all three documents against their schemas.
pub fn validate_bundle(bundle: &DecisionBundle) -> Result<()> {
    let input = serde_json::to_value(&bundle.input).context("serialize planner input")?;
    validate_schema(&input, PLANNER_INPUT_SCHEMA, "planner_input")?;
    let action = serde_json::to_value(&bundle.action).context("serialize planner action")?;
    validate_schema(&action, PLANNER_ACTION_SCHEMA, "planner_action")?;
    let plan = serde_json::to_value(&bundle.plan).context("serialize executed plan")?;
    validate_schema(&plan, EXECUTED_PLAN_SCHEMA, "executed_plan")?;
    Ok(())
}

/// Validate and write the three documents under `dir`.
///
/// Files are written in deterministic order to keep audit trails stable.
pub fn write_bundle(dir: &Path, bundle: &DecisionBundle) -> Result<BundlePaths> {
    validate_bundle(bundle)?;
    let paths = BundlePaths::new(dir);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create bundle dir {}", paths.dir.display()))?;
    write_json(&paths.input_path, &bundle.input)?;
    write_json(&paths.action_path, &bundle.action)?;
    write_json(&paths.plan_path, &bundle.plan)?;
    Ok(paths)
}

/// Load and re-validate a previously written bundle.
pub fn load_bundle(dir: &Path) -> Result<DecisionBundle> {
    let paths = BundlePaths::new(dir);
    let input = read_json(&paths.input_path)?;
    let action = read_json(&paths.action_path)?;
    let plan = read_json(&paths.plan_path)?;
    let bundle = DecisionBundle {
        input: serde_json::from_value(input).context("parse planner input")?,
        action: serde_json::from_value(action).context("parse planner action")?,
        plan: serde_json::from_value(plan).context("parse executed plan")?,
    };
    validate_bundle(&bundle)?;
    Ok(bundle)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value).context("serialize json")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Validate a JSON instance against a JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value, schema_raw: &str, label: &str) -> Result<()> {
    let schema_json: Value = serde_json::from_str(schema_raw)
        .with_context(|| format!("parse {label} schema"))?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema_json)
        .with_context(|| format!("compile {label} schema"))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!(
            "{label} schema validation failed:\n- {}",
            messages.join("\n- ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::decision_bundle;

    #[test]
    fn bundle_round_trips_through_disk() {
        let temp = tempfile::tempdir().expect("tempdir");
        let bundle = decision_bundle();
        let paths = write_bundle(&temp.path().join("decision-1"), &bundle).expect("write");
        assert!(paths.input_path.is_file());
        assert!(paths.action_path.is_file());
        assert!(paths.plan_path.is_file());
        let loaded = load_bundle(&paths.dir).expect("load");
        assert_eq!(loaded, bundle);
    }

    #[test]
    fn every_document_passes_its_schema() {
        let bundle = decision_bundle();
        validate_bundle(&bundle).expect("schema-valid bundle");
    }

    #[test]
    fn schema_rejects_a_mangled_document() {
        let bundle = decision_bundle();
        let mut action = serde_json::to_value(&bundle.action).expect("serialize");
        action["confidence"] = Value::String("high".to_string());
        let err = validate_schema(&action, PLANNER_ACTION_SCHEMA, "planner_action")
            .expect_err("mangled document");
        assert!(err.to_string().contains("planner_action"));
    }
}
