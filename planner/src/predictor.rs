//! The learned predictor as a polymorphic capability.
//!
//! Callers never branch on a concrete model type, only on this trait and the
//! memoized load state: a bundle is loaded at most once per process, and a
//! load failure is cached so concurrent decisions never race to re-load or
//! repeatedly fail-load a broken bundle.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::decide::{PredictFailure, RawPrediction};
use crate::io::process::run_command_with_timeout;

/// Bytes of predictor stdout/stderr kept in memory.
const PREDICTOR_OUTPUT_LIMIT_BYTES: usize = 64 * 1024;

/// A loaded model capable of one operation.
pub trait Predictor: Send + Sync + std::fmt::Debug {
    /// Stable identifier recorded in the action document.
    fn model_ref(&self) -> &str;

    /// Predict an action for an encoded planner input.
    fn predict(&self, tokens: &[String]) -> Result<RawPrediction, PredictFailure>;
}

/// Manifest describing a command bundle (`manifest.toml` in the bundle dir).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BundleManifest {
    pub model_ref: String,
    /// Command invoked per prediction, relative to the bundle directory.
    pub command: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    tokens: &'a [String],
}

/// Predictor backed by a child process described by a bundle manifest.
///
/// The child receives `{"tokens": [...]}` on stdin and must emit a single
/// prediction JSON object on stdout within the manifest timeout.
#[derive(Debug)]
pub struct CommandPredictor {
    manifest: BundleManifest,
    bundle_dir: PathBuf,
}

impl CommandPredictor {
    pub fn load(bundle_dir: &Path) -> Result<Self, String> {
        let manifest_path = bundle_dir.join("manifest.toml");
        let contents = std::fs::read_to_string(&manifest_path)
            .map_err(|err| format!("read {}: {err}", manifest_path.display()))?;
        let manifest: BundleManifest = toml::from_str(&contents)
            .map_err(|err| format!("parse {}: {err}", manifest_path.display()))?;
        if manifest.command.is_empty() || manifest.command[0].trim().is_empty() {
            return Err(format!(
                "manifest {} has an empty command",
                manifest_path.display()
            ));
        }
        if manifest.timeout_secs == 0 {
            return Err(format!(
                "manifest {} timeout_secs must be > 0",
                manifest_path.display()
            ));
        }
        debug!(model_ref = %manifest.model_ref, "model bundle loaded");
        Ok(Self {
            manifest,
            bundle_dir: bundle_dir.to_path_buf(),
        })
    }
}

impl Predictor for CommandPredictor {
    fn model_ref(&self) -> &str {
        &self.manifest.model_ref
    }

    fn predict(&self, tokens: &[String]) -> Result<RawPrediction, PredictFailure> {
        let request = serde_json::to_vec(&PredictRequest { tokens })
            .map_err(|err| PredictFailure::Inference(format!("encode request: {err}")))?;

        let mut cmd = Command::new(&self.manifest.command[0]);
        cmd.args(&self.manifest.command[1..]);
        cmd.current_dir(&self.bundle_dir);

        let output = run_command_with_timeout(
            cmd,
            &request,
            Duration::from_secs(self.manifest.timeout_secs),
            PREDICTOR_OUTPUT_LIMIT_BYTES,
        )
        .map_err(|err| PredictFailure::Inference(format!("{err:#}")))?;

        if output.timed_out {
            return Err(PredictFailure::Inference("predictor timed out".to_string()));
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PredictFailure::Inference(format!(
                "predictor exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|err| PredictFailure::Malformed(format!("decode prediction: {err}")))
    }
}

/// Memoized predictor slot shared across concurrent decisions.
///
/// The first caller performs the load; every later caller (and every retry
/// after a failure) observes the cached result.
#[derive(Default)]
pub struct PredictorCell {
    slot: OnceLock<Result<Arc<dyn Predictor>, String>>,
}

impl PredictorCell {
    pub const fn new() -> Self {
        Self {
            slot: OnceLock::new(),
        }
    }

    /// Cell pre-filled with an already-constructed predictor (tests, embedders).
    pub fn preloaded(predictor: Arc<dyn Predictor>) -> Self {
        let cell = Self::new();
        let _ = cell.slot.set(Ok(predictor));
        cell
    }

    /// Load the bundle once; both success and failure are cached.
    pub fn get_or_load(&self, bundle_dir: Option<&Path>) -> Result<Arc<dyn Predictor>, String> {
        self.slot
            .get_or_init(|| match bundle_dir {
                None => Err("no model bundle configured".to_string()),
                Some(dir) => match CommandPredictor::load(dir) {
                    Ok(predictor) => Ok(Arc::new(predictor) as Arc<dyn Predictor>),
                    Err(err) => {
                        warn!(error = %err, "model bundle load failed; caching failure");
                        Err(err)
                    }
                },
            })
            .clone()
    }
}
