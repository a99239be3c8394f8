//! History sources: archived runs and long-running-world runs.
//!
//! Each source is a directory of JSON records, one run per file. A missing
//! directory, unreadable file, or malformed record degrades to an empty or
//! partial result with a warning; history problems never abort a decision.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

use crate::core::history::HistoryCandidate;

/// Merge candidates from the archived-run and world-run directories.
pub fn load_history_sources(
    archived_runs_dir: Option<&Path>,
    world_runs_dir: Option<&Path>,
) -> Vec<HistoryCandidate> {
    let mut candidates = Vec::new();
    if let Some(dir) = archived_runs_dir {
        candidates.extend(read_run_dir(dir, "archived runs"));
    }
    if let Some(dir) = world_runs_dir {
        candidates.extend(read_run_dir(dir, "world runs"));
    }
    candidates
}

/// Read every `*.json` record in a directory, in sorted file order.
fn read_run_dir(dir: &Path, label: &str) -> Vec<HistoryCandidate> {
    if !dir.is_dir() {
        debug!(dir = %dir.display(), label, "history source missing, treating as empty");
        return Vec::new();
    }
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(dir = %dir.display(), label, error = %err, "history source unreadable");
            return Vec::new();
        }
    };

    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
        .collect();
    paths.sort();

    let mut candidates = Vec::new();
    for path in paths {
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable run record");
                continue;
            }
        };
        match serde_json::from_str::<HistoryCandidate>(&contents) {
            Ok(candidate) => candidates.push(candidate),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping malformed run record");
            }
        }
    }
    debug!(dir = %dir.display(), label, count = candidates.len(), "history source read");
    candidates
}
