use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::events::CompletedRun;
use crate::ids::IdGenerator;
use crate::models::Algorithm;
use crate::reconciler::sanitize_list;
use crate::state::AlgorithmRunResult;

/// Registry of completed runs, at most one per algorithm.
///
/// Replacing a run keeps its original position, so insertion order (and with
/// it the first-seen tie-break in analytics) survives re-runs.
#[derive(Clone, Debug, Default)]
pub struct ResultStore {
    runs: Arc<Vec<AlgorithmRunResult>>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the run this one replaced, if any.
    pub fn add_result(&mut self, run: AlgorithmRunResult) -> Option<AlgorithmRunResult> {
        let mut next = (*self.runs).clone();
        let replaced = match next
            .iter()
            .position(|existing| existing.algorithm == run.algorithm)
        {
            Some(idx) => {
                debug!(algorithm = %run.algorithm, id = %run.id, "replacing stored run");
                Some(std::mem::replace(&mut next[idx], run))
            }
            None => {
                info!(algorithm = %run.algorithm, id = %run.id, "storing run");
                next.push(run);
                None
            }
        };
        self.runs = Arc::new(next);
        replaced
    }

    pub fn clear(&mut self) {
        self.runs = Arc::new(Vec::new());
    }

    pub fn runs(&self) -> Arc<Vec<AlgorithmRunResult>> {
        Arc::clone(&self.runs)
    }

    pub fn get(&self, algorithm: Algorithm) -> Option<&AlgorithmRunResult> {
        self.runs.iter().find(|run| run.algorithm == algorithm)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Reads a JSON array of completion payloads, each tagged with its algorithm.
pub fn load_runs(path: &Path, ids: &mut IdGenerator) -> Result<Vec<AlgorithmRunResult>> {
    let contents = fs::read_to_string(path).map_err(|err| {
        Error::RunsIo(format!(
            "failed to read runs '{}': {}",
            path.display(),
            err
        ))
    })?;
    let value: Value = serde_json::from_str(&contents)
        .map_err(|err| Error::RunsIo(format!("failed to parse runs: {}", err)))?;
    runs_from_value(&value, ids)
}

/// Entries that fail validation are skipped with a warning.
pub fn runs_from_value(value: &Value, ids: &mut IdGenerator) -> Result<Vec<AlgorithmRunResult>> {
    let entries = value
        .as_array()
        .ok_or_else(|| Error::RunsIo("runs file must hold a JSON array".to_string()))?;

    let mut runs = Vec::with_capacity(entries.len());
    for (idx, entry) in entries.iter().enumerate() {
        let run = match CompletedRun::from_value(entry) {
            Ok(run) => run,
            Err(err) => {
                warn!(entry = idx, error = %err, "skipping run");
                continue;
            }
        };
        let Some(algorithm) = run.algorithm else {
            warn!(entry = idx, "skipping run without algorithm");
            continue;
        };
        runs.push(AlgorithmRunResult {
            id: ids.next_id("run"),
            algorithm,
            processes: sanitize_list(run.results, ids),
            statistics: run.statistics.to_statistics(),
            detailed_metrics: run.detailed_metrics,
            completed_at_ms: run.completed_at_ms.unwrap_or(0),
            unreported: run.statistics.unreported_metrics(),
        });
    }
    Ok(runs)
}
