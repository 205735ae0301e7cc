//! Per-run summary written to `files/temp/workflow_summary.json`.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::orchestrator::state::PipelineState;
use crate::phase::Phase;

pub const NOT_RUN: &str = "not_run";

/// What the orchestrator did with a phase during one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseOutcome {
    Executed,
    Skipped,
    Failed,
    /// Marked completed by a dry run without executing
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub requested: Vec<String>,
    /// Final status of every known phase; `not_run` when absent from state
    pub phases: BTreeMap<String, String>,
    pub outcomes: BTreeMap<String, PhaseOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn start(dry_run: bool, requested: Vec<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            requested,
            phases: BTreeMap::new(),
            outcomes: BTreeMap::new(),
            error: None,
        }
    }

    pub fn record(&mut self, phase: &str, outcome: PhaseOutcome) {
        self.outcomes.insert(phase.to_string(), outcome);
    }

    pub fn finish(&mut self, state: &PipelineState, error: Option<String>) {
        self.finished_at = Some(Utc::now());
        self.error = error;
        self.phases = Phase::ALL
            .iter()
            .map(|p| {
                let status = state.get(p.name()).unwrap_or(NOT_RUN);
                (p.name().to_string(), status.to_string())
            })
            .collect();
    }

    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::NonRetryable(format!("Failed to serialize summary: {e}")))?;
        std::fs::write(path, json).map_err(|e| PipelineError::io(path, e))
    }

    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| {
            PipelineError::NonRetryable(format!("Invalid run summary {}: {e}", path.display()))
        })
    }
}
