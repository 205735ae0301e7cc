//! Durable phase-status store backed by `.pipeline/state.json`.
//!
//! Every mutation is written through immediately by replacing the file
//! atomically (temp file in the same directory, then rename). While a
//! `StateStore` is open for writing it holds an exclusive advisory lock on
//! `state.lock`, so a second pipeline process fails fast instead of racing.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::PipelineError;

pub const COMPLETED: &str = "completed";
const FAILED_PREFIX: &str = "failed: ";

/// Status of one phase as recorded in the state document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseStatus {
    NotRun,
    Completed,
    Failed(String),
}

impl PhaseStatus {
    pub fn from_record(record: Option<&str>) -> Self {
        match record {
            None => PhaseStatus::NotRun,
            Some(COMPLETED) => PhaseStatus::Completed,
            Some(other) => PhaseStatus::Failed(
                other
                    .strip_prefix(FAILED_PREFIX)
                    .unwrap_or(other)
                    .to_string(),
            ),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PhaseStatus::Completed)
    }
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseStatus::NotRun => write!(f, "not_run"),
            PhaseStatus::Completed => write!(f, "{COMPLETED}"),
            PhaseStatus::Failed(reason) => write!(f, "{FAILED_PREFIX}{reason}"),
        }
    }
}

/// Mapping from phase name to status string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineState(BTreeMap<String, String>);

impl PipelineState {
    pub fn get(&self, phase: &str) -> Option<&str> {
        self.0.get(phase).map(String::as_str)
    }

    pub fn status(&self, phase: &str) -> PhaseStatus {
        PhaseStatus::from_record(self.get(phase))
    }

    pub fn is_completed(&self, phase: &str) -> bool {
        self.get(phase) == Some(COMPLETED)
    }

    pub fn insert(&mut self, phase: impl Into<String>, status: impl Into<String>) {
        self.0.insert(phase.into(), status.into());
    }

    pub fn remove(&mut self, phase: &str) -> Option<String> {
        self.0.remove(phase)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

pub struct StateStore {
    state_file: PathBuf,
    state: PipelineState,
    /// Held for the store's lifetime; dropping the handle releases the lock.
    _lock: Option<File>,
}

impl StateStore {
    /// Open the store for a run, taking the exclusive process lock.
    pub fn open(state_file: PathBuf, lock_file: &Path) -> Result<Self, PipelineError> {
        if let Some(parent) = lock_file.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_file)
            .map_err(|e| PipelineError::io(lock_file, e))?;
        lock.try_lock_exclusive().map_err(|_| {
            PipelineError::Resource(format!(
                "Another pipeline process holds {}; wait for it to finish",
                lock_file.display()
            ))
        })?;

        let state = Self::load(&state_file);
        Ok(Self {
            state_file,
            state,
            _lock: Some(lock),
        })
    }

    /// Open without locking, for read-only inspection (`status`, `list`).
    pub fn open_read_only(state_file: PathBuf) -> Self {
        let state = Self::load(&state_file);
        Self {
            state_file,
            state,
            _lock: None,
        }
    }

    fn load(path: &Path) -> PipelineState {
        if !path.exists() {
            debug!(path = %path.display(), "no state file, starting fresh");
            return PipelineState::default();
        }
        match fs::read_to_string(path).map(|s| serde_json::from_str::<PipelineState>(&s)) {
            Ok(Ok(state)) => state,
            Ok(Err(e)) => {
                warn!(path = %path.display(), error = %e, "state file is not valid JSON, starting fresh");
                PipelineState::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read state file, starting fresh");
                PipelineState::default()
            }
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn status(&self, phase: &str) -> PhaseStatus {
        self.state.status(phase)
    }

    pub fn set(&mut self, phase: &str, status: &str) -> Result<(), PipelineError> {
        self.state.insert(phase, status);
        self.persist()
    }

    pub fn mark_completed(&mut self, phase: &str) -> Result<(), PipelineError> {
        self.set(phase, COMPLETED)
    }

    pub fn mark_failed(&mut self, phase: &str, reason: &str) -> Result<(), PipelineError> {
        self.set(phase, &format!("{FAILED_PREFIX}{reason}"))
    }

    /// Remove a phase's record. Returns whether anything was removed.
    pub fn delete(&mut self, phase: &str) -> Result<bool, PipelineError> {
        if self.state.remove(phase).is_none() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<(), PipelineError> {
        self.state = PipelineState::default();
        self.persist()
    }

    fn persist(&self) -> Result<(), PipelineError> {
        let dir = self
            .state_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        fs::create_dir_all(&dir).map_err(|e| PipelineError::io(&dir, e))?;

        let json = serde_json::to_string_pretty(&self.state)
            .map_err(|e| PipelineError::NonRetryable(format!("Failed to serialize state: {e}")))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(&dir).map_err(|e| PipelineError::io(&dir, e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| PipelineError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| PipelineError::io(tmp.path(), e))?;
        tmp.persist(&self.state_file)
            .map_err(|e| PipelineError::io(&self.state_file, e.error))?;
        Ok(())
    }
}
