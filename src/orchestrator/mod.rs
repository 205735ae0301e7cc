//! Phase execution: the state store, the run loop and the run summary.

pub mod runner;
pub mod state;
pub mod summary;

pub use runner::{Orchestrator, RunOptions};
pub use state::{PhaseStatus, PipelineState, StateStore};
pub use summary::{PhaseOutcome, RunSummary};
