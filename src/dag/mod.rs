//! Phase dependency graph.
//!
//! Phases form a DAG rather than a line: `recombine` waits on the colour
//! upscale as well as both alpha stages, while `verify` and `scrub` fan out
//! from `recombine`.
//!
//! ```no_run
//! use upscale_pipeline::dag::PhaseGraph;
//! use upscale_pipeline::orchestrator::PipelineState;
//!
//! # fn example() -> Result<(), upscale_pipeline::errors::PipelineError> {
//! let graph = PhaseGraph::standard()?;
//! let order = graph.topological_members(&["recombine".to_string(), "upscale".to_string()])?;
//! // [upscale, recombine]
//! let unmet = graph.unmet_dependencies("recombine", &PipelineState::default());
//! // ["upscale", "alpha_split", "alpha_upscale"]
//! # Ok(())
//! # }
//! ```

mod builder;

pub use builder::{DagBuilder, PhaseGraph, PhaseIndex};
