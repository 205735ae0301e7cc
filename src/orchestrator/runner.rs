use std::collections::HashSet;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::dag::PhaseGraph;
use crate::errors::{PipelineError, UnmetDependency};
use crate::orchestrator::state::{PipelineState, StateStore};
use crate::orchestrator::summary::{PhaseOutcome, RunSummary};
use crate::phase::{Phase, PhaseContext};

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Leave phases already marked completed alone
    pub skip_completed: bool,
    /// Mark phases completed without executing them
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_completed: true,
            dry_run: false,
        }
    }
}

/// Drives the phase graph against the state store, one phase at a time.
pub struct Orchestrator {
    graph: PhaseGraph,
    store: StateStore,
}

impl Orchestrator {
    pub fn new(graph: PhaseGraph, store: StateStore) -> Self {
        Self { graph, store }
    }

    pub fn graph(&self) -> &PhaseGraph {
        &self.graph
    }

    pub fn state(&self) -> &PipelineState {
        self.store.state()
    }

    /// Resolve `requested` (all phases when `None`) into execution order.
    ///
    /// A dependency counts as met when it is completed or is itself part of
    /// the request. Every unmet pair is reported at once and nothing runs.
    pub fn plan(&self, requested: Option<&[String]>) -> Result<Vec<Phase>, PipelineError> {
        let names: Vec<String> = match requested {
            Some(names) => names.to_vec(),
            None => self.graph.phases().iter().map(|p| p.name.clone()).collect(),
        };
        let members = self.graph.topological_members(&names)?;
        let in_request: HashSet<&str> = members.iter().map(|d| d.name.as_str()).collect();

        let state = self.store.state();
        let mut unmet = Vec::new();
        for desc in &members {
            for dep in self.graph.unmet_dependencies(&desc.name, state) {
                if !in_request.contains(dep.as_str()) {
                    unmet.push(UnmetDependency {
                        phase: desc.name.clone(),
                        dependency: dep,
                    });
                }
            }
        }
        if !unmet.is_empty() {
            return Err(PipelineError::Dependency { unmet });
        }

        members
            .iter()
            .map(|desc| {
                Phase::from_name(&desc.name).ok_or_else(|| {
                    PipelineError::Configuration(format!("No implementation for phase '{}'", desc.name))
                })
            })
            .collect()
    }

    /// Run the requested phases, stopping at the first failure.
    ///
    /// The run summary is written whether or not the run succeeds.
    pub async fn run(
        &mut self,
        ctx: &PhaseContext,
        requested: Option<&[String]>,
        opts: RunOptions,
    ) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::start(
            opts.dry_run,
            requested.map(|r| r.to_vec()).unwrap_or_default(),
        );

        let result = self.run_phases(ctx, requested, opts, &mut summary).await;

        summary.finish(self.store.state(), result.as_ref().err().map(|e| e.to_string()));
        if let Err(e) = summary.save(&ctx.config.paths.summary_file) {
            warn!(error = %e, "failed to write run summary");
        }
        ctx.ui.finish(result.is_ok());

        result.map(|()| summary)
    }

    async fn run_phases(
        &mut self,
        ctx: &PhaseContext,
        requested: Option<&[String]>,
        opts: RunOptions,
        summary: &mut RunSummary,
    ) -> Result<(), PipelineError> {
        let plan = self.plan(requested)?;
        ctx.ui.set_phase_count(plan.len() as u64);
        info!(
            phases = plan.len(),
            dry_run = opts.dry_run,
            "starting pipeline run"
        );

        for phase in plan {
            let name = phase.name();

            if opts.skip_completed && self.store.status(name).is_completed() {
                info!(phase = name, "already completed, skipping");
                ctx.ui.phase_skipped(name, "already completed");
                summary.record(name, PhaseOutcome::Skipped);
                continue;
            }

            ctx.ui.start_phase(name, phase.description());

            if opts.dry_run {
                info!(phase = name, "dry run, marking completed");
                self.store.mark_completed(name)?;
                ctx.ui.phase_skipped(name, "dry run");
                summary.record(name, PhaseOutcome::Simulated);
                continue;
            }

            info!(phase = name, "starting phase");
            let started = Instant::now();
            let result = tokio::select! {
                result = phase.run(ctx) => result,
                () = ctx.cancel.cancelled() => Err(PipelineError::Interrupted),
            };
            match result {
                Ok(()) => {
                    self.store.mark_completed(name)?;
                    summary.record(name, PhaseOutcome::Executed);
                    ctx.ui.phase_complete(name, started.elapsed());
                    info!(phase = name, elapsed = ?started.elapsed(), "phase completed");
                }
                Err(err) => {
                    let reason = match &err {
                        PipelineError::Interrupted => "interrupted".to_string(),
                        other => other.to_string(),
                    };
                    self.store.mark_failed(name, &reason)?;
                    summary.record(name, PhaseOutcome::Failed);
                    ctx.ui.phase_failed(name, &reason);
                    error!(phase = name, kind = %err.kind(), error = %reason, "phase failed");
                    return Err(err.in_phase(name));
                }
            }
        }
        Ok(())
    }
}
