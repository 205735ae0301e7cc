//! Phase definitions for the upscale pipeline.
//!
//! This module provides:
//! - `PhaseDescriptor`, the name + prerequisites record the DAG is built from
//! - `Phase`, the closed set of eleven phases, each with a `run()`
//! - `PhaseContext`, everything a phase needs passed in explicitly
//! - `CancelFlag`, the interrupt flag checked at file boundaries and awaited
//!   by the orchestrator

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::info;

use crate::assets;
use crate::chain;
use crate::config::Config;
use crate::enhance::Enhancer;
use crate::errors::PipelineError;
use crate::raster::BatchOptions;
use crate::retry::RetryPolicy;
use crate::tools::ToolRunner;
use crate::ui::PipelineUI;

/// A named phase and the phases that must complete before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDescriptor {
    pub name: String,
    /// Prerequisite phase names, in declared order
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PhaseDescriptor {
    pub fn new(name: &str, dependencies: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Every pipeline phase, in declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    GameFiles,
    Extract,
    Convert,
    Premultiply,
    AlphaSplit,
    AlphaUpscale,
    Upscale,
    Recombine,
    Verify,
    Scrub,
    GenerateMod,
}

impl Phase {
    pub const ALL: [Phase; 11] = [
        Phase::GameFiles,
        Phase::Extract,
        Phase::Convert,
        Phase::Premultiply,
        Phase::AlphaSplit,
        Phase::AlphaUpscale,
        Phase::Upscale,
        Phase::Recombine,
        Phase::Verify,
        Phase::Scrub,
        Phase::GenerateMod,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::GameFiles => "game_files",
            Phase::Extract => "extract",
            Phase::Convert => "convert",
            Phase::Premultiply => "premultiply",
            Phase::AlphaSplit => "alpha_split",
            Phase::AlphaUpscale => "alpha_upscale",
            Phase::Upscale => "upscale",
            Phase::Recombine => "recombine",
            Phase::Verify => "verify",
            Phase::Scrub => "scrub",
            Phase::GenerateMod => "generate_mod",
        }
    }

    pub fn dependencies(&self) -> &'static [&'static str] {
        match self {
            Phase::GameFiles => &[],
            Phase::Extract => &["game_files"],
            Phase::Convert => &["extract"],
            Phase::Premultiply => &["convert"],
            Phase::AlphaSplit => &["premultiply"],
            Phase::AlphaUpscale => &["alpha_split"],
            Phase::Upscale => &["premultiply"],
            Phase::Recombine => &["upscale", "alpha_split", "alpha_upscale"],
            Phase::Verify => &["recombine"],
            Phase::Scrub => &["recombine"],
            Phase::GenerateMod => &["scrub"],
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Phase::GameFiles => "Locate game data and copy it into 00_game",
            Phase::Extract => "Unpack the GRP archive with kextract",
            Phase::Convert => "Convert ART, VOC, MID and ANM assets",
            Phase::Premultiply => "Premultiply colour by alpha",
            Phase::AlphaSplit => "Split alpha into grayscale rasters",
            Phase::AlphaUpscale => "Upscale alpha rasters with Lanczos",
            Phase::Upscale => "Upscale colour through the enhancer",
            Phase::Recombine => "Reattach upscaled alpha to upscaled colour",
            Phase::Verify => "Check transparent pixels for magenta halos",
            Phase::Scrub => "Blacken magenta under transparent pixels",
            Phase::GenerateMod => "Assemble the hightile mod folder",
        }
    }

    pub fn descriptor(&self) -> PhaseDescriptor {
        PhaseDescriptor::new(self.name(), self.dependencies())
    }

    pub fn from_name(name: &str) -> Option<Phase> {
        Phase::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// Execute this phase against the context's directories.
    pub async fn run(&self, ctx: &PhaseContext) -> Result<(), PipelineError> {
        let paths = &ctx.config.paths;
        let settings = &ctx.config.settings;

        match self {
            Phase::GameFiles => {
                assets::game_files::run(paths, &settings.tools, &ctx.tools).await?;
            }
            Phase::Extract => {
                assets::extract::run(paths, &settings.tools, &ctx.tools).await?;
            }
            Phase::Convert => {
                let report = assets::convert::run(
                    paths,
                    &settings.tools,
                    &ctx.tools,
                    &ctx.batch("convert"),
                )
                .await?;
                info!(
                    textures = report.textures,
                    audio = report.audio,
                    animations = report.animations,
                    "assets converted"
                );
            }
            Phase::Premultiply => {
                chain::premultiply::run(
                    &paths.textures_dir(),
                    &paths.premultiply_dir,
                    &ctx.batch("premul"),
                )?;
            }
            Phase::AlphaSplit => {
                chain::alpha_split::run(
                    &paths.premultiply_dir,
                    &paths.alpha_extract_dir,
                    &ctx.batch("split"),
                )?;
            }
            Phase::AlphaUpscale => {
                chain::alpha_upscale::run(
                    &paths.alpha_extract_dir,
                    &paths.alpha_upscale_dir,
                    settings.upscale.scale,
                    &ctx.batch("alpha"),
                )?;
            }
            Phase::Upscale => {
                info!(backend = ctx.enhancer.name(), "preparing enhancer");
                ctx.enhancer.prepare().await?;
                chain::upscale::run(
                    &paths.premultiply_dir,
                    &paths.upscale_dir,
                    settings.upscale.scale,
                    settings.upscale.skip_existing,
                    ctx.enhancer.as_ref(),
                    &ctx.file_retry(),
                    &ctx.batch("upscale"),
                )
                .await?;
            }
            Phase::Recombine => {
                chain::recombine::run(
                    &paths.upscale_dir,
                    &paths.alpha_upscale_dir,
                    &paths.reattach_dir,
                    &ctx.batch("reattach"),
                )?;
            }
            Phase::Verify => {
                let report = chain::verify::run(
                    &paths.reattach_dir,
                    settings.verify.pink_tolerance,
                    &ctx.batch("verify"),
                )?;
                info!(checked = report.checked, "no magenta halos found");
            }
            Phase::Scrub => {
                chain::scrub::run(
                    &paths.reattach_dir,
                    &paths.scrub_dir,
                    settings.scrub.magenta_tolerance,
                    &ctx.batch("scrub"),
                )?;
            }
            Phase::GenerateMod => {
                let manifest = assets::package::run(paths, settings, &ctx.cancel)?;
                info!(
                    textures = manifest.textures.len(),
                    audio = manifest.audio.len(),
                    "mod folder written"
                );
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::from_name(s).ok_or_else(|| {
            let valid: Vec<&str> = Phase::ALL.iter().map(Phase::name).collect();
            anyhow::anyhow!("Invalid phase '{}'. Valid values: {}", s, valid.join(", "))
        })
    }
}

/// Set on Ctrl-C. Stages check it between files, and the orchestrator
/// races each phase against [`CancelFlag::cancelled`] so an in-flight tool
/// call is dropped (and its child killed) as soon as the flag is raised.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelState>);

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.0.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Everything a phase needs, built once per run.
pub struct PhaseContext {
    pub config: Config,
    pub enhancer: Arc<dyn Enhancer>,
    pub tools: ToolRunner,
    pub cancel: CancelFlag,
    pub ui: Arc<PipelineUI>,
}

impl PhaseContext {
    pub fn new(
        config: Config,
        enhancer: Arc<dyn Enhancer>,
        cancel: CancelFlag,
        ui: Arc<PipelineUI>,
    ) -> Self {
        Self {
            tools: ToolRunner::from_config(&config),
            config,
            enhancer,
            cancel,
            ui,
        }
    }

    /// Batch options for one stage, with a progress bar under the phase bar.
    pub fn batch(&self, stage: &str) -> BatchOptions {
        let settings = &self.config.settings;
        BatchOptions::new(
            settings.image.extension.clone(),
            settings.batch.clone(),
            self.cancel.clone(),
        )
        .with_progress(self.ui.stage_bar(stage, 0))
    }

    /// The per-file policy from `[retry]`.
    pub fn file_retry(&self) -> RetryPolicy {
        self.config.settings.retry.to_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_phases_round_trip_through_names() {
        for phase in Phase::ALL {
            assert_eq!(Phase::from_name(phase.name()), Some(phase));
            assert_eq!(phase.name().parse::<Phase>().unwrap(), phase);
        }
    }

    #[test]
    fn test_invalid_phase_lists_valid_values() {
        let err = "upscaling".parse::<Phase>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Invalid phase 'upscaling'"));
        assert!(msg.contains("alpha_upscale"));
    }

    #[test]
    fn test_recombine_waits_on_three_phases() {
        let desc = Phase::Recombine.descriptor();
        assert_eq!(desc.dependencies, vec!["upscale", "alpha_split", "alpha_upscale"]);
    }

    #[test]
    fn test_every_dependency_names_an_earlier_phase() {
        for (i, phase) in Phase::ALL.iter().enumerate() {
            for dep in phase.dependencies() {
                let pos = Phase::ALL.iter().position(|p| p.name() == *dep).unwrap();
                assert!(pos < i, "{} depends on later phase {}", phase, dep);
            }
        }
    }

    #[test]
    fn test_cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::default();
        let clone = flag.clone();
        assert!(flag.check().is_ok());
        clone.cancel();
        assert!(matches!(flag.check(), Err(PipelineError::Interrupted)));
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let flag = CancelFlag::default();
        let waiter = flag.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        tokio::task::yield_now().await;
        flag.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("waiter woke")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_returns_immediately_when_already_set() {
        let flag = CancelFlag::default();
        flag.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), flag.cancelled())
            .await
            .expect("already cancelled");
    }
}
