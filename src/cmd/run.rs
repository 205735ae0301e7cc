//! Phase execution: `upscale-pipeline run [PHASE...]`.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use super::super::Cli;

pub async fn cmd_run(
    cli: &Cli,
    project_dir: PathBuf,
    phases: &[String],
    rerun: bool,
    dry_run: bool,
) -> Result<()> {
    use upscale_pipeline::config::Config;
    use upscale_pipeline::dag::PhaseGraph;
    use upscale_pipeline::device::{self, DeviceInfo};
    use upscale_pipeline::enhance::build_enhancer;
    use upscale_pipeline::orchestrator::{Orchestrator, PhaseOutcome, RunOptions, StateStore};
    use upscale_pipeline::phase::{CancelFlag, PhaseContext};
    use upscale_pipeline::pipeline_config::EnhanceBackend;
    use upscale_pipeline::ui::PipelineUI;

    let config = Config::new(project_dir, cli.config.clone(), cli.verbose)?;
    let warnings = config
        .settings
        .validate()
        .context("Configuration is invalid; run 'upscale-pipeline config validate'")?;
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    config.ensure_directories()?;

    let graph = PhaseGraph::standard()?;
    let store = StateStore::open(config.state_file.clone(), &config.lock_file)?;
    let mut orchestrator = Orchestrator::new(graph, store);

    let device = match config.settings.upscale.backend {
        EnhanceBackend::Ncnn => device::detect(config.settings.upscale.device).await,
        EnhanceBackend::Lanczos => DeviceInfo::cpu(),
    };
    tracing::info!(device = %device.name, kind = %device.kind, "inference device");
    let enhancer = build_enhancer(&config, &device);

    let cancel = CancelFlag::default();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        tracing::warn!("interrupt received, aborting the running phase");
        on_interrupt.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Second interrupt, exiting immediately");
            std::process::exit(130);
        }
    });

    let ui = Arc::new(PipelineUI::new(0, cli.verbose));
    let summary_file = config.paths.summary_file.clone();
    let ctx = PhaseContext::new(config, enhancer, cancel, ui);

    let requested = (!phases.is_empty()).then_some(phases);
    let opts = RunOptions {
        skip_completed: !rerun,
        dry_run,
    };
    let summary = orchestrator
        .run(&ctx, requested, opts)
        .await
        .context("Pipeline run failed")?;

    let count = |outcome: PhaseOutcome| summary.outcomes.values().filter(|o| **o == outcome).count();
    println!();
    if dry_run {
        println!(
            "Dry run: {} phase(s) marked completed, {} already completed",
            count(PhaseOutcome::Simulated),
            count(PhaseOutcome::Skipped)
        );
    } else {
        println!(
            "Pipeline finished: {} phase(s) executed, {} skipped",
            count(PhaseOutcome::Executed),
            count(PhaseOutcome::Skipped)
        );
    }
    println!("Summary written to {}", summary_file.display());
    Ok(())
}
