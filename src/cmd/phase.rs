//! Phase listing, status, and reset commands.

use anyhow::Result;
use std::path::PathBuf;

use super::super::Cli;

pub fn cmd_list() -> Result<()> {
    use upscale_pipeline::dag::PhaseGraph;
    use upscale_pipeline::phase::Phase;

    let graph = PhaseGraph::standard()?;

    println!();
    println!("{:<15} {:<38} Description", "Phase", "Depends on");
    println!("{:<15} {:<38} -----------", "-----", "----------");
    for desc in graph.execution_order() {
        let description = Phase::from_name(&desc.name)
            .map(|p| p.description())
            .unwrap_or_default();
        let deps = if desc.dependencies.is_empty() {
            "-".to_string()
        } else {
            desc.dependencies.join(", ")
        };
        println!("{:<15} {:<38} {}", desc.name, deps, description);
    }
    println!();
    println!("{} phases", graph.len());
    println!();
    Ok(())
}

pub fn cmd_status(cli: &Cli, project_dir: PathBuf) -> Result<()> {
    use console::style;
    use upscale_pipeline::config::Config;
    use upscale_pipeline::orchestrator::{PhaseStatus, RunSummary, StateStore};
    use upscale_pipeline::phase::Phase;
    use upscale_pipeline::ui::icons::{DONE_MARK, FAILED_MARK, PENDING_MARK};

    let config = Config::new(project_dir, cli.config.clone(), cli.verbose)?;
    let store = StateStore::open_read_only(config.state_file.clone());

    println!();
    println!("Pipeline Status");
    println!("===============");
    println!("State: {}", config.state_file.display());
    println!();

    let mut completed = 0;
    for phase in Phase::ALL {
        let status = store.status(phase.name());
        let (mark, text) = match &status {
            PhaseStatus::Completed => {
                completed += 1;
                (style(DONE_MARK.to_string()).green(), style(status.to_string()).green())
            }
            PhaseStatus::Failed(_) => (
                style(FAILED_MARK.to_string()).red(),
                style(status.to_string()).red(),
            ),
            PhaseStatus::NotRun => (
                style(PENDING_MARK.to_string()).dim(),
                style(status.to_string()).dim(),
            ),
        };
        println!("  {} {:<15} {}", mark, phase.name(), text);
    }

    println!();
    println!("{} of {} phases completed", completed, Phase::ALL.len());

    if let Ok(summary) = RunSummary::load(&config.paths.summary_file) {
        let finished = summary
            .finished_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unfinished".to_string());
        println!(
            "Last run: {} ({}{})",
            finished,
            summary.run_id,
            if summary.dry_run { ", dry run" } else { "" }
        );
    }
    println!();
    println!("Legend: {} completed | {} failed | {} not run", DONE_MARK, FAILED_MARK, PENDING_MARK);
    println!();
    Ok(())
}

pub fn cmd_reset(
    cli: &Cli,
    project_dir: PathBuf,
    phases: &[String],
    all: bool,
    force: bool,
) -> Result<()> {
    use dialoguer::Confirm;
    use upscale_pipeline::config::Config;
    use upscale_pipeline::orchestrator::StateStore;
    use upscale_pipeline::phase::Phase;

    if phases.is_empty() && !all {
        anyhow::bail!("Name the phases to reset, or pass --all");
    }
    for name in phases {
        name.parse::<Phase>()?;
    }

    let config = Config::new(project_dir, cli.config.clone(), cli.verbose)?;

    if !force {
        let prompt = if all {
            "This will reset the status of every phase. Are you sure?".to_string()
        } else {
            format!("Reset {}?", phases.join(", "))
        };
        let confirm = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirm {
            println!("Reset cancelled");
            return Ok(());
        }
    }

    let mut store = StateStore::open(config.state_file.clone(), &config.lock_file)?;
    if all {
        store.clear()?;
        println!("Reset all phases");
        return Ok(());
    }

    for name in phases {
        if store.delete(name)? {
            println!("Reset {}", name);
        } else {
            println!("{} had no recorded status", name);
        }
    }
    Ok(())
}
