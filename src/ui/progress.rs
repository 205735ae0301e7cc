use crate::ui::icons::{CHECK, CLOCK, CROSS, SKIP, SPARKLE};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Terminal UI for a pipeline run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Phase bar: how many requested phases have finished
/// - Stage bar: per-file progress inside the running phase, replaced per phase
///
/// Both render through one `MultiProgress`, so log lines printed with
/// [`Self::print_line`] never tear the bars.
pub struct PipelineUI {
    multi: MultiProgress,
    phase_bar: ProgressBar,
    /// Stage bars of the running phase, cleared when the phase ends
    stage_bars: Mutex<Vec<ProgressBar>>,
    verbose: bool,
}

impl PipelineUI {
    /// Create the UI for a run of `total_phases` phases.
    pub fn new(total_phases: u64, verbose: bool) -> Self {
        Self::with_target(total_phases, verbose, ProgressDrawTarget::stderr())
    }

    /// A UI that draws nothing, for tests and non-interactive callers.
    pub fn hidden() -> Self {
        Self::with_target(0, false, ProgressDrawTarget::hidden())
    }

    fn with_target(total_phases: u64, verbose: bool, target: ProgressDrawTarget) -> Self {
        let multi = MultiProgress::with_draw_target(target);

        let phase_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let phase_bar = multi.add(ProgressBar::new(total_phases));
        phase_bar.set_style(phase_style);
        phase_bar.set_prefix("Phases");

        Self {
            multi,
            phase_bar,
            stage_bars: Mutex::new(Vec::new()),
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    pub fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn set_phase_count(&self, total: u64) {
        self.phase_bar.set_length(total);
    }

    pub fn start_phase(&self, phase: &str, description: &str) {
        self.phase_bar
            .set_message(format!("{}: {}", style(phase).yellow(), description));
        if self.verbose {
            self.print_line(format!(
                "{} {}",
                style("▶").green().bold(),
                style(phase).yellow().bold()
            ));
        }
    }

    /// Add a per-file bar for the running stage.
    ///
    /// The stage finishes it on success; any bar still open when the phase
    /// completes or fails is cleared then.
    pub fn stage_bar(&self, stage: &str, total: u64) -> ProgressBar {
        let stage_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.green/white}] {pos}/{len} {wide_msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("=>-");

        let bar = self.multi.add(ProgressBar::new(total));
        bar.set_style(stage_style);
        bar.set_prefix(format!("{:>7}", stage));
        if let Ok(mut bars) = self.stage_bars.lock() {
            bars.push(bar.clone());
        }
        bar
    }

    fn clear_stage_bars(&self) {
        let Ok(mut bars) = self.stage_bars.lock() else {
            return;
        };
        for bar in bars.drain(..) {
            if !bar.is_finished() {
                bar.finish_and_clear();
            }
            self.multi.remove(&bar);
        }
    }

    pub fn phase_complete(&self, phase: &str, elapsed: Duration) {
        self.clear_stage_bars();
        self.phase_bar.inc(1);
        self.print_line(format!(
            "{} {} {}",
            CHECK,
            style(phase).green().bold(),
            style(format!("{}{}", CLOCK, format_elapsed(elapsed))).dim()
        ));
    }

    pub fn phase_skipped(&self, phase: &str, reason: &str) {
        self.phase_bar.inc(1);
        self.print_line(format!(
            "{} {} {}",
            SKIP,
            style(phase).dim(),
            style(format!("({})", reason)).dim()
        ));
    }

    pub fn phase_failed(&self, phase: &str, reason: &str) {
        self.clear_stage_bars();
        self.print_line(format!(
            "{} {} failed: {}",
            CROSS,
            style(phase).red().bold(),
            reason
        ));
    }

    /// Stop the phase bar with a closing message.
    pub fn finish(&self, success: bool) {
        self.clear_stage_bars();
        let msg = if success {
            format!("{} pipeline finished", SPARKLE)
        } else {
            format!("{} pipeline stopped", CROSS)
        };
        self.phase_bar.finish_with_message(msg);
    }
}

/// Formats as `Xs` or `Xm Ys` when >= 60 seconds.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}
