//! Shared raster I/O and per-file batch bookkeeping for the chain stages.
//!
//! Each stage reads every raster with one extension from an input
//! directory and writes a same-named file into an output directory. Files
//! are independent, so a failure on one is recorded in the `BatchReport`
//! and the stage moves on; whether the stage as a whole fails is decided
//! once at the end by [`BatchReport::finish`].

use std::path::{Path, PathBuf};

use image::DynamicImage;
use indicatif::ProgressBar;
use tracing::{debug, warn};

use crate::errors::PipelineError;
use crate::phase::CancelFlag;
use crate::pipeline_config::BatchConfig;

/// What happened to one input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Written,
    /// Output already present, or no counterpart to work with
    Skipped,
}

/// Per-stage knobs shared by every chain stage.
#[derive(Clone)]
pub struct BatchOptions {
    pub extension: String,
    pub policy: BatchConfig,
    pub cancel: CancelFlag,
    pub progress: ProgressBar,
}

impl BatchOptions {
    pub fn new(extension: impl Into<String>, policy: BatchConfig, cancel: CancelFlag) -> Self {
        Self {
            extension: extension.into(),
            policy,
            cancel,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::new("png", BatchConfig::default(), CancelFlag::default())
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub stage: String,
    pub written: usize,
    pub skipped: usize,
    pub failures: Vec<(String, PipelineError)>,
}

impl BatchReport {
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            written: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.written + self.skipped + self.failures.len()
    }

    pub fn record(&mut self, file: &Path, result: Result<FileOutcome, PipelineError>) {
        match result {
            Ok(FileOutcome::Written) => self.written += 1,
            Ok(FileOutcome::Skipped) => self.skipped += 1,
            Err(err) => self.failures.push((file_name(file), err)),
        }
    }

    /// Log failures and decide whether the stage failed.
    ///
    /// The first `max_reported_failures` failures are logged in full and the
    /// rest summarized. The stage fails only when nothing succeeded, unless
    /// `fail_on_any_error` is set.
    pub fn finish(self, policy: &BatchConfig) -> Result<Self, PipelineError> {
        if !self.failures.is_empty() {
            warn!(
                stage = %self.stage,
                failed = self.failures.len(),
                total = self.total(),
                "some files failed"
            );
            for (name, err) in self.failures.iter().take(policy.max_reported_failures) {
                warn!(stage = %self.stage, file = %name, error = %err, "file failed");
            }
            if self.failures.len() > policy.max_reported_failures {
                warn!(
                    stage = %self.stage,
                    "... and {} more",
                    self.failures.len() - policy.max_reported_failures
                );
            }
        }

        let succeeded = self.written + self.skipped;
        let failed = !self.failures.is_empty() && (succeeded == 0 || policy.fail_on_any_error);
        if failed {
            return Err(PipelineError::Batch {
                stage: self.stage.clone(),
                failed: self.failures.len(),
                total: self.total(),
            });
        }

        if self.written == 0 {
            warn!(stage = %self.stage, skipped = self.skipped, "stage wrote no output files");
        }
        Ok(self)
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Every file in `dir` with the given extension (case-insensitive), sorted.
///
/// A missing directory or one without matching files is a `Resource` error;
/// other files in the directory are ignored.
pub fn list_rasters(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, PipelineError> {
    if !dir.is_dir() {
        return Err(PipelineError::Resource(format!(
            "Input directory not found: {}",
            dir.display()
        )));
    }

    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_extension(path, extension))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(PipelineError::Resource(format!(
            "No .{} files in {}",
            extension,
            dir.display()
        )));
    }
    Ok(files)
}

pub fn load(path: &Path) -> Result<DynamicImage, PipelineError> {
    image::open(path).map_err(|e| PipelineError::image(path, e))
}

pub fn save(image: &DynamicImage, path: &Path) -> Result<(), PipelineError> {
    image.save(path).map_err(|e| PipelineError::image(path, e))
}

pub fn ensure_dir(dir: &Path) -> Result<(), PipelineError> {
    std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))
}

/// Apply `op` to every raster in `input_dir`, writing into `output_dir`.
///
/// `op` receives the input path and the same-named output path. The cancel
/// flag is checked between files.
pub fn for_each_raster<F>(
    stage: &str,
    input_dir: &Path,
    output_dir: &Path,
    opts: &BatchOptions,
    mut op: F,
) -> Result<BatchReport, PipelineError>
where
    F: FnMut(&Path, &Path) -> Result<FileOutcome, PipelineError>,
{
    let inputs = list_rasters(input_dir, &opts.extension)?;
    ensure_dir(output_dir)?;

    opts.progress.set_length(inputs.len() as u64);
    let mut report = BatchReport::new(stage);
    for input in &inputs {
        opts.cancel.check()?;
        let output = output_dir.join(file_name(input));
        let result = op(input, &output);
        if let Err(ref err) = result {
            debug!(stage, file = %input.display(), error = %err, "file failed");
        }
        report.record(input, result);
        opts.progress.inc(1);
    }
    opts.progress.finish_and_clear();

    report.finish(&opts.policy)
}
