//! Convert extracted game assets into formats the rest of the pipeline reads.
//!
//! | Source | Tool | Output |
//! |--------|------|--------|
//! | `*.art`, `TILES*` | `art2img -i <art> -o <dir>` | `20_convert/textures/*.png` |
//! | `*.voc` | `ffmpeg -i <voc> -y <wav>` | `20_convert/audio/*.wav` |
//! | `*.mid` | `fluidsynth -F <wav> <soundfont> <mid>` | `20_convert/audio/*.wav` |
//! | `*.anm` | `ffmpeg -i <anm> -y frame_%04d.png` | `20_convert/frames/<name>/` |

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{has_entries, sorted_files};
use crate::config::PipelinePaths;
use crate::errors::PipelineError;
use crate::pipeline_config::ToolsConfig;
use crate::raster::{BatchOptions, BatchReport, FileOutcome, file_name};
use crate::tools::ToolRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Art,
    Voc,
    Midi,
    Anm,
}

/// Classify an extracted file by name; `None` means it is not converted.
pub fn classify(name: &str) -> Option<AssetKind> {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".art") || lower.starts_with("tiles") {
        Some(AssetKind::Art)
    } else if lower.ends_with(".voc") {
        Some(AssetKind::Voc)
    } else if lower.ends_with(".mid") {
        Some(AssetKind::Midi)
    } else if lower.ends_with(".anm") {
        Some(AssetKind::Anm)
    } else {
        None
    }
}

/// A single tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub program: String,
    pub args: Vec<OsString>,
    /// Directory the output lands in, created before running
    pub out_dir: PathBuf,
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name(path))
}

pub fn conversion(
    kind: AssetKind,
    input: &Path,
    paths: &PipelinePaths,
    tools: &ToolsConfig,
) -> Conversion {
    match kind {
        AssetKind::Art => {
            let out_dir = paths.textures_dir();
            Conversion {
                program: tools.art2img.clone(),
                args: vec!["-i".into(), input.into(), "-o".into(), out_dir.clone().into()],
                out_dir,
            }
        }
        AssetKind::Voc => {
            let out_dir = paths.audio_dir();
            let wav = out_dir.join(format!("{}.wav", stem(input)));
            Conversion {
                program: tools.ffmpeg.clone(),
                args: vec!["-i".into(), input.into(), "-y".into(), wav.into()],
                out_dir,
            }
        }
        AssetKind::Midi => {
            let out_dir = paths.audio_dir();
            let wav = out_dir.join(format!("{}.wav", stem(input)));
            Conversion {
                program: tools.fluidsynth.clone(),
                args: vec![
                    "-F".into(),
                    wav.into(),
                    paths.resolve(&tools.soundfont).into(),
                    input.into(),
                ],
                out_dir,
            }
        }
        AssetKind::Anm => {
            let out_dir = paths.frames_dir().join(stem(input));
            let pattern = out_dir.join("frame_%04d.png");
            Conversion {
                program: tools.ffmpeg.clone(),
                args: vec!["-i".into(), input.into(), "-y".into(), pattern.into()],
                out_dir,
            }
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConvertReport {
    pub textures: usize,
    pub audio: usize,
    pub animations: usize,
}

pub async fn run(
    paths: &PipelinePaths,
    tools: &ToolsConfig,
    runner: &ToolRunner,
    opts: &BatchOptions,
) -> Result<ConvertReport, PipelineError> {
    if !has_entries(&paths.extract_dir) {
        return Err(PipelineError::Resource(format!(
            "Missing extracted files in {}",
            paths.extract_dir.display()
        )));
    }

    let inputs: Vec<(PathBuf, AssetKind)> = sorted_files(&paths.extract_dir)?
        .into_iter()
        .filter_map(|path| classify(&file_name(&path)).map(|kind| (path, kind)))
        .collect();
    if !inputs.iter().any(|(_, kind)| *kind == AssetKind::Art) {
        warn!(dir = %paths.extract_dir.display(), "no ART files found");
    }
    info!(files = inputs.len(), "converting assets");

    let soundfont = paths.resolve(&tools.soundfont);
    opts.progress.set_length(inputs.len() as u64);
    let mut batch = BatchReport::new("convert");
    let mut report = ConvertReport::default();

    for (input, kind) in &inputs {
        opts.cancel.check()?;
        let result = if *kind == AssetKind::Midi && !soundfont.is_file() {
            Err(PipelineError::NonRetryable(format!(
                "Soundfont not found: {}",
                soundfont.display()
            )))
        } else {
            convert_one(*kind, input, paths, tools, runner).await
        };
        if result.is_ok() {
            match kind {
                AssetKind::Art => report.textures += 1,
                AssetKind::Voc | AssetKind::Midi => report.audio += 1,
                AssetKind::Anm => report.animations += 1,
            }
        }
        batch.record(input, result);
        opts.progress.inc(1);
    }
    opts.progress.finish_and_clear();
    batch.finish(&opts.policy)?;

    if report.textures > 0 && !has_entries(&paths.textures_dir()) {
        return Err(PipelineError::Resource(format!(
            "{} produced no textures in {}",
            tools.art2img,
            paths.textures_dir().display()
        )));
    }
    Ok(report)
}

async fn convert_one(
    kind: AssetKind,
    input: &Path,
    paths: &PipelinePaths,
    tools: &ToolsConfig,
    runner: &ToolRunner,
) -> Result<FileOutcome, PipelineError> {
    let job = conversion(kind, input, paths, tools);
    std::fs::create_dir_all(&job.out_dir).map_err(|e| PipelineError::io(&job.out_dir, e))?;
    runner.run(&job.program, &job.args).await?;
    debug!(file = %file_name(input), ?kind, "converted");
    Ok(FileOutcome::Written)
}
