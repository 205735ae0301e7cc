use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::sorted_files;
use crate::config::PipelinePaths;
use crate::errors::PipelineError;
use crate::phase::CancelFlag;
use crate::pipeline_config::PipelineToml;
use crate::raster::{self, file_name};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Written to `mod/manifest.json` describing what the mod folder holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModManifest {
    pub generated_at: DateTime<Utc>,
    pub scale: u32,
    pub backend: String,
    pub model: String,
    pub textures: Vec<String>,
    pub audio: Vec<String>,
}

impl ModManifest {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| PipelineError::NonRetryable(format!("Invalid manifest {}: {e}", path.display())))
    }
}

fn copy_into(files: &[std::path::PathBuf], dest: &Path, cancel: &CancelFlag) -> Result<Vec<String>, PipelineError> {
    raster::ensure_dir(dest)?;
    let mut names = Vec::with_capacity(files.len());
    for file in files {
        cancel.check()?;
        let name = file_name(file);
        let target = dest.join(&name);
        std::fs::copy(file, &target).map_err(|e| PipelineError::io(&target, e))?;
        debug!(file = %name, "packaged");
        names.push(name);
    }
    Ok(names)
}

/// Assemble `mod/hightile/{textures,audio}` and write the manifest.
///
/// Scrubbed textures are required; converted audio is optional.
pub fn run(
    paths: &PipelinePaths,
    settings: &PipelineToml,
    cancel: &CancelFlag,
) -> Result<ModManifest, PipelineError> {
    let textures = raster::list_rasters(&paths.scrub_dir, &settings.image.extension)?;
    let audio: Vec<_> = if paths.audio_dir().is_dir() {
        sorted_files(&paths.audio_dir())?
            .into_iter()
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
            })
            .collect()
    } else {
        Vec::new()
    };

    let hightile = paths.mod_dir.join("hightile");
    let manifest = ModManifest {
        generated_at: Utc::now(),
        scale: settings.upscale.scale,
        backend: settings.upscale.backend.to_string(),
        model: settings.upscale.model.clone(),
        textures: copy_into(&textures, &hightile.join("textures"), cancel)?,
        audio: copy_into(&audio, &hightile.join("audio"), cancel)?,
    };

    let manifest_path = paths.mod_dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| PipelineError::NonRetryable(format!("Failed to serialize manifest: {e}")))?;
    std::fs::write(&manifest_path, json).map_err(|e| PipelineError::io(&manifest_path, e))?;

    info!(
        dir = %paths.mod_dir.display(),
        textures = manifest.textures.len(),
        audio = manifest.audio.len(),
        "mod packaged"
    );
    Ok(manifest)
}
