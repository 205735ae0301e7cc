//! Asset phases ahead of and after the alpha chain.
//!
//! | Module | Phase | Tools |
//! |--------|-------|-------|
//! | `game_files` | `game_files` | `innoextract` for installers |
//! | `extract` | `extract` | `kextract` |
//! | `convert` | `convert` | `art2img`, `ffmpeg`, `fluidsynth` |
//! | `package` | `generate_mod` | none |

pub mod convert;
pub mod extract;
pub mod game_files;
pub mod package;

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::PipelineError;

/// True when `dir` exists and holds at least one entry.
pub fn has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Regular files directly inside `dir`, sorted by path.
pub fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Copy everything under `src` into `dest`, preserving relative layout.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<usize, PipelineError> {
    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            PipelineError::io(path, e.into())
        })?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| PipelineError::io(&target, e))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
            }
            std::fs::copy(entry.path(), &target).map_err(|e| PipelineError::io(&target, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}
