//! Locate the game data under `files/input` and stage it in `00_game`.
//!
//! Sources are tried in order: `duke3d_wt/` (World Tour), `duke3d/`, then a
//! GOG `setup_duke3d*.exe` installer unpacked with `innoextract`. A directory
//! only counts when it holds a `*.GRP` archive.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use glob::{Pattern, glob};
use tracing::info;
use walkdir::WalkDir;

use super::{copy_tree, has_entries};
use crate::config::PipelinePaths;
use crate::errors::PipelineError;
use crate::pipeline_config::ToolsConfig;
use crate::tools::ToolRunner;

const MAIN_GRP: &str = "DUKE3D.GRP";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameSource {
    WorldTour(PathBuf),
    Classic(PathBuf),
    Installer(PathBuf),
}

impl GameSource {
    pub fn path(&self) -> &Path {
        match self {
            GameSource::WorldTour(p) | GameSource::Classic(p) | GameSource::Installer(p) => p,
        }
    }
}

fn glob_in(dir: &Path, pattern: &str) -> Vec<PathBuf> {
    let full = format!("{}/{}", Pattern::escape(&dir.to_string_lossy()), pattern);
    let mut matches: Vec<PathBuf> = match glob(&full) {
        Ok(paths) => paths.filter_map(|entry| entry.ok()).collect(),
        Err(_) => Vec::new(),
    };
    matches.sort();
    matches
}

fn has_grp(dir: &Path) -> bool {
    dir.is_dir() && !glob_in(dir, "*.GRP").is_empty()
}

/// Find the highest-priority game source in `input_dir`.
pub fn detect(input_dir: &Path) -> Option<GameSource> {
    let wt = input_dir.join("duke3d_wt");
    if has_grp(&wt) {
        return Some(GameSource::WorldTour(wt));
    }
    let classic = input_dir.join("duke3d");
    if has_grp(&classic) {
        return Some(GameSource::Classic(classic));
    }
    glob_in(input_dir, "setup_duke3d*.exe")
        .into_iter()
        .next()
        .map(GameSource::Installer)
}

/// Unpack a GOG installer and return a directory holding its `DUKE3D.GRP`.
async fn unpack_installer(
    exe: &Path,
    input_dir: &Path,
    tools: &ToolsConfig,
    runner: &ToolRunner,
) -> Result<PathBuf, PipelineError> {
    let staging = input_dir.join("temp");
    std::fs::create_dir_all(&staging).map_err(|e| PipelineError::io(&staging, e))?;

    info!(installer = %exe.display(), "unpacking GOG installer");
    runner
        .run(
            &tools.innoextract,
            [
                OsStr::new("-q"),
                OsStr::new("-s"),
                OsStr::new("-d"),
                staging.as_os_str(),
                exe.as_os_str(),
            ],
        )
        .await?;

    let grp = WalkDir::new(&staging)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == MAIN_GRP)
        .ok_or_else(|| {
            PipelineError::Resource(format!("{MAIN_GRP} not found in unpacked installer"))
        })?;

    let game_dir = input_dir.join("duke3d");
    std::fs::create_dir_all(&game_dir).map_err(|e| PipelineError::io(&game_dir, e))?;
    let dest = game_dir.join(MAIN_GRP);
    std::fs::copy(grp.path(), &dest).map_err(|e| PipelineError::io(&dest, e))?;
    Ok(game_dir)
}

pub async fn run(
    paths: &PipelinePaths,
    tools: &ToolsConfig,
    runner: &ToolRunner,
) -> Result<(), PipelineError> {
    if has_entries(&paths.game_dir) {
        info!(dir = %paths.game_dir.display(), "game files already staged");
        return Ok(());
    }
    std::fs::create_dir_all(&paths.input_dir).map_err(|e| PipelineError::io(&paths.input_dir, e))?;

    let source = detect(&paths.input_dir).ok_or_else(|| {
        PipelineError::Resource(format!(
            "No game files found in {} (expected duke3d_wt/, duke3d/ or setup_duke3d*.exe)",
            paths.input_dir.display()
        ))
    })?;
    info!(source = ?source, "found game files");

    let source_dir = match &source {
        GameSource::WorldTour(dir) | GameSource::Classic(dir) => dir.clone(),
        GameSource::Installer(exe) => {
            unpack_installer(exe, &paths.input_dir, tools, runner).await?
        }
    };

    let copied = copy_tree(&source_dir, &paths.game_dir)?;
    if copied == 0 {
        return Err(PipelineError::Resource(format!(
            "Failed to stage game files into {}",
            paths.game_dir.display()
        )));
    }
    info!(files = copied, dir = %paths.game_dir.display(), "game files staged");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use std::time::Duration;
    use tempfile::tempdir;

    fn runner() -> ToolRunner {
        ToolRunner::new(Duration::from_secs(5), RetryPolicy::for_file())
    }

    #[test]
    fn test_world_tour_wins_over_classic() {
        let dir = tempdir().unwrap();
        for sub in ["duke3d_wt", "duke3d"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
            std::fs::write(dir.path().join(sub).join("DUKE3D.GRP"), "x").unwrap();
        }
        std::fs::write(dir.path().join("setup_duke3d_2.0.exe"), "x").unwrap();

        assert_eq!(
            detect(dir.path()),
            Some(GameSource::WorldTour(dir.path().join("duke3d_wt")))
        );
    }

    #[test]
    fn test_directory_without_grp_is_ignored() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("duke3d_wt")).unwrap();
        std::fs::write(dir.path().join("duke3d_wt/readme.txt"), "x").unwrap();
        std::fs::write(dir.path().join("setup_duke3d_2.0.exe"), "x").unwrap();

        let found = detect(dir.path()).unwrap();
        assert!(matches!(found, GameSource::Installer(_)));
        assert!(found.path().ends_with("setup_duke3d_2.0.exe"));
    }

    #[test]
    fn test_nothing_found() {
        let dir = tempdir().unwrap();
        assert_eq!(detect(dir.path()), None);
    }

    #[tokio::test]
    async fn test_run_copies_classic_directory() {
        let dir = tempdir().unwrap();
        let paths = PipelinePaths::new(dir.path());
        let classic = paths.input_dir.join("duke3d");
        std::fs::create_dir_all(&classic).unwrap();
        std::fs::write(classic.join("DUKE3D.GRP"), "grp").unwrap();

        run(&paths, &ToolsConfig::default(), &runner()).await.unwrap();
        assert!(paths.game_dir.join("DUKE3D.GRP").is_file());
    }

    #[tokio::test]
    async fn test_run_skips_when_already_staged() {
        let dir = tempdir().unwrap();
        let paths = PipelinePaths::new(dir.path());
        std::fs::create_dir_all(&paths.game_dir).unwrap();
        std::fs::write(paths.game_dir.join("DUKE3D.GRP"), "grp").unwrap();

        // No input directory at all; the staged copy is enough.
        run(&paths, &ToolsConfig::default(), &runner()).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_without_sources_is_resource_error() {
        let dir = tempdir().unwrap();
        let paths = PipelinePaths::new(dir.path());
        let err = run(&paths, &ToolsConfig::default(), &runner())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Resource(_)));
    }
}
