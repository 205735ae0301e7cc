use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::pipeline_config::PipelineToml;

/// Every directory and file the pipeline touches, resolved from one root.
///
/// Numeric prefixes encode stage order and are part of the on-disk contract
/// other tooling may inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePaths {
    pub root: PathBuf,
    pub input_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub game_dir: PathBuf,
    pub extract_dir: PathBuf,
    pub convert_dir: PathBuf,
    pub premultiply_dir: PathBuf,
    pub alpha_extract_dir: PathBuf,
    pub alpha_upscale_dir: PathBuf,
    pub upscale_dir: PathBuf,
    pub reattach_dir: PathBuf,
    pub scrub_dir: PathBuf,
    pub mod_dir: PathBuf,
    pub summary_file: PathBuf,
}

impl PipelinePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let files = root.join("files");
        let temp_dir = files.join("temp");
        let output_dir = files.join("output");

        Self {
            input_dir: files.join("input"),
            log_dir: temp_dir.join("logs"),
            game_dir: temp_dir.join("00_game"),
            extract_dir: temp_dir.join("10_extract"),
            convert_dir: temp_dir.join("20_convert"),
            premultiply_dir: temp_dir.join("21_premultiply").join("textures"),
            alpha_extract_dir: temp_dir.join("22_alpha_extract"),
            alpha_upscale_dir: temp_dir.join("23_alpha_upscale"),
            upscale_dir: temp_dir.join("30_upscale").join("textures"),
            reattach_dir: temp_dir.join("31_reattach").join("textures"),
            scrub_dir: output_dir.join("32_scrub").join("textures"),
            mod_dir: output_dir.join("mod"),
            summary_file: temp_dir.join("workflow_summary.json"),
            temp_dir,
            output_dir,
            root,
        }
    }

    pub fn textures_dir(&self) -> PathBuf {
        self.convert_dir.join("textures")
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.convert_dir.join("audio")
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.convert_dir.join("frames")
    }

    /// Resolve a configured path against the root unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

/// Runtime configuration built once at startup and passed to every component.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    /// `.pipeline/` holding config.toml, state.json and the state lock
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub state_file: PathBuf,
    pub lock_file: PathBuf,
    pub verbose: bool,
    pub settings: PipelineToml,
    pub paths: PipelinePaths,
}

impl Config {
    /// Resolve the project directory and load `.pipeline/config.toml`
    /// (or `config_file` when given).
    pub fn new(project_dir: PathBuf, config_file: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let config_dir = project_dir.join(".pipeline");
        let config_file =
            config_file.unwrap_or_else(|| config_dir.join(crate::pipeline_config::CONFIG_FILE_NAME));

        let settings = if config_file.exists() {
            PipelineToml::load(&config_file)?
        } else {
            PipelineToml::default()
        };

        Ok(Self::from_settings(project_dir, config_file, settings, verbose))
    }

    pub fn from_settings(
        project_dir: PathBuf,
        config_file: PathBuf,
        settings: PipelineToml,
        verbose: bool,
    ) -> Self {
        let config_dir = project_dir.join(".pipeline");
        let root = match &settings.paths.root {
            Some(root) if root.is_absolute() => root.clone(),
            Some(root) => project_dir.join(root),
            None => project_dir.clone(),
        };

        Self {
            state_file: config_dir.join("state.json"),
            lock_file: config_dir.join("state.lock"),
            paths: PipelinePaths::new(root),
            project_dir,
            config_dir,
            config_file,
            verbose,
            settings,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir).context("Failed to create .pipeline directory")?;
        std::fs::create_dir_all(&self.paths.temp_dir).context("Failed to create temp directory")?;
        std::fs::create_dir_all(&self.paths.output_dir)
            .context("Failed to create output directory")?;
        std::fs::create_dir_all(&self.paths.log_dir).context("Failed to create log directory")?;
        Ok(())
    }

    pub fn model_dir(&self) -> PathBuf {
        self.paths.resolve(&self.settings.upscale.model_dir)
    }
}
