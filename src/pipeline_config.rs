//! Pipeline configuration read from `.pipeline/config.toml`.
//!
//! Every section rejects unknown keys, so typos fail validation before any
//! phase runs instead of being silently ignored.
//!
//! # Configuration File Format
//!
//! ```toml
//! [upscale]
//! scale = 4
//! tile_size = 512
//! backend = "ncnn"
//! model = "realesrgan-x4plus"
//! device = "auto"
//!
//! [image]
//! alpha_upscale_method = "lanczos"
//!
//! [verify]
//! pink_tolerance = 0.08
//!
//! [scrub]
//! magenta_tolerance = 0.08
//!
//! [retry]
//! max_attempts = 2
//! initial_delay_ms = 1000
//! strategy = "fixed"
//!
//! [batch]
//! max_reported_failures = 5
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::PipelineError;
use crate::retry::{BackoffStrategy, RetryPolicy};

/// Real-ESRGAN model names the ncnn backend knows how to drive.
pub const KNOWN_MODELS: &[&str] = &[
    "realesrgan-x4plus",
    "realesrgan-x4plus-anime",
    "realesrgan-x2plus",
    "realesrgan-x2plus-anime",
];

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Which implementation of the enhancement capability to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnhanceBackend {
    /// External Real-ESRGAN ncnn binary
    #[default]
    Ncnn,
    /// Built-in Lanczos resampling, CPU only
    Lanczos,
}

impl std::fmt::Display for EnhanceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnhanceBackend::Ncnn => write!(f, "ncnn"),
            EnhanceBackend::Lanczos => write!(f, "lanczos"),
        }
    }
}

impl std::str::FromStr for EnhanceBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ncnn" => Ok(EnhanceBackend::Ncnn),
            "lanczos" => Ok(EnhanceBackend::Lanczos),
            _ => anyhow::bail!("Invalid backend '{}'. Valid values: ncnn, lanczos", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    #[default]
    Auto,
    Cpu,
    Gpu,
}

impl std::fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DevicePreference::Auto => write!(f, "auto"),
            DevicePreference::Cpu => write!(f, "cpu"),
            DevicePreference::Gpu => write!(f, "gpu"),
        }
    }
}

/// Resampling filter requested for the alpha path.
///
/// Reserved: the alpha path always resamples with Lanczos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlphaUpscaleMethod {
    #[default]
    Lanczos,
    Bicubic,
    Nearest,
}

impl std::fmt::Display for AlphaUpscaleMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlphaUpscaleMethod::Lanczos => write!(f, "lanczos"),
            AlphaUpscaleMethod::Bicubic => write!(f, "bicubic"),
            AlphaUpscaleMethod::Nearest => write!(f, "nearest"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpscaleConfig {
    #[serde(default = "default_scale")]
    pub scale: u32,
    /// Tiling hint passed through to the external model
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    #[serde(default)]
    pub backend: EnhanceBackend,
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    /// Base URL serving `<model>.param` and `<model>.bin`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_base_url: Option<String>,
    #[serde(default)]
    pub device: DevicePreference,
    #[serde(default = "default_upscale_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub skip_existing: bool,
}

fn default_scale() -> u32 {
    4
}

fn default_tile_size() -> u32 {
    512
}

fn default_binary() -> String {
    "realesrgan-ncnn-vulkan".to_string()
}

fn default_model() -> String {
    "realesrgan-x4plus".to_string()
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("files/models")
}

fn default_upscale_timeout() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

impl Default for UpscaleConfig {
    fn default() -> Self {
        Self {
            scale: default_scale(),
            tile_size: default_tile_size(),
            backend: EnhanceBackend::default(),
            binary: default_binary(),
            model: default_model(),
            model_dir: default_model_dir(),
            model_base_url: None,
            device: DevicePreference::default(),
            timeout_secs: default_upscale_timeout(),
            skip_existing: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageConfig {
    #[serde(default)]
    pub alpha_upscale_method: AlphaUpscaleMethod,
    /// Raster file extension every chain stage reads and writes
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    "png".to_string()
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            alpha_upscale_method: AlphaUpscaleMethod::default(),
            extension: default_extension(),
        }
    }
}

fn default_tolerance() -> f64 {
    0.08
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyConfig {
    #[serde(default = "default_tolerance")]
    pub pink_tolerance: f64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            pink_tolerance: default_tolerance(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScrubConfig {
    #[serde(default = "default_tolerance")]
    pub magenta_tolerance: f64,
}

impl Default for ScrubConfig {
    fn default() -> Self {
        Self {
            magenta_tolerance: default_tolerance(),
        }
    }
}

/// Per-file retry settings. Model download and load use fixed presets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_strategy")]
    pub strategy: BackoffStrategy,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_strategy() -> BackoffStrategy {
    BackoffStrategy::Fixed
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            strategy: default_strategy(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
            self.strategy,
            self.backoff_factor,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Failures logged in full before the rest are summarized
    #[serde(default = "default_max_reported_failures")]
    pub max_reported_failures: usize,
    /// Fail a stage on any per-file failure instead of only when nothing succeeded
    #[serde(default)]
    pub fail_on_any_error: bool,
}

fn default_max_reported_failures() -> usize {
    5
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_reported_failures: default_max_reported_failures(),
            fail_on_any_error: false,
        }
    }
}

/// External binaries used by the asset phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    #[serde(default = "default_kextract")]
    pub kextract: String,
    #[serde(default = "default_art2img")]
    pub art2img: String,
    #[serde(default = "default_innoextract")]
    pub innoextract: String,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_fluidsynth")]
    pub fluidsynth: String,
    #[serde(default = "default_soundfont")]
    pub soundfont: PathBuf,
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

fn default_kextract() -> String {
    "kextract".to_string()
}

fn default_art2img() -> String {
    "art2img".to_string()
}

fn default_innoextract() -> String {
    "innoextract".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_fluidsynth() -> String {
    "fluidsynth".to_string()
}

fn default_soundfont() -> PathBuf {
    PathBuf::from("files/soundfonts/Trevor0402_SC-55.sf2")
}

fn default_tool_timeout() -> u64 {
    300
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            kextract: default_kextract(),
            art2img: default_art2img(),
            innoextract: default_innoextract(),
            ffmpeg: default_ffmpeg(),
            fluidsynth: default_fluidsynth(),
            soundfont: default_soundfont(),
            timeout_secs: default_tool_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Root holding `files/`; defaults to the project directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

/// Top-level structure of `.pipeline/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineToml {
    #[serde(default)]
    pub upscale: UpscaleConfig,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
    #[serde(default)]
    pub scrub: ScrubConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl PipelineToml {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, PipelineError> {
        toml::from_str(content)
            .map_err(|e| PipelineError::Configuration(format!("Failed to parse config.toml: {e}")))
    }

    /// Load `<config_dir>/config.toml`, or defaults if it doesn't exist.
    pub fn load_or_default(config_dir: &Path) -> Result<Self, PipelineError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;
        let content = toml::to_string_pretty(self).context("Failed to serialize config.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Check every setting at once.
    ///
    /// Hard problems are collected into a single `Configuration` error;
    /// soft ones come back as warnings.
    pub fn validate(&self) -> Result<Vec<String>, PipelineError> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let up = &self.upscale;
        if up.scale == 0 {
            errors.push("upscale.scale must be a positive integer".to_string());
        } else if ![2, 4, 8].contains(&up.scale) {
            warnings.push(format!(
                "upscale.scale = {} is unusual; models are trained for 2, 4 or 8",
                up.scale
            ));
        }

        if up.tile_size == 0 {
            errors.push("upscale.tile_size must be a positive integer".to_string());
        } else if !(64..=1024).contains(&up.tile_size) {
            warnings.push(format!(
                "upscale.tile_size = {} is outside the recommended range 64..=1024",
                up.tile_size
            ));
        }

        if up.backend == EnhanceBackend::Ncnn {
            if !KNOWN_MODELS.contains(&up.model.as_str()) {
                errors.push(format!(
                    "upscale.model '{}' is not recognized. Valid models: {}",
                    up.model,
                    KNOWN_MODELS.join(", ")
                ));
            } else if let Some(native) = model_native_scale(&up.model)
                && native != up.scale
            {
                warnings.push(format!(
                    "upscale.model '{}' is a x{} model but upscale.scale = {}",
                    up.model, native, up.scale
                ));
            }
            if up.binary.trim().is_empty() {
                errors.push("upscale.binary must not be empty".to_string());
            }
        }

        if up.timeout_secs == 0 {
            errors.push("upscale.timeout_secs must be greater than zero".to_string());
        }

        if self.image.extension.trim().is_empty() {
            errors.push("image.extension must not be empty".to_string());
        }
        if self.image.alpha_upscale_method != AlphaUpscaleMethod::Lanczos {
            warnings.push(format!(
                "image.alpha_upscale_method = '{}' is reserved; alpha is always resampled with lanczos",
                self.image.alpha_upscale_method
            ));
        }

        for (key, value) in [
            ("verify.pink_tolerance", self.verify.pink_tolerance),
            ("scrub.magenta_tolerance", self.scrub.magenta_tolerance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{key} must be within [0, 1], got {value}"));
            }
        }

        if self.retry.max_attempts == 0 {
            errors.push("retry.max_attempts must be at least 1".to_string());
        }
        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor <= 0.0 {
            errors.push(format!(
                "retry.backoff_factor must be a finite number greater than zero, got {}",
                self.retry.backoff_factor
            ));
        }

        if self.tools.timeout_secs == 0 {
            errors.push("tools.timeout_secs must be greater than zero".to_string());
        }

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(PipelineError::Configuration(errors.join("; ")))
        }
    }
}

/// Scale a known model was trained for, parsed from its `-xN` infix.
pub fn model_native_scale(model: &str) -> Option<u32> {
    model
        .split('-')
        .find_map(|part| part.strip_prefix('x'))
        .and_then(|rest| rest.chars().next())
        .and_then(|c| c.to_digit(10))
}
