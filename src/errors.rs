//! Typed error hierarchy for the upscale pipeline.
//!
//! `PipelineError` covers every failure class the engine distinguishes:
//! - configuration and resource problems that stop a run before or at a phase
//! - dependency gating failures raised before anything executes
//! - transient vs permanent failures, which drive `RetryPolicy`
//! - verification failures that block packaging
//!
//! `ErrorKind` is the flat classification the retry layer matches against.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a `PipelineError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Resource,
    Dependency,
    Retryable,
    NonRetryable,
    Verification,
    Interrupted,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Resource => "resource",
            ErrorKind::Dependency => "dependency",
            ErrorKind::Retryable => "retryable",
            ErrorKind::NonRetryable => "non-retryable",
            ErrorKind::Verification => "verification",
            ErrorKind::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

/// A requested phase together with one prerequisite that is not completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmetDependency {
    pub phase: String,
    pub dependency: String,
}

impl std::fmt::Display for UnmetDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: missing {}", self.phase, self.dependency)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing resource: {0}")]
    Resource(String),

    #[error("Phase dependencies not satisfied: {}", format_unmet(.unmet))]
    Dependency { unmet: Vec<UnmetDependency> },

    #[error("Transient failure: {0}")]
    Retryable(String),

    #[error("Permanent failure: {0}")]
    NonRetryable(String),

    #[error("Pink artifacts detected in {} image(s): {}", .files.len(), .files.join(", "))]
    Verification { files: Vec<String> },

    #[error("No files succeeded in {stage}: {failed} of {total} failed")]
    Batch {
        stage: String,
        failed: usize,
        total: usize,
    },

    #[error("Interrupted by user")]
    Interrupted,

    #[error("Phase {phase} failed: {source}")]
    Phase {
        phase: String,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

fn format_unmet(unmet: &[UnmetDependency]) -> String {
    unmet
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }

    /// Wrap an error as the failure of a named phase.
    pub fn in_phase(self, phase: &str) -> Self {
        Self::Phase {
            phase: phase.to_string(),
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Resource(_) | Self::Batch { .. } => ErrorKind::Resource,
            Self::Dependency { .. } => ErrorKind::Dependency,
            Self::Retryable(_) => ErrorKind::Retryable,
            Self::NonRetryable(_) => ErrorKind::NonRetryable,
            Self::Verification { .. } => ErrorKind::Verification,
            Self::Interrupted => ErrorKind::Interrupted,
            Self::Phase { source, .. } => source.kind(),
            Self::Io { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound
                | std::io::ErrorKind::PermissionDenied
                | std::io::ErrorKind::InvalidInput
                | std::io::ErrorKind::InvalidData => ErrorKind::NonRetryable,
                _ => ErrorKind::Retryable,
            },
            Self::Image { source, .. } => match source {
                image::ImageError::IoError(_) | image::ImageError::Limits(_) => {
                    ErrorKind::Retryable
                }
                _ => ErrorKind::NonRetryable,
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }

    /// Names of the unmet dependencies, if this is a dependency failure.
    pub fn unmet_dependencies(&self) -> Vec<&str> {
        match self {
            Self::Dependency { unmet } => unmet.iter().map(|u| u.dependency.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}
