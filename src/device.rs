//! Inference device detection.
//!
//! Queries `nvidia-smi` for GPU names. Any failure (binary missing, no GPUs,
//! timeout) falls back to the CPU descriptor rather than erroring.

use std::ffi::OsString;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::pipeline_config::DevicePreference;
use crate::tools;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceKind::Cpu => write!(f, "cpu"),
            DeviceKind::Gpu => write!(f, "gpu"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub kind: DeviceKind,
    pub name: String,
    pub count: usize,
}

impl DeviceInfo {
    pub fn cpu() -> Self {
        Self {
            kind: DeviceKind::Cpu,
            name: "CPU".to_string(),
            count: 1,
        }
    }

    pub fn is_gpu(&self) -> bool {
        self.kind == DeviceKind::Gpu
    }
}

const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Parse `nvidia-smi --query-gpu=name --format=csv,noheader` output.
pub fn parse_gpu_names(stdout: &str) -> Option<DeviceInfo> {
    let names: Vec<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let first = names.first()?;
    Some(DeviceInfo {
        kind: DeviceKind::Gpu,
        name: first.to_string(),
        count: names.len(),
    })
}

async fn query_gpu() -> Option<DeviceInfo> {
    let args: [OsString; 2] = ["--query-gpu=name".into(), "--format=csv,noheader".into()];
    match tools::run_once("nvidia-smi", &args, QUERY_TIMEOUT).await {
        Ok(out) => parse_gpu_names(&out.stdout),
        Err(e) => {
            debug!(error = %e, "GPU query failed");
            None
        }
    }
}

/// Resolve the device to run inference on.
pub async fn detect(preference: DevicePreference) -> DeviceInfo {
    match preference {
        DevicePreference::Cpu => DeviceInfo::cpu(),
        DevicePreference::Auto => query_gpu().await.unwrap_or_else(DeviceInfo::cpu),
        DevicePreference::Gpu => match query_gpu().await {
            Some(gpu) => gpu,
            None => {
                warn!("GPU requested but none detected, falling back to CPU");
                DeviceInfo::cpu()
            }
        },
    }
}
