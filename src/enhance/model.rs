use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::PipelineError;
use crate::retry::RetryPolicy;

/// ncnn model artifacts kept on disk, fetched on first use.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
    model: String,
    base_url: Option<String>,
    download_retry: RetryPolicy,
    load_retry: RetryPolicy,
}

impl ModelStore {
    pub fn new(dir: PathBuf, model: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            dir,
            model: model.into(),
            base_url,
            download_retry: RetryPolicy::for_model_download(),
            load_retry: RetryPolicy::for_model_load(),
        }
    }

    pub fn with_retry(mut self, download: RetryPolicy, load: RetryPolicy) -> Self {
        self.download_retry = download;
        self.load_retry = load;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_paths(&self) -> [PathBuf; 2] {
        [
            self.dir.join(format!("{}.param", self.model)),
            self.dir.join(format!("{}.bin", self.model)),
        ]
    }

    /// Download whatever is missing, then check both artifacts are usable.
    pub async fn ensure(&self) -> Result<(), PipelineError> {
        for path in self.artifact_paths() {
            if path.is_file() {
                debug!(path = %path.display(), "model artifact present");
                continue;
            }
            let Some(base) = &self.base_url else {
                return Err(PipelineError::NonRetryable(format!(
                    "Model artifact missing: {} (set upscale.model_base_url to download it)",
                    path.display()
                )));
            };
            let url = format!("{}/{}", base.trim_end_matches('/'), crate::raster::file_name(&path));
            self.download_retry
                .execute("model download", || download(&url, &path))
                .await?;
        }

        self.load_retry
            .execute("model load", || async { self.check_artifacts() })
            .await
    }

    fn check_artifacts(&self) -> Result<(), PipelineError> {
        for path in self.artifact_paths() {
            let meta = std::fs::metadata(&path).map_err(|e| PipelineError::io(&path, e))?;
            if meta.len() == 0 {
                return Err(PipelineError::NonRetryable(format!(
                    "Model artifact is empty: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

async fn download(url: &str, dest: &Path) -> Result<(), PipelineError> {
    info!(url, dest = %dest.display(), "downloading model artifact");

    let resp = reqwest::get(url)
        .await
        .map_err(|e| PipelineError::Retryable(format!("Request to {url} failed: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        let msg = format!("{url} returned {status}");
        return Err(
            if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                PipelineError::Retryable(msg)
            } else {
                PipelineError::NonRetryable(msg)
            },
        );
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| PipelineError::Retryable(format!("Reading body from {url} failed: {e}")))?;

    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| PipelineError::io(dir, e))?;
    tmp.write_all(&bytes)
        .map_err(|e| PipelineError::io(tmp.path(), e))?;
    tmp.persist(dest)
        .map_err(|e| PipelineError::io(dest, e.error))?;
    Ok(())
}
