use std::ffi::OsString;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use tracing::debug;

use super::{Enhancer, ModelStore, check_dimensions};
use crate::config::Config;
use crate::device::DeviceInfo;
use crate::errors::PipelineError;
use crate::tools;

/// Drives a Real-ESRGAN ncnn-vulkan style binary one image at a time.
///
/// Each call writes the input to a scratch directory, runs
/// `<binary> -i in.png -o out.png -s <scale> -t <tile> -n <model> -m <dir>`
/// and reads the result back.
#[derive(Debug, Clone)]
pub struct NcnnEnhancer {
    binary: String,
    model: String,
    tile_size: u32,
    gpu_id: Option<u32>,
    timeout: Duration,
    store: ModelStore,
}

impl NcnnEnhancer {
    pub fn new(
        binary: impl Into<String>,
        store: ModelStore,
        model: impl Into<String>,
        tile_size: u32,
        gpu_id: Option<u32>,
        timeout: Duration,
    ) -> Self {
        Self {
            binary: binary.into(),
            model: model.into(),
            tile_size,
            gpu_id,
            timeout,
            store,
        }
    }

    pub fn from_config(config: &Config, device: &DeviceInfo) -> Self {
        let up = &config.settings.upscale;
        Self::new(
            up.binary.clone(),
            ModelStore::new(config.model_dir(), up.model.clone(), up.model_base_url.clone()),
            up.model.clone(),
            up.tile_size,
            device.is_gpu().then_some(0),
            Duration::from_secs(up.timeout_secs),
        )
    }

    /// Command-line arguments for one invocation.
    pub fn args(&self, input: &std::path::Path, output: &std::path::Path, scale: u32) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-i".into(),
            input.into(),
            "-o".into(),
            output.into(),
            "-s".into(),
            scale.to_string().into(),
            "-t".into(),
            self.tile_size.to_string().into(),
            "-n".into(),
            self.model.clone().into(),
            "-m".into(),
            self.store.dir().into(),
        ];
        if let Some(id) = self.gpu_id {
            args.push("-g".into());
            args.push(id.to_string().into());
        }
        args
    }
}

#[async_trait]
impl Enhancer for NcnnEnhancer {
    fn name(&self) -> &str {
        "ncnn"
    }

    async fn prepare(&self) -> Result<(), PipelineError> {
        self.store.ensure().await
    }

    async fn enhance(&self, rgb: &RgbImage, scale: u32) -> Result<RgbImage, PipelineError> {
        let scratch = tempfile::tempdir()
            .map_err(|e| PipelineError::Retryable(format!("Failed to create scratch dir: {e}")))?;
        let input = scratch.path().join("in.png");
        let output = scratch.path().join("out.png");

        DynamicImage::ImageRgb8(rgb.clone())
            .save(&input)
            .map_err(|e| PipelineError::image(&input, e))?;

        let args = self.args(&input, &output, scale);
        tools::run_once(&self.binary, &args, self.timeout).await?;

        if !output.is_file() {
            return Err(PipelineError::Retryable(format!(
                "{} produced no output image",
                self.binary
            )));
        }
        let upscaled = image::open(&output)
            .map_err(|e| PipelineError::image(&output, e))?
            .to_rgb8();
        check_dimensions(rgb, &upscaled, scale)?;
        debug!(
            from = ?rgb.dimensions(),
            to = ?upscaled.dimensions(),
            "ncnn enhance complete"
        );
        Ok(upscaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use std::path::{Path, PathBuf};

    fn enhancer(binary: &str, gpu: Option<u32>) -> NcnnEnhancer {
        NcnnEnhancer::new(
            binary,
            ModelStore::new(PathBuf::from("/models"), "realesrgan-x4plus", None),
            "realesrgan-x4plus",
            256,
            gpu,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_args_include_model_scale_and_tile() {
        let args = enhancer("realesrgan-ncnn-vulkan", None).args(
            Path::new("/tmp/in.png"),
            Path::new("/tmp/out.png"),
            4,
        );
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-i", "/tmp/in.png", "-o", "/tmp/out.png", "-s", "4", "-t", "256", "-n",
                "realesrgan-x4plus", "-m", "/models"
            ]
        );
    }

    #[test]
    fn test_gpu_id_is_passed_when_present() {
        let args = enhancer("x", Some(0)).args(Path::new("a"), Path::new("b"), 2);
        let tail: Vec<String> = args[args.len() - 2..]
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(tail, vec!["-g", "0"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_permanent() {
        let rgb = RgbImage::new(2, 2);
        let err = enhancer("no-such-esrgan-binary-91c2", None)
            .enhance(&rgb, 4)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NonRetryable);
    }
}
