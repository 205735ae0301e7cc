//! The super-resolution capability: `enhance(rgb, scale) -> rgb`.
//!
//! Backends are selected by `upscale.backend`. `ncnn` drives an external
//! Real-ESRGAN binary; `lanczos` resamples in-process and needs nothing
//! installed.

mod model;
mod ncnn;
mod resample;

pub use model::ModelStore;
pub use ncnn::NcnnEnhancer;
pub use resample::ResampleEnhancer;

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;

use crate::config::Config;
use crate::device::DeviceInfo;
use crate::errors::PipelineError;
use crate::pipeline_config::EnhanceBackend;

#[async_trait]
pub trait Enhancer: Send + Sync {
    fn name(&self) -> &str;

    /// Make the model usable: fetch and check artifacts, probe the device.
    async fn prepare(&self) -> Result<(), PipelineError>;

    /// Upscale a colour-only raster by an integer factor.
    ///
    /// Transient device or I/O failures are `Retryable`; a missing model or
    /// binary is `NonRetryable`.
    async fn enhance(&self, rgb: &RgbImage, scale: u32) -> Result<RgbImage, PipelineError>;
}

/// Build the configured backend.
pub fn build_enhancer(config: &Config, device: &DeviceInfo) -> Arc<dyn Enhancer> {
    match config.settings.upscale.backend {
        EnhanceBackend::Lanczos => Arc::new(ResampleEnhancer),
        EnhanceBackend::Ncnn => Arc::new(NcnnEnhancer::from_config(config, device)),
    }
}

/// Reject backend output whose size is not exactly `scale` times the input.
pub(crate) fn check_dimensions(
    input: &RgbImage,
    output: &RgbImage,
    scale: u32,
) -> Result<(), PipelineError> {
    let expected = (input.width() * scale, input.height() * scale);
    if output.dimensions() != expected {
        return Err(PipelineError::NonRetryable(format!(
            "Enhancer returned {}x{}, expected {}x{}",
            output.width(),
            output.height(),
            expected.0,
            expected.1
        )));
    }
    Ok(())
}
