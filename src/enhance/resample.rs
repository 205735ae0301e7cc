use async_trait::async_trait;
use image::{RgbImage, imageops::FilterType};

use super::Enhancer;
use crate::errors::PipelineError;

/// In-process Lanczos resampling. No model, no device.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResampleEnhancer;

#[async_trait]
impl Enhancer for ResampleEnhancer {
    fn name(&self) -> &str {
        "lanczos"
    }

    async fn prepare(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    async fn enhance(&self, rgb: &RgbImage, scale: u32) -> Result<RgbImage, PipelineError> {
        let (w, h) = rgb.dimensions();
        Ok(image::imageops::resize(
            rgb,
            w * scale,
            h * scale,
            FilterType::Lanczos3,
        ))
    }
}
