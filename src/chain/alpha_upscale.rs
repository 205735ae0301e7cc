//! Resize alpha rasters with Lanczos, never through the enhancer.

use std::path::Path;

use image::{DynamicImage, GrayImage};

use crate::chain::resize_alpha;
use crate::errors::PipelineError;
use crate::raster::{self, BatchOptions, BatchReport, FileOutcome};

/// Resize to exactly `(width * scale, height * scale)`.
pub fn upscale_alpha(alpha: &GrayImage, scale: u32) -> GrayImage {
    let (w, h) = alpha.dimensions();
    resize_alpha(alpha, w * scale, h * scale)
}

pub fn run(
    input_dir: &Path,
    output_dir: &Path,
    scale: u32,
    opts: &BatchOptions,
) -> Result<BatchReport, PipelineError> {
    raster::for_each_raster("alpha_upscale", input_dir, output_dir, opts, |input, output| {
        let alpha = raster::load(input)?.to_luma8();
        raster::save(&DynamicImage::ImageLuma8(upscale_alpha(&alpha, scale)), output)?;
        Ok(FileOutcome::Written)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use tempfile::tempdir;

    #[test]
    fn test_scale_four_is_exact() {
        let alpha = GrayImage::from_pixel(7, 3, Luma([200]));
        assert_eq!(upscale_alpha(&alpha, 4).dimensions(), (28, 12));
    }

    #[test]
    fn test_uniform_alpha_stays_uniform() {
        let alpha = GrayImage::from_pixel(4, 4, Luma([255]));
        let out = upscale_alpha(&alpha, 2);
        assert!(out.pixels().all(|p| p.0 == [255]));
    }

    #[test]
    fn test_run_scales_every_file() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        GrayImage::from_pixel(5, 6, Luma([0]))
            .save(input.path().join("x.png"))
            .unwrap();

        run(input.path(), output.path(), 4, &BatchOptions::default()).unwrap();
        let out = image::open(output.path().join("x.png")).unwrap();
        assert_eq!((out.width(), out.height()), (20, 24));
    }
}
