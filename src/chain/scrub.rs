//! Force transparent magenta pixels to black.

use std::path::Path;

use image::{DynamicImage, RgbaImage};
use tracing::debug;

use crate::chain::is_magenta;
use crate::errors::PipelineError;
use crate::raster::{self, BatchOptions, BatchReport, FileOutcome, file_name};

/// Zero the RGB of every alpha-0 magenta pixel. Returns how many changed.
///
/// Pixels with any coverage are visible content and are left alone.
pub fn scrub_rgba(img: &mut RgbaImage, tolerance: f64) -> usize {
    let mut cleaned = 0;
    for px in img.pixels_mut() {
        let [r, g, b, a] = px.0;
        if a == 0 && is_magenta([r, g, b], tolerance) {
            px.0 = [0, 0, 0, 0];
            cleaned += 1;
        }
    }
    cleaned
}

pub fn run(
    input_dir: &Path,
    output_dir: &Path,
    tolerance: f64,
    opts: &BatchOptions,
) -> Result<BatchReport, PipelineError> {
    raster::for_each_raster("scrub", input_dir, output_dir, opts, |input, output| {
        let img = raster::load(input)?;
        if !img.color().has_alpha() {
            std::fs::copy(input, output).map_err(|e| PipelineError::io(output, e))?;
            return Ok(FileOutcome::Written);
        }
        let mut rgba = img.to_rgba8();
        let cleaned = scrub_rgba(&mut rgba, tolerance);
        if cleaned > 0 {
            debug!(file = %file_name(input), pixels = cleaned, "scrubbed");
        }
        raster::save(&DynamicImage::ImageRgba8(rgba), output)?;
        Ok(FileOutcome::Written)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::verify::pink_pixel_count;
    use image::Rgba;
    use tempfile::tempdir;

    #[test]
    fn test_transparent_magenta_becomes_black() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 255, 0]));
        assert_eq!(scrub_rgba(&mut img, 0.08), 1);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_visible_magenta_is_untouched() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([255, 0, 255, 200]));
        assert_eq!(scrub_rgba(&mut img, 0.08), 0);
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 255, 200]);
    }

    #[test]
    fn test_scrubbed_output_passes_verification() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let mut img = RgbaImage::from_pixel(3, 3, Rgba([30, 60, 90, 255]));
        img.put_pixel(0, 0, Rgba([250, 5, 250, 0]));
        img.save(input.path().join("halo.png")).unwrap();

        run(input.path(), output.path(), 0.08, &BatchOptions::default()).unwrap();
        let cleaned = image::open(output.path().join("halo.png")).unwrap();
        assert_eq!(pink_pixel_count(&cleaned, 0.08), 0);
        assert_eq!(cleaned.to_rgba8().get_pixel(1, 1).0, [30, 60, 90, 255]);
    }
}
