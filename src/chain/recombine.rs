//! Merge enhanced colour with independently resized alpha, by filename.

use std::path::Path;

use image::{DynamicImage, GrayImage, Rgba, RgbaImage};
use tracing::warn;

use crate::chain::resize_alpha;
use crate::errors::PipelineError;
use crate::raster::{self, BatchOptions, BatchReport, FileOutcome, file_name};

/// Use `alpha` as the fourth channel of `color`.
///
/// If the sizes drifted apart the alpha raster is resized to the colour
/// raster with Lanczos first.
pub fn recombine(color: &DynamicImage, alpha: &GrayImage) -> RgbaImage {
    let rgb = color.to_rgb8();
    let (w, h) = rgb.dimensions();
    let resized;
    let alpha = if alpha.dimensions() == (w, h) {
        alpha
    } else {
        warn!(
            color = ?(w, h),
            alpha = ?alpha.dimensions(),
            "alpha size differs from colour, resizing"
        );
        resized = resize_alpha(alpha, w, h);
        &resized
    };

    RgbaImage::from_fn(w, h, |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Rgba([r, g, b, alpha.get_pixel(x, y).0[0]])
    })
}

pub fn run(
    color_dir: &Path,
    alpha_dir: &Path,
    output_dir: &Path,
    opts: &BatchOptions,
) -> Result<BatchReport, PipelineError> {
    raster::list_rasters(alpha_dir, &opts.extension)?;

    raster::for_each_raster("recombine", color_dir, output_dir, opts, |input, output| {
        let alpha_path = alpha_dir.join(file_name(input));
        if !alpha_path.is_file() {
            warn!(file = %file_name(input), "no matching alpha raster, skipping");
            return Ok(FileOutcome::Skipped);
        }
        let color = raster::load(input)?;
        let alpha = raster::load(&alpha_path)?.to_luma8();
        raster::save(&DynamicImage::ImageRgba8(recombine(&color, &alpha)), output)?;
        Ok(FileOutcome::Written)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::alpha_split::split_alpha;
    use crate::chain::alpha_upscale::upscale_alpha;
    use image::{Luma, Rgb, RgbImage};
    use tempfile::tempdir;

    #[test]
    fn test_split_then_recombine_reproduces_alpha() {
        let original = RgbaImage::from_fn(5, 4, |x, y| {
            Rgba([x as u8 * 40, y as u8 * 50, 7, ((x * 61 + y * 17) % 256) as u8])
        });
        let dynamic = DynamicImage::ImageRgba8(original.clone());
        let alpha = split_alpha(&dynamic);

        let merged = recombine(&dynamic, &alpha);
        let merged_alpha: Vec<u8> = merged.pixels().map(|p| p[3]).collect();
        let original_alpha: Vec<u8> = original.pixels().map(|p| p[3]).collect();
        assert_eq!(merged_alpha, original_alpha);
    }

    #[test]
    fn test_matching_sizes_need_no_resize() {
        let alpha = upscale_alpha(&GrayImage::from_fn(4, 4, |x, _| Luma([x as u8 * 60])), 4);
        let color = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([1, 2, 3])));

        let merged = recombine(&color, &alpha);
        assert_eq!(merged.dimensions(), (16, 16));
        for (x, y, px) in merged.enumerate_pixels() {
            assert_eq!(px[3], alpha.get_pixel(x, y)[0]);
        }
    }

    #[test]
    fn test_mismatched_alpha_is_resized_to_colour() {
        let alpha = GrayImage::from_pixel(8, 8, Luma([255]));
        let color = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 10, Rgb([0, 0, 0])));
        let merged = recombine(&color, &alpha);
        assert_eq!(merged.dimensions(), (12, 10));
        assert!(merged.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_run_skips_files_without_alpha_pair() {
        let color = tempdir().unwrap();
        let alpha = tempdir().unwrap();
        let output = tempdir().unwrap();
        RgbImage::from_pixel(2, 2, Rgb([5, 5, 5]))
            .save(color.path().join("paired.png"))
            .unwrap();
        RgbImage::from_pixel(2, 2, Rgb([5, 5, 5]))
            .save(color.path().join("orphan.png"))
            .unwrap();
        GrayImage::from_pixel(2, 2, Luma([9]))
            .save(alpha.path().join("paired.png"))
            .unwrap();

        let report = run(color.path(), alpha.path(), output.path(), &BatchOptions::default()).unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(report.skipped, 1);
        assert!(!output.path().join("orphan.png").exists());

        let merged = image::open(output.path().join("paired.png")).unwrap().to_rgba8();
        assert_eq!(merged.get_pixel(0, 0).0, [5, 5, 5, 9]);
    }

    #[test]
    fn test_empty_alpha_directory_is_resource_error() {
        let color = tempdir().unwrap();
        let alpha = tempdir().unwrap();
        let output = tempdir().unwrap();
        RgbImage::from_pixel(2, 2, Rgb([5, 5, 5]))
            .save(color.path().join("a.png"))
            .unwrap();

        let err = run(color.path(), alpha.path(), output.path(), &BatchOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Resource(_)));
        assert!(!output.path().join("a.png").exists());
    }

    #[test]
    fn test_missing_alpha_directory_is_resource_error() {
        let color = tempdir().unwrap();
        let output = tempdir().unwrap();
        RgbImage::from_pixel(2, 2, Rgb([5, 5, 5]))
            .save(color.path().join("a.png"))
            .unwrap();

        let err = run(
            color.path(),
            &color.path().join("no_alpha"),
            output.path(),
            &BatchOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Resource(_)));
    }
}
