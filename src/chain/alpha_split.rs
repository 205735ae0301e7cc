//! Pull the alpha channel out into its own 8-bit raster.

use std::path::Path;

use image::{DynamicImage, GrayImage, Luma};

use crate::errors::PipelineError;
use crate::raster::{self, BatchOptions, BatchReport, FileOutcome};

/// Alpha as an 8-bit grayscale raster; fully opaque when the image has none.
pub fn split_alpha(img: &DynamicImage) -> GrayImage {
    if !img.color().has_alpha() {
        return GrayImage::from_pixel(img.width(), img.height(), Luma([255]));
    }
    let rgba = img.to_rgba8();
    GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        Luma([rgba.get_pixel(x, y)[3]])
    })
}

pub fn run(input_dir: &Path, output_dir: &Path, opts: &BatchOptions) -> Result<BatchReport, PipelineError> {
    raster::for_each_raster("alpha_split", input_dir, output_dir, opts, |input, output| {
        let img = raster::load(input)?;
        raster::save(&DynamicImage::ImageLuma8(split_alpha(&img)), output)?;
        Ok(FileOutcome::Written)
    })
}
