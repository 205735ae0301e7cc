//! Scale colour by coverage so fully transparent pixels become black.

use std::path::Path;

use image::{DynamicImage, RgbaImage};

use crate::errors::PipelineError;
use crate::raster::{self, BatchOptions, BatchReport, FileOutcome};

/// `round(c * a / 255)` in integer arithmetic.
///
/// `c * a / 255` never lands exactly on .5, so adding 127 rounds to nearest.
pub fn premultiply_channel(c: u8, a: u8) -> u8 {
    ((u16::from(c) * u16::from(a) + 127) / 255) as u8
}

pub fn premultiply_rgba(mut img: RgbaImage) -> RgbaImage {
    for px in img.pixels_mut() {
        let a = px[3];
        for c in 0..3 {
            px[c] = premultiply_channel(px[c], a);
        }
    }
    img
}

/// Premultiply images that carry alpha. Returns `None` for images without
/// an alpha channel, which pass through unchanged.
pub fn premultiply(img: &DynamicImage) -> Option<RgbaImage> {
    img.color()
        .has_alpha()
        .then(|| premultiply_rgba(img.to_rgba8()))
}

fn process_file(input: &Path, output: &Path) -> Result<FileOutcome, PipelineError> {
    let img = raster::load(input)?;
    match premultiply(&img) {
        Some(rgba) => raster::save(&DynamicImage::ImageRgba8(rgba), output)?,
        None => {
            std::fs::copy(input, output).map_err(|e| PipelineError::io(output, e))?;
        }
    }
    Ok(FileOutcome::Written)
}

pub fn run(input_dir: &Path, output_dir: &Path, opts: &BatchOptions) -> Result<BatchReport, PipelineError> {
    raster::for_each_raster("premultiply", input_dir, output_dir, opts, process_file)
}
