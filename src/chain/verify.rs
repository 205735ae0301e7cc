//! Detect magenta halo pixels hiding under full transparency.
//!
//! Read-only: files are never modified here. Any flagged image fails the
//! phase so packaging never ships a haloed texture.

use std::path::Path;

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::chain::is_magenta;
use crate::errors::PipelineError;
use crate::raster::{self, BatchOptions, BatchReport, FileOutcome, file_name};

/// Pixels with alpha 0 whose RGB is magenta within `tolerance`.
///
/// Images without alpha have no transparent pixels and always pass.
pub fn pink_pixel_count(img: &DynamicImage, tolerance: f64) -> usize {
    if !img.color().has_alpha() {
        return 0;
    }
    img.to_rgba8()
        .pixels()
        .filter(|px| {
            let [r, g, b, a] = px.0;
            a == 0 && is_magenta([r, g, b], tolerance)
        })
        .count()
}

#[derive(Debug)]
pub struct VerifyReport {
    pub checked: usize,
    pub flagged: Vec<String>,
}

pub fn run(input_dir: &Path, tolerance: f64, opts: &BatchOptions) -> Result<VerifyReport, PipelineError> {
    let inputs = raster::list_rasters(input_dir, &opts.extension)?;
    opts.progress.set_length(inputs.len() as u64);

    let mut batch = BatchReport::new("verify");
    let mut flagged = Vec::new();
    for input in &inputs {
        opts.cancel.check()?;
        let result = raster::load(input).map(|img| {
            let count = pink_pixel_count(&img, tolerance);
            if count > 0 {
                warn!(file = %file_name(input), pixels = count, "pink pixels under transparency");
                flagged.push(file_name(input));
            } else {
                debug!(file = %file_name(input), "clean");
            }
            FileOutcome::Written
        });
        batch.record(input, result);
        opts.progress.inc(1);
    }
    opts.progress.finish_and_clear();

    let batch = batch.finish(&opts.policy)?;
    if !flagged.is_empty() {
        return Err(PipelineError::Verification { files: flagged });
    }

    info!(checked = batch.written, "no pink artifacts found");
    Ok(VerifyReport {
        checked: batch.written,
        flagged,
    })
}
