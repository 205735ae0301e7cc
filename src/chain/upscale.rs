//! Colour upscale through the enhancer, with alpha kept off the model path.
//!
//! For images with transparency the RGB plane goes through the enhancer
//! while the alpha plane is resized with Lanczos at the same scale; the two
//! are merged only after both finish.

use std::path::Path;

use image::{DynamicImage, RgbImage};
use tracing::debug;

use crate::chain::alpha_split::split_alpha;
use crate::chain::alpha_upscale::upscale_alpha;
use crate::chain::recombine::recombine;
use crate::enhance::Enhancer;
use crate::errors::PipelineError;
use crate::raster::{self, BatchOptions, BatchReport, FileOutcome, file_name};
use crate::retry::RetryPolicy;

pub async fn upscale_image(
    img: &DynamicImage,
    scale: u32,
    enhancer: &dyn Enhancer,
) -> Result<DynamicImage, PipelineError> {
    if !img.color().has_alpha() {
        let rgb = enhancer.enhance(&img.to_rgb8(), scale).await?;
        return Ok(DynamicImage::ImageRgb8(rgb));
    }

    let rgb: RgbImage = img.to_rgb8();
    let alpha = split_alpha(img);

    let rgb_up = enhancer.enhance(&rgb, scale).await?;
    let alpha_up = upscale_alpha(&alpha, scale);

    Ok(DynamicImage::ImageRgba8(recombine(
        &DynamicImage::ImageRgb8(rgb_up),
        &alpha_up,
    )))
}

async fn upscale_file(
    input: &Path,
    output: &Path,
    scale: u32,
    enhancer: &dyn Enhancer,
) -> Result<FileOutcome, PipelineError> {
    let img = raster::load(input)?;
    let upscaled = upscale_image(&img, scale, enhancer).await?;
    raster::save(&upscaled, output)?;
    Ok(FileOutcome::Written)
}

/// Upscale every raster in `input_dir`, retrying each file under `retry`.
///
/// With `skip_existing`, files whose output is already present are reported
/// as skipped without touching the enhancer.
pub async fn run(
    input_dir: &Path,
    output_dir: &Path,
    scale: u32,
    skip_existing: bool,
    enhancer: &dyn Enhancer,
    retry: &RetryPolicy,
    opts: &BatchOptions,
) -> Result<BatchReport, PipelineError> {
    let inputs = raster::list_rasters(input_dir, &opts.extension)?;
    raster::ensure_dir(output_dir)?;
    opts.progress.set_length(inputs.len() as u64);

    let mut report = BatchReport::new("upscale");
    for input in &inputs {
        opts.cancel.check()?;
        let name = file_name(input);
        let output = output_dir.join(&name);

        let result = if skip_existing && output.is_file() {
            debug!(file = %name, "output exists, skipping");
            Ok(FileOutcome::Skipped)
        } else {
            let (input, output) = (input.as_path(), output.as_path());
            retry
                .execute(&name, || async move {
                    upscale_file(input, output, scale, enhancer).await
                })
                .await
        };
        report.record(input, result);
        opts.progress.set_message(name);
        opts.progress.inc(1);
    }
    opts.progress.finish_and_clear();

    report.finish(&opts.policy)
}
