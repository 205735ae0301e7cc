//! The alpha sanitization chain.
//!
//! Colour and transparency are never resampled together. Colour is
//! premultiplied so transparent pixels carry no stray RGB, alpha is split off
//! and resized on its own with Lanczos, colour goes through the enhancer, and
//! the two halves are merged by filename afterwards. `verify` and `scrub`
//! then catch any magenta halo that still leaked into transparent pixels.
//!
//! | Stage | Reads | Writes |
//! |-------|-------|--------|
//! | [`premultiply`] | converted textures | premultiplied textures |
//! | [`alpha_split`] | premultiplied textures | 8-bit alpha rasters |
//! | [`alpha_upscale`] | alpha rasters | resized alpha rasters |
//! | [`upscale`] | premultiplied textures | enhanced textures |
//! | [`recombine`] | enhanced textures + resized alpha | RGBA textures |
//! | [`verify`] | RGBA textures | report only |
//! | [`scrub`] | RGBA textures | sanitized textures |

pub mod alpha_split;
pub mod alpha_upscale;
pub mod premultiply;
pub mod recombine;
pub mod scrub;
pub mod upscale;
pub mod verify;

use image::{GrayImage, imageops::FilterType};

/// Whether an RGB triple sits in the magenta/pink halo direction.
///
/// Red and blue must exceed `(1 - t) * 255` while green stays below `t * 255`.
pub fn is_magenta(rgb: [u8; 3], tolerance: f64) -> bool {
    let high = (1.0 - tolerance) * 255.0;
    let low = tolerance * 255.0;
    let [r, g, b] = rgb.map(f64::from);
    r > high && b > high && g < low
}

/// Lanczos resize of a single-channel raster.
pub fn resize_alpha(alpha: &GrayImage, width: u32, height: u32) -> GrayImage {
    image::imageops::resize(alpha, width, height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magenta_classification() {
        assert!(is_magenta([255, 0, 255], 0.08));
        assert!(is_magenta([240, 15, 240], 0.08));
        assert!(!is_magenta([0, 0, 0], 0.08));
        assert!(!is_magenta([255, 255, 255], 0.08));
        assert!(!is_magenta([200, 0, 255], 0.08));
    }

    #[test]
    fn test_resize_alpha_exact_dimensions() {
        let alpha = GrayImage::from_pixel(3, 5, image::Luma([255]));
        let out = resize_alpha(&alpha, 12, 20);
        assert_eq!(out.dimensions(), (12, 20));
    }
}
