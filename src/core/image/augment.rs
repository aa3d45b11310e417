//! Random augmentation chain used by the balancer.
//!
//! The chain is fixed: rotate, optionally mirror, then scale brightness and
//! contrast. Parameters are drawn once per invocation from the caller's RNG.

use image::{imageops, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use rand::Rng;

use crate::config::AugmentationConfig;

/// One concrete draw of augmentation parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugmentParams {
    /// Counter-clockwise rotation in whole degrees
    pub rotation_degrees: i32,
    pub flip_horizontal: bool,
    pub brightness: f32,
    pub contrast: f32,
}

impl AugmentParams {
    /// Draw a fresh parameter set, in chain order
    pub fn sample<R: Rng + ?Sized>(rng: &mut R, config: &AugmentationConfig) -> Self {
        let max = config.max_rotation_degrees;
        let rotation_degrees = rng.gen_range(-max..=max);
        let flip_horizontal = rng.gen::<f64>() < config.flip_probability;
        let brightness = rng.gen_range(config.brightness_range.0..=config.brightness_range.1);
        let contrast = rng.gen_range(config.contrast_range.0..=config.contrast_range.1);

        Self {
            rotation_degrees,
            flip_horizontal,
            brightness,
            contrast,
        }
    }

    /// Neutral parameters: applying them returns the input unchanged
    #[cfg(test)]
    pub fn identity() -> Self {
        Self {
            rotation_degrees: 0,
            flip_horizontal: false,
            brightness: 1.0,
            contrast: 1.0,
        }
    }

    pub fn apply(&self, img: &RgbImage) -> RgbImage {
        let mut out = rotate(img, self.rotation_degrees);
        if self.flip_horizontal {
            imageops::flip_horizontal_in_place(&mut out);
        }
        adjust_brightness(&mut out, self.brightness);
        adjust_contrast(&mut out, self.contrast);
        out
    }
}

/// Rotate counter-clockwise about the centre, keeping the canvas size.
/// Corners uncovered by the rotation are filled with black.
pub fn rotate(img: &RgbImage, degrees: i32) -> RgbImage {
    if degrees == 0 {
        return img.clone();
    }
    // imageproc rotates clockwise for positive angles
    let theta = -(degrees as f32).to_radians();
    rotate_about_center(img, theta, Interpolation::Nearest, Rgb([0, 0, 0]))
}

/// Scale every channel by `factor` (0 gives black, 1 is a no-op)
pub fn adjust_brightness(img: &mut RgbImage, factor: f32) {
    for pixel in img.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = clamp_channel(*channel as f32 * factor);
        }
    }
}

/// Blend every pixel with the image's mean grey level.
///
/// A factor of 0 yields a flat grey image, 1 is a no-op and larger values
/// push channels away from the mean.
pub fn adjust_contrast(img: &mut RgbImage, factor: f32) {
    let mean = mean_luma(img);
    for pixel in img.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = clamp_channel(mean + factor * (*channel as f32 - mean));
        }
    }
}

/// Mean ITU-R 601 luma, rounded to an integer grey level
fn mean_luma(img: &RgbImage) -> f32 {
    let count = img.width() as u64 * img.height() as u64;
    if count == 0 {
        return 0.0;
    }

    let total: u64 = img
        .pixels()
        .map(|Rgb([r, g, b])| (*r as u64 * 299 + *g as u64 * 587 + *b as u64 * 114) / 1000)
        .sum();

    (total as f64 / count as f64).round() as f32
}

fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
