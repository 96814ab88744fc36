//! Deterministic image enhancement for the second analysis pass
//!
//! Upscale small photos, smooth resampling artefacts, stretch contrast
//! around the mean luminance and re-encode as JPEG under a size ceiling.

use checkmeter_core::{Error, ImagePayload, Result};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{GenericImageView, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Enhancement settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhanceConfig {
    /// Run a second pass on an enhanced image when the first is unconvincing
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Sources whose longest side is below this are scaled by `small_scale`
    #[serde(default = "default_small_source_px")]
    pub small_source_px: u32,

    #[serde(default = "default_small_scale")]
    pub small_scale: f32,

    /// Sources whose longest side is below this are scaled by `medium_scale`
    #[serde(default = "default_medium_source_px")]
    pub medium_source_px: u32,

    #[serde(default = "default_medium_scale")]
    pub medium_scale: f32,

    /// Cap on the output's longest side
    #[serde(default = "default_max_output_px")]
    pub max_output_px: u32,

    /// Gaussian smoothing sigma; 0 disables smoothing
    #[serde(default = "default_blur_sigma")]
    pub blur_sigma: f32,

    /// Contrast gain around the mean luminance
    #[serde(default = "default_contrast")]
    pub contrast: f32,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Quality used when the first encoding exceeds `max_output_bytes`
    #[serde(default = "default_fallback_jpeg_quality")]
    pub fallback_jpeg_quality: u8,

    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            small_source_px: default_small_source_px(),
            small_scale: default_small_scale(),
            medium_source_px: default_medium_source_px(),
            medium_scale: default_medium_scale(),
            max_output_px: default_max_output_px(),
            blur_sigma: default_blur_sigma(),
            contrast: default_contrast(),
            jpeg_quality: default_jpeg_quality(),
            fallback_jpeg_quality: default_fallback_jpeg_quality(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_small_source_px() -> u32 {
    800
}

fn default_small_scale() -> f32 {
    2.0
}

fn default_medium_source_px() -> u32 {
    1600
}

fn default_medium_scale() -> f32 {
    1.5
}

fn default_max_output_px() -> u32 {
    3072
}

fn default_blur_sigma() -> f32 {
    0.6
}

fn default_contrast() -> f32 {
    1.25
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_fallback_jpeg_quality() -> u8 {
    70
}

fn default_max_output_bytes() -> usize {
    4 * 1024 * 1024
}

/// Applies the enhancement transform to uploaded images
#[derive(Debug, Clone, Default)]
pub struct ImageEnhancer {
    config: EnhanceConfig,
}

impl ImageEnhancer {
    pub fn new(config: EnhanceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EnhanceConfig {
        &self.config
    }

    /// Scale factor for a source of the given dimensions
    pub fn scale_factor(&self, width: u32, height: u32) -> f32 {
        let longest = width.max(height);
        if longest < self.config.small_source_px {
            self.config.small_scale
        } else if longest < self.config.medium_source_px {
            self.config.medium_scale
        } else {
            1.0
        }
    }

    /// Output dimensions for a source, after scaling and the size cap
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let longest = width.max(height).max(1) as f32;
        let target_longest = (longest * self.scale_factor(width, height))
            .min(self.config.max_output_px as f32)
            .max(1.0);
        let ratio = target_longest / longest;

        let scale = |side: u32| ((side as f32 * ratio).round() as u32).max(1);
        (scale(width), scale(height))
    }

    /// Enhance an encoded image, returning a JPEG payload.
    ///
    /// CPU-bound; callers on an async runtime should run it on the blocking pool.
    pub fn enhance(&self, image: &ImagePayload) -> Result<ImagePayload> {
        let source = image::load_from_memory(&image.bytes)
            .map_err(|e| Error::image(format!("Failed to decode image: {}", e)))?;

        let (width, height) = source.dimensions();
        let (target_width, target_height) = self.target_dimensions(width, height);

        let mut pixels = source.to_rgb8();
        if (target_width, target_height) != (width, height) {
            pixels = imageops::resize(&pixels, target_width, target_height, FilterType::Lanczos3);
        }
        if self.config.blur_sigma > 0.0 {
            pixels = imageops::blur(&pixels, self.config.blur_sigma);
        }
        stretch_contrast(&mut pixels, self.config.contrast);

        let mut encoded = encode_jpeg(&pixels, self.config.jpeg_quality)?;
        if encoded.len() > self.config.max_output_bytes {
            debug!(
                bytes = encoded.len(),
                quality = self.config.fallback_jpeg_quality,
                "Enhanced image over size ceiling, re-encoding"
            );
            encoded = encode_jpeg(&pixels, self.config.fallback_jpeg_quality)?;
        }
        if encoded.len() > self.config.max_output_bytes {
            return Err(Error::image(format!(
                "enhanced image is {} bytes, over the {} byte ceiling",
                encoded.len(),
                self.config.max_output_bytes
            )));
        }

        debug!(
            width,
            height,
            target_width,
            target_height,
            bytes = encoded.len(),
            "Image enhanced"
        );

        Ok(ImagePayload::new(encoded, "image/jpeg"))
    }
}

/// Linear contrast stretch around the Rec. 601 mean luminance
pub fn stretch_contrast(pixels: &mut RgbImage, gain: f32) {
    let count = u64::from(pixels.width()) * u64::from(pixels.height());
    if count == 0 {
        return;
    }

    let total: f64 = pixels
        .pixels()
        .map(|p| 0.299 * f64::from(p[0]) + 0.587 * f64::from(p[1]) + 0.114 * f64::from(p[2]))
        .sum();
    let mean = total / count as f64;
    let gain = f64::from(gain);

    for pixel in pixels.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            let stretched = mean + (f64::from(*channel) - mean) * gain;
            *channel = stretched.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Guess the MIME type of encoded image bytes from their magic number
pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes).ok().map(|format| format.to_mime_type())
}

fn encode_jpeg(pixels: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(pixels)
        .map_err(|e| Error::image(format!("Failed to encode JPEG: {}", e)))?;
    Ok(out)
}
