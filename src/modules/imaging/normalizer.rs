use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use thiserror::Error;

use crate::core::config::ImageConfig;
use crate::shared::constants::PHOTO_CONTENT_TYPE;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Image has no pixels")]
    Empty,
}

/// A photo ready for upload
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
}

/// Bounds photo size: caps the width and re-encodes as JPEG.
#[derive(Debug, Clone, Copy)]
pub struct ImageNormalizer {
    max_width: u32,
    quality: u8,
}

impl ImageNormalizer {
    pub fn new(config: &ImageConfig) -> Self {
        Self {
            max_width: config.max_width.max(1),
            quality: config.jpeg_quality.clamp(1, 100),
        }
    }

    pub fn normalize(&self, bytes: &[u8]) -> Result<NormalizedImage, NormalizeError> {
        let decoded = image::load_from_memory(bytes).map_err(NormalizeError::Decode)?;
        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(NormalizeError::Empty);
        }

        let resized = self.downscale(decoded);
        let rgb = resized.to_rgb8();

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode_image(&rgb)
            .map_err(NormalizeError::Encode)?;

        tracing::debug!(
            "Normalized photo {}x{} ({} bytes) -> {}x{} ({} bytes)",
            width,
            height,
            bytes.len(),
            rgb.width(),
            rgb.height(),
            out.len()
        );

        Ok(NormalizedImage {
            bytes: out,
            width: rgb.width(),
            height: rgb.height(),
            content_type: PHOTO_CONTENT_TYPE,
        })
    }

    /// Never upscales; keeps the aspect ratio
    fn downscale(&self, image: DynamicImage) -> DynamicImage {
        let (width, height) = image.dimensions();
        if width <= self.max_width {
            return image;
        }

        let scaled_height = ((height as u64 * self.max_width as u64 + width as u64 / 2)
            / width as u64)
            .max(1) as u32;
        image.resize_exact(self.max_width, scaled_height, FilterType::Triangle)
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new(&ImageConfig::default())
    }
}
