//! Placed raster images.

use super::Geometry;
use base64::{Engine, engine::general_purpose::STANDARD};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors while turning file bytes into an image placement.
#[derive(Debug, Error)]
pub enum ImageDecodeError {
    #[error("Unsupported image format")]
    UnsupportedFormat,
    #[error("Image has no pixels")]
    Empty,
    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),
}

/// Image format for stored image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    WebP,
}

impl ImageFormat {
    /// Get MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
        }
    }

    /// Detect format from magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        match image::guess_format(data).ok()? {
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::WebP => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    fn to_image_format(self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::WebP => image::ImageFormat::WebP,
        }
    }
}

/// A decoded image embedded as a data URL.
///
/// Local geometry is the source pixel size; display size comes from the
/// object's transform scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub data_url: String,
    pub source_width: u32,
    pub source_height: u32,
    pub format: ImageFormat,
}

impl ImageRef {
    /// Decode raw file bytes (PNG, JPEG or WebP).
    ///
    /// The whole image is decoded so corrupt files are rejected before any
    /// object is created.
    pub fn decode(data: &[u8]) -> Result<Self, ImageDecodeError> {
        let format = ImageFormat::sniff(data).ok_or(ImageDecodeError::UnsupportedFormat)?;
        let decoded = image::load_from_memory_with_format(data, format.to_image_format())?;
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(ImageDecodeError::Empty);
        }
        Ok(Self {
            data_url: format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(data)),
            source_width: decoded.width(),
            source_height: decoded.height(),
            format,
        })
    }

    /// Uniform scale that makes the image `target_width` wide.
    pub fn scale_to_width(&self, target_width: f64) -> f64 {
        target_width / self.source_width.max(1) as f64
    }

    /// Raw bytes of the embedded payload.
    pub fn bytes(&self) -> Option<Vec<u8>> {
        let (_, payload) = self.data_url.split_once(";base64,")?;
        STANDARD.decode(payload).ok()
    }
}

impl Geometry for ImageRef {
    fn local_bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.source_width as f64, self.source_height as f64)
    }

    fn hit_test_local(&self, point: Point, tolerance: f64) -> bool {
        self.local_bounds().inflate(tolerance, tolerance).contains(point)
    }
}
