//! Downscales uploaded images before they are sent upstream.

use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ColorType;

use crate::error::{RelayError, Result};

pub const JPEG_QUALITY: u8 = 85;
pub const OUTPUT_MIME_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeBounds {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ResizeBounds {
    fn default() -> Self {
        Self {
            max_width: 800,
            max_height: 800,
        }
    }
}

impl ResizeBounds {
    pub fn new(max_width: u32, max_height: u32) -> Self {
        Self {
            max_width,
            max_height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl PreparedImage {
    pub fn mime_type(&self) -> &'static str {
        OUTPUT_MIME_TYPE
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", OUTPUT_MIME_TYPE, self.to_base64())
    }
}

/// Target size for a `width`×`height` image. The limiting axis lands exactly on its
/// bound, the other one is scaled proportionally and rounded half-up. Images already
/// inside the bounds keep their size.
pub fn scaled_dimensions(width: u32, height: u32, bounds: ResizeBounds) -> (u32, u32) {
    if width <= bounds.max_width && height <= bounds.max_height {
        return (width, height);
    }

    let (w, h) = (width as u64, height as u64);
    let (max_w, max_h) = (bounds.max_width as u64, bounds.max_height as u64);

    // max_w / w <= max_h / h, compared without floats
    if max_w * h <= max_h * w {
        let scaled_h = (2 * h * max_w + w) / (2 * w);
        (bounds.max_width, (scaled_h as u32).max(1))
    } else {
        let scaled_w = (2 * w * max_h + h) / (2 * h);
        ((scaled_w as u32).max(1), bounds.max_height)
    }
}

/// Decodes `source`, fits it inside `bounds` and re-encodes it as JPEG.
pub fn prepare_image(source: &[u8], bounds: ResizeBounds) -> Result<PreparedImage> {
    if bounds.max_width == 0 || bounds.max_height == 0 {
        return Err(RelayError::image_processing("Resize bounds must be positive"));
    }

    let decoded = image::load_from_memory(source)
        .map_err(|e| RelayError::image("Failed to load image", e))?;

    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(RelayError::image_processing("Image has no pixels"));
    }

    let (width, height) = scaled_dimensions(decoded.width(), decoded.height(), bounds);
    let resized = if (width, height) == (decoded.width(), decoded.height()) {
        decoded
    } else {
        decoded.resize_exact(width, height, FilterType::Triangle)
    };

    // JPEG has no alpha channel.
    let rgb = resized.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode(rgb.as_raw(), width, height, ColorType::Rgb8)
        .map_err(|e| RelayError::image("Failed to encode image", e))?;

    log::debug!(
        "Prepared image {}x{} ({} bytes)",
        width,
        height,
        bytes.len()
    );

    Ok(PreparedImage {
        width,
        height,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbImage, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 200, 30, 128]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_width_dominant_lands_on_bound() {
        let bounds = ResizeBounds::default();
        assert_eq!(scaled_dimensions(1600, 900, bounds), (800, 450));
        assert_eq!(scaled_dimensions(1000, 1000, bounds), (800, 800));
        assert_eq!(scaled_dimensions(1001, 3, bounds), (800, 2));
    }

    #[test]
    fn test_height_dominant_lands_on_bound() {
        let bounds = ResizeBounds::default();
        assert_eq!(scaled_dimensions(500, 1000, bounds), (400, 800));
        assert_eq!(scaled_dimensions(333, 2000, bounds), (133, 800));
    }

    #[test]
    fn test_within_bounds_unchanged() {
        let bounds = ResizeBounds::default();
        assert_eq!(scaled_dimensions(800, 800, bounds), (800, 800));
        assert_eq!(scaled_dimensions(20, 640, bounds), (20, 640));
    }

    #[test]
    fn test_uneven_bounds_never_exceeded() {
        let bounds = ResizeBounds::new(800, 200);
        let (w, h) = scaled_dimensions(1000, 500, bounds);
        assert_eq!((w, h), (400, 200));
        assert!(w <= 800 && h <= 200);
    }

    #[test]
    fn test_thin_image_keeps_one_pixel() {
        assert_eq!(scaled_dimensions(10_000, 1, ResizeBounds::default()), (800, 1));
    }

    #[test]
    fn test_prepare_image_resizes_and_encodes_jpeg() {
        let prepared = prepare_image(&png_bytes(1200, 600), ResizeBounds::default()).unwrap();
        assert_eq!((prepared.width, prepared.height), (800, 400));

        let decoded = image::load_from_memory(&prepared.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (800, 400));
        assert_eq!(
            image::guess_format(&prepared.bytes).unwrap(),
            image::ImageFormat::Jpeg
        );
        assert!(prepared.to_data_url().starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn test_prepare_image_small_input() {
        let img = RgbImage::new(40, 30);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageOutputFormat::Jpeg(90)).unwrap();

        let prepared = prepare_image(&buf.into_inner(), ResizeBounds::default()).unwrap();
        assert_eq!((prepared.width, prepared.height), (40, 30));
    }

    #[test]
    fn test_undecodable_input() {
        let err = prepare_image(b"definitely not an image", ResizeBounds::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ImageProcessingError);
        assert!(std::error::Error::source(&err).is_some());
        assert!(!crate::error::error_trace(&err).is_empty());
    }
}
