//! Bounded JPEG re-encoding of fetched logo images
//!
//! Any decodable input is scaled down to the configured maximum width,
//! flattened onto an opaque white background and written as a JPEG data URL.
//! Transparent regions therefore render white rather than black wherever the
//! logo is later displayed without alpha support.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;
use tracing::{debug, trace};

use crate::config::defaults::{
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_INPUT_BYTES, DEFAULT_MAX_WIDTH,
    DEFAULT_PASSTHROUGH_THRESHOLD_BYTES,
};
use crate::errors::{ReencodeError, ReencodeResult};
use crate::models::{EmbeddedImage, KNOWN_IMAGE_TYPES};

const SVG_MIME_TYPE: &str = "image/svg+xml";

/// Re-encoder limits
#[derive(Debug, Clone, PartialEq)]
pub struct ReencodeConfig {
    /// Wider sources are scaled down to this width, keeping aspect ratio
    pub max_width: u32,
    /// JPEG quality in `0.0..=1.0`
    pub quality: f32,
    /// Inputs above this size are rejected before decoding
    pub max_input_bytes: usize,
    /// JPEG inputs smaller than this (and not too wide) are passed through
    /// unchanged; `0` disables pass-through
    pub passthrough_threshold_bytes: usize,
}

impl Default for ReencodeConfig {
    fn default() -> Self {
        Self {
            max_width: DEFAULT_MAX_WIDTH,
            quality: DEFAULT_JPEG_QUALITY,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            passthrough_threshold_bytes: DEFAULT_PASSTHROUGH_THRESHOLD_BYTES,
        }
    }
}

impl ReencodeConfig {
    /// Quality mapped onto the 1-100 scale of the JPEG encoder
    pub fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageReencoder {
    config: ReencodeConfig,
}

impl ImageReencoder {
    pub fn new(config: ReencodeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReencodeConfig {
        &self.config
    }

    /// Reject empty, non-image and oversized inputs
    pub fn validate(&self, bytes: &[u8], mime_type: &str) -> ReencodeResult<()> {
        if bytes.is_empty() {
            return Err(ReencodeError::EmptyPayload);
        }
        if !is_image_mime(mime_type) {
            return Err(ReencodeError::NotAnImage {
                mime_type: mime_type.to_string(),
            });
        }
        if bytes.len() > self.config.max_input_bytes {
            return Err(ReencodeError::PayloadTooLarge {
                size: bytes.len(),
                max_size: self.config.max_input_bytes,
            });
        }
        Ok(())
    }

    /// Output size for a source of `width` x `height`
    pub fn target_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.config.max_width || width == 0 {
            return (width, height);
        }

        let scale = self.config.max_width as f64 / width as f64;
        let target_height = ((height as f64) * scale).round().max(1.0) as u32;
        (self.config.max_width, target_height)
    }

    /// Produce a bounded JPEG data URL from arbitrary image bytes
    pub fn reencode(&self, bytes: &[u8], mime_type: &str) -> ReencodeResult<EmbeddedImage> {
        self.validate(bytes, mime_type)?;

        if let Some(image) = self.try_passthrough(bytes) {
            return Ok(image);
        }

        let source = image::load_from_memory(bytes).map_err(decode_error)?;
        self.render(&source, bytes.len())
    }

    /// Keep the fetched bytes when they decode and render the same everywhere
    ///
    /// The stored type is the detected format, not the declared one. Sources
    /// with transparent pixels are flattened onto white like [`Self::reencode`].
    pub fn wrap_original(&self, bytes: &[u8], mime_type: &str) -> ReencodeResult<EmbeddedImage> {
        self.validate(bytes, mime_type)?;

        let declared = mime_type.split(';').next().unwrap_or_default().trim();
        if declared.eq_ignore_ascii_case(SVG_MIME_TYPE) {
            if !looks_like_svg(bytes) {
                return Err(ReencodeError::Decode {
                    message: "SVG payload has no <svg> root element".to_string(),
                });
            }
            return Ok(EmbeddedImage::from_bytes(SVG_MIME_TYPE, bytes));
        }

        let format = image::guess_format(bytes).map_err(decode_error)?;
        let detected = format.to_mime_type();
        if !KNOWN_IMAGE_TYPES.contains(&detected) {
            return Err(ReencodeError::NotAnImage {
                mime_type: detected.to_string(),
            });
        }

        let source = image::load_from_memory_with_format(bytes, format).map_err(decode_error)?;
        if has_transparency(&source) {
            debug!("Original logo has transparent pixels, flattening onto white");
            return self.render(&source, bytes.len());
        }

        if !detected.eq_ignore_ascii_case(declared) {
            trace!("Logo declared as '{}' stored as '{}'", declared, detected);
        }
        Ok(EmbeddedImage::from_bytes(detected, bytes))
    }

    /// Scale, flatten onto white and encode as JPEG
    fn render(&self, source: &DynamicImage, input_len: usize) -> ReencodeResult<EmbeddedImage> {
        let (width, height) = self.target_dimensions(source.width(), source.height());
        let rgba = source.to_rgba8();
        let scaled = if (width, height) == rgba.dimensions() {
            rgba
        } else {
            imageops::resize(&rgba, width, height, FilterType::Triangle)
        };

        let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        imageops::overlay(&mut canvas, &scaled, 0, 0);
        let flattened = DynamicImage::ImageRgba8(canvas).to_rgb8();

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.config.jpeg_quality())
            .encode_image(&flattened)
            .map_err(|e| ReencodeError::Encode {
                message: e.to_string(),
            })?;

        debug!(
            "Re-encoded logo {}x{} -> {}x{} ({} -> {} bytes)",
            source.width(),
            source.height(),
            width,
            height,
            input_len,
            jpeg.len()
        );

        Ok(EmbeddedImage::from_bytes("image/jpeg", &jpeg))
    }

    /// Small JPEGs carry no alpha channel, so skipping the white compositing
    /// step cannot change how they render.
    fn try_passthrough(&self, bytes: &[u8]) -> Option<EmbeddedImage> {
        if self.config.passthrough_threshold_bytes == 0
            || bytes.len() >= self.config.passthrough_threshold_bytes
        {
            return None;
        }

        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()?;
        if reader.format() != Some(ImageFormat::Jpeg) {
            return None;
        }
        let (width, _) = reader.into_dimensions().ok()?;
        if width > self.config.max_width {
            return None;
        }

        trace!("Passing through {} byte JPEG logo unchanged", bytes.len());
        Some(EmbeddedImage::from_bytes("image/jpeg", bytes))
    }
}

fn decode_error(e: image::ImageError) -> ReencodeError {
    ReencodeError::Decode {
        message: e.to_string(),
    }
}

fn has_transparency(image: &DynamicImage) -> bool {
    image.color().has_alpha() && image.to_rgba8().pixels().any(|p| p.0[3] < u8::MAX)
}

/// Vector logos are not rasterized; a root element is the only check
pub(crate) fn looks_like_svg(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok_and(|text| text.contains("<svg"))
}

/// `image/*` check on a declared content type
pub fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 120, 200]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("png encode");
        bytes
    }

    fn decode(image: &EmbeddedImage) -> DynamicImage {
        image::load_from_memory(&image.decode_bytes().unwrap()).unwrap()
    }

    #[test]
    fn test_rejections_are_distinguishable() {
        let reencoder = ImageReencoder::new(ReencodeConfig {
            max_input_bytes: 16,
            ..ReencodeConfig::default()
        });

        assert!(matches!(
            reencoder.reencode(&[], "image/png"),
            Err(ReencodeError::EmptyPayload)
        ));
        assert!(matches!(
            reencoder.reencode(b"hello", "text/plain"),
            Err(ReencodeError::NotAnImage { .. })
        ));
        assert!(matches!(
            reencoder.reencode(&[0u8; 17], "image/png"),
            Err(ReencodeError::PayloadTooLarge { size: 17, max_size: 16 })
        ));
    }

    #[test]
    fn test_corrupt_bytes_fail_to_decode() {
        let reencoder = ImageReencoder::default();
        let result = reencoder.reencode(b"definitely not a png", "image/png");
        assert!(matches!(result, Err(ReencodeError::Decode { .. })));
    }

    #[test]
    fn test_small_image_keeps_dimensions() {
        let reencoder = ImageReencoder::default();
        let image = reencoder.reencode(&png_bytes(400, 100), "image/png").unwrap();
        assert!(image.to_data_url().starts_with("data:image/jpeg;base64,"));

        let decoded = decode(&image);
        assert_eq!((decoded.width(), decoded.height()), (400, 100));
    }

    #[test]
    fn test_wide_image_is_scaled_to_max_width() {
        let reencoder = ImageReencoder::default();
        let image = reencoder.reencode(&png_bytes(1000, 333), "image/png").unwrap();
        let decoded = decode(&image);
        assert_eq!(decoded.width(), 800);
        assert!((decoded.height() as i64 - 266).abs() <= 1);
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let transparent = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]));
        let mut bytes = Vec::new();
        transparent
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let image = ImageReencoder::default().reencode(&bytes, "image/png").unwrap();
        let rgb = decode(&image).to_rgb8();
        for pixel in rgb.pixels() {
            assert!(pixel.0.iter().all(|&c| c > 240), "pixel {pixel:?} not white");
        }
    }

    #[test]
    fn test_target_dimensions() {
        let reencoder = ImageReencoder::default();
        assert_eq!(reencoder.target_dimensions(800, 600), (800, 600));
        assert_eq!(reencoder.target_dimensions(1600, 400), (800, 200));
        assert_eq!(reencoder.target_dimensions(10_000, 1), (800, 1));
    }

    #[test]
    fn test_passthrough_only_for_small_jpeg() {
        let reencoder = ImageReencoder::new(ReencodeConfig {
            passthrough_threshold_bytes: 64 * 1024,
            ..ReencodeConfig::default()
        });

        let rgb = RgbImage::from_pixel(32, 32, Rgb([1, 2, 3]));
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, 80)
            .encode_image(&rgb)
            .unwrap();

        let passed = reencoder.reencode(&jpeg, "image/jpeg").unwrap();
        assert_eq!(passed.decode_bytes().unwrap(), jpeg);

        let png = png_bytes(32, 32);
        let reencoded = reencoder.reencode(&png, "image/png").unwrap();
        assert_ne!(reencoded.decode_bytes().unwrap(), png);
        assert!(reencoded.is_jpeg());
    }

    #[test]
    fn test_wrap_original_keeps_type() {
        let bytes = png_bytes(4, 4);
        let image = ImageReencoder::default()
            .wrap_original(&bytes, "image/png")
            .unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.decode_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_wrap_original_rejects_undecodable_bytes() {
        let reencoder = ImageReencoder::default();
        assert!(matches!(
            reencoder.wrap_original(b"definitely not an image", "image/png"),
            Err(ReencodeError::Decode { .. })
        ));

        // Valid PNG signature, truncated body
        let mut truncated = png_bytes(16, 16);
        truncated.truncate(40);
        assert!(matches!(
            reencoder.wrap_original(&truncated, "image/png"),
            Err(ReencodeError::Decode { .. })
        ));

        assert!(matches!(
            reencoder.wrap_original(b"<html></html>", "image/svg+xml"),
            Err(ReencodeError::Decode { .. })
        ));
    }

    #[test]
    fn test_wrap_original_tags_detected_format() {
        let bytes = png_bytes(4, 4);
        let image = ImageReencoder::default()
            .wrap_original(&bytes, "image/x-icon")
            .unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert!(image.is_well_formed());
    }

    #[test]
    fn test_wrap_original_rejects_unlisted_formats() {
        // Little-endian TIFF header
        let tiff = b"II*\0\x08\0\0\0\0\0\0\0";
        assert!(matches!(
            ImageReencoder::default().wrap_original(tiff, "image/tiff"),
            Err(ReencodeError::NotAnImage { mime_type }) if mime_type == "image/tiff"
        ));
    }

    #[test]
    fn test_wrap_original_flattens_transparency() {
        let mut logo = RgbaImage::from_pixel(16, 16, Rgba([200, 0, 0, 255]));
        for y in 0..16 {
            for x in 0..8 {
                logo.put_pixel(x, y, Rgba([0, 0, 0, 0]));
            }
        }
        let mut bytes = Vec::new();
        logo.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let image = ImageReencoder::default()
            .wrap_original(&bytes, "image/png")
            .unwrap();
        assert!(image.is_jpeg());
        let corner = decode(&image).to_rgb8().get_pixel(1, 1).0;
        assert!(corner.iter().all(|&c| c > 200), "corner {corner:?} not white");
    }

    #[test]
    fn test_wrap_original_keeps_opaque_rgba() {
        let opaque = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        opaque
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let image = ImageReencoder::default()
            .wrap_original(&bytes, "image/png")
            .unwrap();
        assert_eq!(image.decode_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_wrap_original_accepts_svg_markup() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#;
        let image = ImageReencoder::default()
            .wrap_original(svg, "image/svg+xml")
            .unwrap();
        assert_eq!(image.mime_type(), "image/svg+xml");
    }

    #[test]
    fn test_quality_mapping() {
        assert_eq!(ReencodeConfig::default().jpeg_quality(), 90);
        let config = ReencodeConfig {
            quality: 0.0,
            ..ReencodeConfig::default()
        };
        assert_eq!(config.jpeg_quality(), 1);
    }
}
