//! Image Normalizer
//!
//! Every image attached to a product passes through [`ImageNormalizer::normalize`]
//! before the record is written:
//! - the upload must not exceed [`MAX_SIZE`] bytes
//! - the pixels are converted to RGB
//! - the longest side is brought into the `[MIN_RESOLUTION, MAX_RESOLUTION]` band
//! - the result is re-encoded as JPEG at [`JPEG_QUALITY`]

use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageReader, Limits, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Floor for the longest side, in pixels.
pub const MIN_RESOLUTION: u32 = 400;
/// Ceiling for the longest side, in pixels.
pub const MAX_RESOLUTION: u32 = 800;
/// Largest accepted upload (3 MiB).
pub const MAX_SIZE: usize = 3_145_728;
pub const JPEG_QUALITY: u8 = 90;
pub const NORMALIZED_CONTENT_TYPE: &str = "image/jpeg";

/// Decoder guard against decompression bombs.
const MAX_DECODE_DIMENSION: u32 = 16_384;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Unsupported or corrupt image: {0}")]
    Decode(String),

    #[error("Image is {size} bytes, larger than the {max} byte limit")]
    MaxSize { size: usize, max: usize },

    #[error("Image resolution {longest}px is below the {min}px minimum")]
    MinResolution { longest: u32, min: u32 },

    #[error("Image resolution {longest}px is above the {max}px maximum")]
    MaxResolution { longest: u32, max: u32 },

    #[error("JPEG encoding failed: {0}")]
    Encode(String),

    #[error("Image normalization timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Image normalization task failed: {0}")]
    Task(String),
}

/// An upload as received from the operator. Lives for one save.
#[derive(Clone, Debug)]
pub struct RawImage {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl RawImage {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { filename: filename.into(), bytes }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Canonical JPEG payload stored as a product's image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedImage {
    pub filename: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl NormalizedImage {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Stateless apart from the strict-bounds switch, so it is `Copy` and can be
/// handed to blocking workers freely.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageNormalizer {
    strict_bounds: bool,
}

impl ImageNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject out-of-band images with `MinResolution`/`MaxResolution` instead
    /// of rescaling them.
    pub fn strict(strict_bounds: bool) -> Self {
        Self { strict_bounds }
    }

    pub fn normalize(&self, raw: &RawImage) -> Result<NormalizedImage, ImageError> {
        if raw.size() > MAX_SIZE {
            return Err(ImageError::MaxSize { size: raw.size(), max: MAX_SIZE });
        }

        let decoded = decode(&raw.bytes)?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        debug!(filename = %raw.filename, width, height, size = raw.size(), "Decoded upload");

        if self.strict_bounds {
            let longest = width.max(height);
            if longest > MAX_RESOLUTION {
                return Err(ImageError::MaxResolution { longest, max: MAX_RESOLUTION });
            }
            if longest < MIN_RESOLUTION {
                return Err(ImageError::MinResolution { longest, min: MIN_RESOLUTION });
            }
        }

        let rgb = match resize_target(width, height) {
            Some((w, h)) => {
                debug!(from_width = width, from_height = height, to_width = w, to_height = h, "Resizing upload");
                image::imageops::resize(&rgb, w, h, FilterType::Lanczos3)
            }
            None => rgb,
        };

        let bytes = encode_jpeg(&rgb)?;
        let normalized = NormalizedImage {
            filename: derive_filename(&raw.filename),
            content_type: NORMALIZED_CONTENT_TYPE.to_string(),
            width: rgb.width(),
            height: rgb.height(),
            bytes,
        };

        info!(
            filename = %normalized.filename,
            original_size = raw.size(),
            normalized_size = normalized.size(),
            width = normalized.width,
            height = normalized.height,
            "Normalized product image"
        );
        Ok(normalized)
    }

    /// Runs [`normalize`](Self::normalize) on the blocking pool, bounded by `limit`.
    pub async fn normalize_blocking(
        &self,
        raw: RawImage,
        limit: Duration,
    ) -> Result<NormalizedImage, ImageError> {
        let normalizer = *self;
        let task = tokio::task::spawn_blocking(move || normalizer.normalize(&raw));
        match tokio::time::timeout(limit, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(ImageError::Task(join.to_string())),
            Err(_) => Err(ImageError::TimedOut(limit)),
        }
    }
}

/// Target dimensions for a `width`×`height` image, or `None` when it is left
/// as is. The shrink rule is checked before the grow rule. The longest side
/// lands exactly on the bound; the other side keeps the aspect ratio.
pub fn resize_target(width: u32, height: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest == 0 {
        return None;
    }

    let bound = if longest >= MAX_RESOLUTION {
        MAX_RESOLUTION
    } else if longest <= MIN_RESOLUTION {
        MIN_RESOLUTION
    } else {
        return None;
    };

    let scale = |side: u32| -> u32 {
        let scaled = u64::from(side) * u64::from(bound) / u64::from(longest);
        (scaled as u32).max(1)
    };
    let target = if width >= height {
        (bound, scale(height))
    } else {
        (scale(width), bound)
    };

    (target != (width, height)).then_some(target)
}

/// Output name for an upload: control characters and directory parts
/// dropped, stem plus its last extension kept, `.jpg` supplied when there is
/// none.
pub fn derive_filename(original: &str) -> String {
    let printable: String = original.chars().filter(|c| !c.is_control()).collect();
    let base = printable.rsplit(['/', '\\']).next().unwrap_or_default();
    let path = Path::new(base);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or("jpg");
    format!("{stem}.{ext}")
}

/// Notice shown next to the image field in the admin form.
pub fn resolution_help_text() -> String {
    format!(
        "Images with a resolution below {MIN_RESOLUTION}px or above {MAX_RESOLUTION}px will be resized automatically"
    )
}

fn decode(bytes: &[u8]) -> Result<image::DynamicImage, ImageError> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(e.to_string()))?;
    if reader.format().is_none() {
        return Err(ImageError::Decode("unrecognized image format".into()));
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODE_DIMENSION);
    limits.max_image_height = Some(MAX_DECODE_DIMENSION);
    reader.limits(limits);

    reader.decode().map_err(|e| ImageError::Decode(e.to_string()))
}

fn encode_jpeg(rgb: &RgbImage) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .encode_image(rgb)
        .map_err(|e| ImageError::Encode(e.to_string()))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ColorType, DynamicImage, ImageFormat, Rgba, RgbaImage};

    fn encoded(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        bytes
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        encoded(DynamicImage::ImageRgb8(RgbImage::new(width, height)), ImageFormat::Jpeg)
    }

    fn decoded(image: &NormalizedImage) -> DynamicImage {
        image::load_from_memory(&image.bytes).unwrap()
    }

    #[test]
    fn test_downscales_large_jpeg() {
        let raw = RawImage::new("coat.jpg", jpeg(1600, 1200));
        let out = ImageNormalizer::new().normalize(&raw).unwrap();

        assert_eq!((out.width, out.height), (800, 600));
        assert_eq!(out.content_type, "image/jpeg");
        let img = decoded(&out);
        assert_eq!((img.width(), img.height()), (800, 600));
        assert_eq!(img.color(), ColorType::Rgb8);
        assert_eq!(image::guess_format(&out.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_upscales_small_png_and_drops_alpha() {
        let rgba = RgbaImage::from_pixel(200, 150, Rgba([10, 20, 30, 0]));
        let raw = RawImage::new("belt.png", encoded(DynamicImage::ImageRgba8(rgba), ImageFormat::Png));
        let out = ImageNormalizer::new().normalize(&raw).unwrap();

        assert_eq!((out.width, out.height), (400, 300));
        assert_eq!(decoded(&out).color(), ColorType::Rgb8);
        assert_eq!(out.filename, "belt.png");
    }

    #[test]
    fn test_keeps_in_band_dimensions() {
        let raw = RawImage::new("boot.jpg", jpeg(600, 450));
        let out = ImageNormalizer::new().normalize(&raw).unwrap();
        assert_eq!((out.width, out.height), (600, 450));
    }

    #[test]
    fn test_renormalizing_keeps_dimensions() {
        let normalizer = ImageNormalizer::new();
        let first = normalizer.normalize(&RawImage::new("a.jpg", jpeg(1000, 700))).unwrap();
        let second = normalizer.normalize(&RawImage::new(first.filename.clone(), first.bytes.clone())).unwrap();
        assert_eq!((first.width, first.height), (second.width, second.height));
    }

    #[test]
    fn test_portrait_uses_longest_side() {
        let out = ImageNormalizer::new().normalize(&RawImage::new("p.jpg", jpeg(300, 1000))).unwrap();
        assert_eq!((out.width, out.height), (240, 800));
    }

    #[test]
    fn test_oversized_upload_fails_before_decoding() {
        let mut bytes = jpeg(600, 600);
        bytes.resize(4 * 1024 * 1024, 0);
        let err = ImageNormalizer::new().normalize(&RawImage::new("big.jpg", bytes)).unwrap_err();
        assert!(matches!(err, ImageError::MaxSize { size, max } if size == 4 * 1024 * 1024 && max == MAX_SIZE));
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let mut bytes = jpeg(500, 500);
        bytes.resize(MAX_SIZE, 0);
        assert!(ImageNormalizer::new().normalize(&RawImage::new("edge.jpg", bytes)).is_ok());
    }

    #[test]
    fn test_text_is_not_an_image() {
        let raw = RawImage::new("notes.txt", b"definitely not pixels".to_vec());
        let err = ImageNormalizer::new().normalize(&raw).unwrap_err();
        assert!(matches!(err, ImageError::Decode(_)));
    }

    #[test]
    fn test_truncated_jpeg_fails_to_decode() {
        let mut bytes = jpeg(500, 500);
        bytes.truncate(64);
        let err = ImageNormalizer::new().normalize(&RawImage::new("cut.jpg", bytes)).unwrap_err();
        assert!(matches!(err, ImageError::Decode(_)));
    }

    #[test]
    fn test_strict_bounds_reject_instead_of_resizing() {
        let strict = ImageNormalizer::strict(true);
        let big = strict.normalize(&RawImage::new("big.jpg", jpeg(1600, 1200))).unwrap_err();
        assert!(matches!(big, ImageError::MaxResolution { longest: 1600, .. }));
        let small = strict.normalize(&RawImage::new("small.jpg", jpeg(200, 150))).unwrap_err();
        assert!(matches!(small, ImageError::MinResolution { longest: 200, .. }));
        assert!(strict.normalize(&RawImage::new("ok.jpg", jpeg(800, 400))).is_ok());
    }

    #[test]
    fn test_resize_target() {
        assert_eq!(resize_target(1600, 1200), Some((800, 600)));
        assert_eq!(resize_target(200, 150), Some((400, 300)));
        assert_eq!(resize_target(600, 450), None);
        // Already on a bound: nothing to do.
        assert_eq!(resize_target(800, 100), None);
        assert_eq!(resize_target(400, 400), None);
        assert_eq!(resize_target(1234, 777), Some((800, 503)));
        assert_eq!(resize_target(1000, 1), Some((800, 1)));
        assert_eq!(resize_target(0, 0), None);
    }

    #[test]
    fn test_derive_filename() {
        assert_eq!(derive_filename("shirt.png"), "shirt.png");
        assert_eq!(derive_filename("summer.sale.shirt.jpeg"), "summer.sale.shirt.jpeg");
        assert_eq!(derive_filename("uploads/2024/hat.webp"), "hat.webp");
        assert_eq!(derive_filename("C:\\photos\\scarf.bmp"), "scarf.bmp");
        assert_eq!(derive_filename("noext"), "noext.jpg");
        assert_eq!(derive_filename(""), "image.jpg");
    }

    #[test]
    fn test_derive_filename_drops_control_characters() {
        assert_eq!(derive_filename("a\nb.png"), "ab.png");
        assert_eq!(derive_filename("sum\u{7f}mer\0.gif"), "summer.gif");
        let name = derive_filename("evil\r\nSet-Cookie: x.png");
        assert!(axum::http::HeaderValue::from_str(&format!("inline; filename=\"{name}\"")).is_ok());
    }

    #[test]
    fn test_help_text_names_bounds() {
        let text = resolution_help_text();
        assert!(text.contains("400px"));
        assert!(text.contains("800px"));
    }

    #[tokio::test]
    async fn test_normalize_blocking() {
        let out = ImageNormalizer::new()
            .normalize_blocking(RawImage::new("a.jpg", jpeg(900, 300)), Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!((out.width, out.height), (800, 266));
    }
}
