//! Product image ingestion

pub mod normalizer;

pub use normalizer::{
    derive_filename, resize_target, resolution_help_text, ImageError, ImageNormalizer,
    NormalizedImage, RawImage, JPEG_QUALITY, MAX_RESOLUTION, MAX_SIZE, MIN_RESOLUTION,
    NORMALIZED_CONTENT_TYPE,
};
