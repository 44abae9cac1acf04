//! Image processing operations for device thumbnails.
//!
//! Every persisted thumbnail is a JPEG no larger than
//! [`MAX_THUMBNAIL_WIDTH`] x [`MAX_THUMBNAIL_HEIGHT`], regardless of the
//! format the caller supplied.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageFormat, ImageReader};
use tracing::{debug, trace};

use crate::error::{KvmmError, Result};

/// Maximum thumbnail width in pixels.
pub const MAX_THUMBNAIL_WIDTH: u32 = 400;

/// Maximum thumbnail height in pixels.
pub const MAX_THUMBNAIL_HEIGHT: u32 = 300;

/// JPEG quality used for every stored thumbnail.
pub const JPEG_QUALITY: u8 = 85;

/// Extension of processed thumbnails.
pub const THUMBNAIL_EXTENSION: &str = ".jpg";

/// Extensions accepted for thumbnail uploads and stored files.
pub const ALLOWED_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".gif", ".webp"];

const SUPPORTED_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

fn reader(data: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| KvmmError::Decode(e.to_string()))?;

    match reader.format() {
        Some(format) if SUPPORTED_FORMATS.contains(&format) => Ok(reader),
        Some(format) => Err(KvmmError::Decode(format!(
            "unsupported image format {format:?}"
        ))),
        None => Err(KvmmError::Decode("unrecognized image data".to_string())),
    }
}

/// Decode raster bytes (JPEG, PNG, GIF or WebP).
///
/// Returns the decoded image together with the detected format.
pub fn decode(data: &[u8]) -> Result<(DynamicImage, ImageFormat)> {
    let reader = reader(data)?;
    let format = reader
        .format()
        .ok_or_else(|| KvmmError::Decode("unrecognized image data".to_string()))?;
    let img = reader
        .decode()
        .map_err(|e| KvmmError::Decode(e.to_string()))?;

    debug!(?format, width = img.width(), height = img.height(), "Decoded image");
    Ok((img, format))
}

/// Check that `data` starts with a parseable header for a supported format.
///
/// Only the header is read; pixel data is never decoded.
pub fn validate_image_data(data: &[u8]) -> Result<ImageFormat> {
    let reader = reader(data)?;
    let format = reader
        .format()
        .ok_or_else(|| KvmmError::Decode("unrecognized image data".to_string()))?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| KvmmError::Decode(format!("invalid image data: {e}")))?;

    trace!(?format, width, height, "Validated image header");
    Ok(format)
}

/// Compute the size of an image scaled to fit within `max_width` x `max_height`.
///
/// Images that already fit keep their size. Otherwise a single scale factor
/// is applied to both sides, rounding down, with a floor of one pixel.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops
)]
pub fn calculate_dimensions(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let ratio = (f64::from(max_width) / f64::from(width))
        .min(f64::from(max_height) / f64::from(height));

    let new_width = ((f64::from(width) * ratio) as u32).max(1);
    let new_height = ((f64::from(height) * ratio) as u32).max(1);
    (new_width, new_height)
}

/// Downscale an image to fit within the given bounds. Never upscales.
pub fn resize(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let (new_width, new_height) = calculate_dimensions(width, height, max_width, max_height);

    if (new_width, new_height) == (width, height) {
        trace!(width, height, "Image within bounds, not resizing");
        return img;
    }

    debug!(width, height, new_width, new_height, "Resizing image");
    img.resize_exact(new_width, new_height, FilterType::CatmullRom)
}

/// Encode an image as baseline JPEG. Alpha is discarded.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder
        .encode(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
        .map_err(|e| KvmmError::Processing(format!("failed to encode thumbnail: {e}")))?;

    Ok(buf)
}

/// Decode, downscale and re-encode user-supplied image bytes as a thumbnail.
pub fn process_thumbnail(data: &[u8]) -> Result<Vec<u8>> {
    let (img, _format) = decode(data).map_err(|e| match e {
        KvmmError::Decode(msg) => KvmmError::Processing(msg),
        other => other,
    })?;

    let resized = resize(img, MAX_THUMBNAIL_WIDTH, MAX_THUMBNAIL_HEIGHT);
    let encoded = encode_jpeg(&resized, JPEG_QUALITY)?;

    debug!(
        input_bytes = data.len(),
        output_bytes = encoded.len(),
        "Processed thumbnail"
    );
    Ok(encoded)
}

/// Normalize a thumbnail extension to its dotted lower-case form.
///
/// Accepts the extension with or without the leading dot.
pub fn normalize_extension(ext: &str) -> Result<String> {
    let lower = ext.trim().to_ascii_lowercase();
    let dotted = if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    };

    if ALLOWED_EXTENSIONS.contains(&dotted.as_str()) {
        Ok(dotted)
    } else {
        Err(KvmmError::UnsupportedExtension {
            extension: ext.to_string(),
        })
    }
}

/// Validate the extension of an uploaded file name.
pub fn validate_upload_name(name: &str) -> Result<String> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    normalize_extension(ext)
}
