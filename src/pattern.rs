//! Deterministic procedural thumbnails.
//!
//! Devices without a user-supplied image get a geometric pattern derived
//! from a seed string, so every entry in the registry has something to show.
//! The same seed always produces the same JPEG bytes.

use image::{Rgb, RgbImage};
use tracing::trace;

use crate::error::Result;
use crate::image_ops::{self, JPEG_QUALITY};

/// Width of generated pattern thumbnails.
pub const PATTERN_WIDTH: u32 = 400;

/// Height of generated pattern thumbnails.
pub const PATTERN_HEIGHT: u32 = 300;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64-bit hash.
pub fn fnv1a_64(data: &[u8]) -> u64 {
    data.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Geometric layout of a pattern thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Diagonal stripes, 20px bands along `x + y`.
    Stripes,
    /// Concentric rings around the center, 30px apart.
    Rings,
    /// 40px cells colored by parity.
    Grid,
    /// Horizontal bands displaced by a sine wave.
    Waves,
}

impl PatternKind {
    /// Select the pattern kind for a seed hash.
    pub const fn from_hash(hash: u64) -> Self {
        match hash % 4 {
            0 => Self::Stripes,
            1 => Self::Rings,
            2 => Self::Grid,
            _ => Self::Waves,
        }
    }
}

/// Convert an HSL color (all components in `[0, 1]`) to RGB.
#[allow(
    clippy::many_single_char_names,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> Rgb<u8> {
    let (r, g, b) = if s == 0.0 {
        (l, l, l)
    } else {
        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        (
            hue_to_rgb(p, q, h + 1.0 / 3.0),
            hue_to_rgb(p, q, h),
            hue_to_rgb(p, q, h - 1.0 / 3.0),
        )
    };

    Rgb([(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8])
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return (q - p).mul_add(6.0 * t, p);
    }
    if t < 1.0 / 2.0 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return (q - p).mul_add((2.0 / 3.0 - t) * 6.0, p);
    }
    p
}

/// The three accent colors derived from a seed hash.
#[allow(clippy::cast_precision_loss)]
pub fn palette(hash: u64) -> [Rgb<u8>; 3] {
    let hue1 = (hash % 360) as f64 / 360.0;
    let hue2 = ((hash / 360) % 360) as f64 / 360.0;
    let hue3 = ((hash / 129_600) % 360) as f64 / 360.0;

    [
        hsl_to_rgb(hue1, 0.6, 0.4),
        hsl_to_rgb(hue2, 0.5, 0.5),
        hsl_to_rgb(hue3, 0.7, 0.6),
    ]
}

/// Band index of a pixel for the given pattern kind.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn band(kind: PatternKind, hash: u64, x: u32, y: u32) -> u32 {
    match kind {
        PatternKind::Stripes => (x + y) / 20,
        PatternKind::Rings => {
            let dx = f64::from(x) - f64::from(PATTERN_WIDTH / 2);
            let dy = f64::from(y) - f64::from(PATTERN_HEIGHT / 2);
            (dx.hypot(dy) as u32) / 30
        }
        PatternKind::Grid => {
            let (cx, cy) = (x / 40, y / 40);
            if (cx + cy) % 2 == 0 {
                0
            } else if (cx * cy) % 3 == 0 {
                1
            } else {
                2
            }
        }
        PatternKind::Waves => {
            let phase = (hash % 100) as f64;
            let wave = (f64::from(x) / 30.0 + phase).sin() * 20.0;
            let offset = f64::from(y) - f64::from(PATTERN_HEIGHT) / 2.0 + wave;
            (offset.abs() as u32) / 25
        }
    }
}

/// Render the raw pattern for a seed.
pub fn render_pattern(seed: &str) -> RgbImage {
    let hash = fnv1a_64(seed.as_bytes());
    let colors = palette(hash);
    let kind = PatternKind::from_hash(hash);
    trace!(?kind, hash, "Rendering pattern thumbnail");

    RgbImage::from_fn(PATTERN_WIDTH, PATTERN_HEIGHT, |x, y| {
        colors[(band(kind, hash, x, y) % 3) as usize]
    })
}

/// Generate the JPEG pattern thumbnail for a seed.
///
/// The only failure mode is the JPEG encoder itself.
pub fn generate_pattern_thumbnail(seed: &str) -> Result<Vec<u8>> {
    let img = image::DynamicImage::ImageRgb8(render_pattern(seed));
    image_ops::encode_jpeg(&img, JPEG_QUALITY)
}

/// Seed used for a device's fallback thumbnail.
pub fn device_seed(id: &str, host: &str, alias: Option<&str>) -> String {
    format!("{id}{host}{}", alias.unwrap_or_default())
}
