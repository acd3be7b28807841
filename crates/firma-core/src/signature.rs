//! Signature validation and sanitization.
//!
//! [`validate_and_sanitize`] turns raw drawn or uploaded image bytes into a
//! canonical PNG [`SignatureArtifact`], or rejects them with a classified
//! [`SignatureError`]. Steps run in a fixed order and the first failing step
//! aborts:
//!
//! 1. type check (PNG or JPEG only)
//! 2. size check
//! 3. decode, refusing rasters above the pixel budget
//! 4. trim to the ink bounding box (full-resolution scan)
//! 5. aspect ratio check on the trimmed image
//! 6. downscale to fit the maximum size
//! 7. ink ratio check on a sampled grid
//! 8. PNG encode
//!
//! The function is deterministic for identical bytes and limits.

use std::fmt;
use std::io::Cursor;

use image::{DynamicImage, ImageError, ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::SignatureError;
use crate::{ink, raster};

/// Tunable bounds for the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignatureLimits {
    /// Largest accepted input, in bytes.
    pub max_bytes: usize,
    pub max_width: u32,
    pub max_height: u32,
    /// Smallest accepted width/height of the trimmed image.
    pub min_aspect: f64,
    /// Largest accepted width/height of the trimmed image.
    pub max_aspect: f64,
    /// Smallest accepted fraction of ink among sampled pixels.
    pub min_ink: f64,
    /// Largest accepted fraction of ink among sampled pixels.
    pub max_ink: f64,
    /// Largest decoded raster, in pixels. Checked from the image header
    /// before any pixel buffer is allocated.
    pub max_pixels: u64,
}

impl Default for SignatureLimits {
    fn default() -> Self {
        Self {
            max_bytes: 2 * 1024 * 1024,
            max_width: 800,
            max_height: 400,
            min_aspect: 2.0,
            max_aspect: 8.0,
            min_ink: 0.003,
            max_ink: 0.2,
            max_pixels: 40_000_000,
        }
    }
}

/// Accepted input types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureMime {
    Png,
    Jpeg,
}

impl SignatureMime {
    /// Parse a declared MIME type. Only the exact strings `image/png` and
    /// `image/jpeg` are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidType`] for anything else.
    pub fn parse(mime: &str) -> Result<Self, SignatureError> {
        match mime {
            "image/png" => Ok(Self::Png),
            "image/jpeg" => Ok(Self::Jpeg),
            other => Err(SignatureError::InvalidType {
                mime: other.to_owned(),
            }),
        }
    }

    /// Guess from a file extension (case-insensitive).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    fn format(self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
        }
    }
}

impl fmt::Display for SignatureMime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sanitized signature, ready for upload. Only produced by
/// [`validate_and_sanitize`].
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureArtifact {
    png: Vec<u8>,
    width: u32,
    height: u32,
    aspect_ratio: f64,
    ink_ratio: f64,
}

impl SignatureArtifact {
    /// Encoded PNG bytes.
    #[must_use]
    pub fn png(&self) -> &[u8] {
        &self.png
    }

    #[must_use]
    pub fn into_png(self) -> Vec<u8> {
        self.png
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width over height of the final raster.
    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        self.aspect_ratio
    }

    /// Measured fraction of sampled ink pixels.
    #[must_use]
    pub fn ink_ratio(&self) -> f64 {
        self.ink_ratio
    }

    /// Hex SHA-256 of the PNG bytes.
    #[must_use]
    pub fn content_hash(&self) -> String {
        hex::encode(Sha256::digest(&self.png))
    }
}

/// Validate `bytes` declared as `mime` and produce a sanitized artifact.
///
/// # Errors
///
/// Returns the [`SignatureError`] of the first failing step.
pub fn validate_and_sanitize(
    bytes: &[u8],
    mime: &str,
    limits: &SignatureLimits,
) -> Result<SignatureArtifact, SignatureError> {
    let mime = SignatureMime::parse(mime)?;

    if bytes.len() > limits.max_bytes {
        return Err(SignatureError::FileTooLarge {
            size: bytes.len(),
            max: limits.max_bytes,
        });
    }

    let decoded = decode(bytes, mime, limits.max_pixels)?.to_rgba8();
    let (width, height) = decoded.dimensions();
    if width == 0 || height == 0 {
        return Err(SignatureError::InvalidDimensions {
            reason: format!("decoded image is {width}x{height}"),
        });
    }
    debug!(%mime, width, height, bytes = bytes.len(), "signature decoded");

    let trimmed = raster::trim(&decoded)?;
    drop(decoded);
    let (width, height) = trimmed.dimensions();
    let aspect = f64::from(width) / f64::from(height);
    debug!(width, height, aspect, "signature trimmed");

    if !(limits.min_aspect..=limits.max_aspect).contains(&aspect) {
        return Err(SignatureError::InvalidAspect {
            aspect,
            min: limits.min_aspect,
            max: limits.max_aspect,
        });
    }

    let resized = raster::resize_to_fit(trimmed, limits.max_width, limits.max_height)?;
    let (width, height) = resized.dimensions();

    let sample = ink::sample(&resized);
    let ink_ratio = sample.ratio().ok_or(SignatureError::EmptyImage)?;
    debug!(
        width,
        height,
        samples = sample.samples,
        ink = sample.ink,
        ink_ratio,
        "signature sampled"
    );

    if !(limits.min_ink..=limits.max_ink).contains(&ink_ratio) {
        return Err(SignatureError::InvalidInk {
            ratio: ink_ratio,
            min: limits.min_ink,
            max: limits.max_ink,
        });
    }

    let png = raster::encode_png(&resized)?;
    Ok(SignatureArtifact {
        png,
        width,
        height,
        aspect_ratio: f64::from(width) / f64::from(height),
        ink_ratio,
    })
}

/// Decode under an allocation budget of `max_pixels` RGBA pixels.
fn decode(
    bytes: &[u8],
    mime: SignatureMime,
    max_pixels: u64,
) -> Result<DynamicImage, SignatureError> {
    let mut budget = image::Limits::default();
    budget.max_alloc = Some(max_pixels.saturating_mul(4));

    let mut reader = ImageReader::with_format(Cursor::new(bytes), mime.format());
    reader.limits(budget);
    reader.decode().map_err(|e| match e {
        ImageError::Limits(limit) => SignatureError::InvalidDimensions {
            reason: format!("decoded raster exceeds {max_pixels} pixels: {limit}"),
        },
        other => SignatureError::Undecodable {
            mime: mime.to_string(),
            reason: other.to_string(),
        },
    })
}
