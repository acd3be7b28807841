//! Raster operations used by the signature pipeline: trim to ink, fit within
//! a bounding box, and PNG encoding.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};

use crate::error::SignatureError;
use crate::ink::is_ink;

/// Tight bounding box of ink pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Scan every pixel and return the bounding box of the ink, if any.
#[must_use]
pub fn ink_bounds(image: &RgbaImage) -> Option<Bounds> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;
    let mut found = false;

    for (x, y, pixel) in image.enumerate_pixels() {
        if is_ink(*pixel) {
            found = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    found.then(|| Bounds {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

/// Crop `image` to its ink bounding box.
///
/// # Errors
///
/// Returns [`SignatureError::EmptyImage`] if no pixel is ink.
pub fn trim(image: &RgbaImage) -> Result<RgbaImage, SignatureError> {
    let bounds = ink_bounds(image).ok_or(SignatureError::EmptyImage)?;
    if bounds.width == 0 || bounds.height == 0 {
        return Err(SignatureError::EmptyImage);
    }
    if (bounds.width, bounds.height) == image.dimensions() {
        return Ok(image.clone());
    }
    Ok(imageops::crop_imm(image, bounds.x, bounds.y, bounds.width, bounds.height).to_image())
}

/// Dimensions after uniformly scaling `(width, height)` down to fit within
/// `(max_width, max_height)`. Never scales up.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = (f64::from(max_width) / f64::from(width))
        .min(f64::from(max_height) / f64::from(height))
        .min(1.0);
    let scaled = |d: u32| ((f64::from(d) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// Downscale `image` to fit within `(max_width, max_height)`.
///
/// # Errors
///
/// Returns [`SignatureError::InvalidDimensions`] if either bound is zero.
pub fn resize_to_fit(
    image: RgbaImage,
    max_width: u32,
    max_height: u32,
) -> Result<RgbaImage, SignatureError> {
    if max_width == 0 || max_height == 0 {
        return Err(SignatureError::InvalidDimensions {
            reason: format!("maximum size {max_width}x{max_height} is empty"),
        });
    }
    let (width, height) = image.dimensions();
    let (target_w, target_h) = fit_within(width, height, max_width, max_height);
    if (target_w, target_h) == (width, height) {
        return Ok(image);
    }
    Ok(imageops::resize(&image, target_w, target_h, FilterType::Triangle))
}

/// Encode `image` as an RGBA PNG.
///
/// # Errors
///
/// Returns [`SignatureError::InvalidDimensions`] if the encoder rejects the
/// raster.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, SignatureError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| SignatureError::InvalidDimensions {
            reason: format!("png encoding failed: {e}"),
        })?;
    Ok(buf.into_inner())
}
