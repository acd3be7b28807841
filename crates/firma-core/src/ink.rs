//! Ink pixel classification and sampling.
//!
//! A pixel is ink when it is visibly opaque and either dark overall or dark in
//! every channel. The second clause keeps saturated strokes (a blue pen, say)
//! that would fail the luminance threshold alone.

use image::{Rgba, RgbaImage};

/// Alpha values at or below this are treated as background.
const ALPHA_FLOOR: u8 = 13;

/// Normalized luminance below which a pixel is ink.
const LUMINANCE_CEILING: f64 = 0.85;

/// A pixel whose three channels are all below this is ink.
const CHANNEL_CEILING: u8 = 220;

/// Target number of samples for [`sample_stride`].
pub const SAMPLE_BUDGET: f64 = 160_000.0;

/// Whether `pixel` is part of a stroke rather than background.
#[must_use]
pub fn is_ink(pixel: Rgba<u8>) -> bool {
    let [r, g, b, a] = pixel.0;
    if a <= ALPHA_FLOOR {
        return false;
    }
    let luminance =
        (0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)) / 255.0;
    luminance < LUMINANCE_CEILING
        || (r < CHANNEL_CEILING && g < CHANNEL_CEILING && b < CHANNEL_CEILING)
}

/// Grid stride keeping the sample count near [`SAMPLE_BUDGET`].
///
/// `max(1, floor(sqrt(width * height / 160000)))`; a pure function of the
/// dimensions so sampling is deterministic.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn sample_stride(width: u32, height: u32) -> u32 {
    let total = u64::from(width) * u64::from(height);
    let stride = (total as f64 / SAMPLE_BUDGET).sqrt().floor() as u32;
    stride.max(1)
}

/// Result of sampling an image for ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InkSample {
    /// Sampled pixels classified as ink.
    pub ink: u64,
    /// Pixels sampled.
    pub samples: u64,
}

impl InkSample {
    /// Fraction of samples that are ink, or `None` if nothing was sampled.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(self) -> Option<f64> {
        (self.samples > 0).then(|| self.ink as f64 / self.samples as f64)
    }
}

/// Sample `image` on a `sample_stride` grid and count ink pixels.
#[must_use]
pub fn sample(image: &RgbaImage) -> InkSample {
    let (width, height) = image.dimensions();
    let stride = sample_stride(width, height) as usize;

    let mut result = InkSample { ink: 0, samples: 0 };
    for y in (0..height).step_by(stride) {
        for x in (0..width).step_by(stride) {
            result.samples += 1;
            if is_ink(*image.get_pixel(x, y)) {
                result.ink += 1;
            }
        }
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ── classification ───────────────────────────────────────────────

    #[test]
    fn opaque_black_is_ink() {
        assert!(is_ink(Rgba([0, 0, 0, 255])));
    }

    #[test]
    fn white_and_transparent_are_not_ink() {
        assert!(!is_ink(Rgba([255, 255, 255, 255])));
        assert!(!is_ink(Rgba([0, 0, 0, 0])));
        assert!(!is_ink(Rgba([0, 0, 0, 13])));
        assert!(is_ink(Rgba([0, 0, 0, 14])));
    }

    #[test]
    fn light_gray_antialiasing_is_ink_by_channels() {
        // Luminance 210/255 ≈ 0.82 < 0.85.
        assert!(is_ink(Rgba([210, 210, 210, 255])));
        // Luminance ≈ 0.859, but every channel is below 220.
        assert!(is_ink(Rgba([219, 219, 219, 255])));
        assert!(!is_ink(Rgba([230, 230, 230, 255])));
    }

    #[test]
    fn saturated_pen_color_is_ink() {
        assert!(is_ink(Rgba([20, 40, 200, 255])));
    }

    // ── sampling ─────────────────────────────────────────────────────

    #[test]
    fn stride_is_one_for_small_images() {
        assert_eq!(sample_stride(400, 400), 1);
        assert_eq!(sample_stride(1000, 100), 1);
        assert_eq!(sample_stride(0, 0), 1);
    }

    #[test]
    fn stride_grows_with_area() {
        assert_eq!(sample_stride(800, 800), 2);
        assert_eq!(sample_stride(4000, 4000), 10);
    }

    #[test]
    fn ratio_counts_sampled_ink() {
        let mut image = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        for x in 0..10 {
            image.put_pixel(x, 5, Rgba([0, 0, 0, 255]));
        }
        let result = sample(&image);
        assert_eq!(result, InkSample { ink: 10, samples: 100 });
        assert!((result.ratio().unwrap() - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_image_has_no_ratio() {
        let image = RgbaImage::new(0, 0);
        assert_eq!(sample(&image).ratio(), None);
    }
}
