//! End-to-end scenarios for the signature pipeline and payload building.
//!
//! Image fixtures are generated in memory so the tests carry no binary files.

#![allow(clippy::unwrap_used)]

use std::io::Cursor;

use firma_core::error::SignatureErrorKind;
use firma_core::payload::{Selection, build_responsables_payload};
use firma_core::registry::RoleCodeRegistry;
use firma_core::signatory::UserRecord;
use firma_core::signature::{SignatureLimits, validate_and_sanitize};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// Opaque white canvas with a horizontal stroke of `thickness` rows through
/// the middle and one-pixel bars on the left and right edges, so the ink box
/// is the whole canvas.
fn signature_line(width: u32, height: u32, thickness: u32) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(width, height, WHITE);
    let top = (height - thickness) / 2;
    for y in top..top + thickness {
        for x in 0..width {
            image.put_pixel(x, y, BLACK);
        }
    }
    for y in 0..height {
        image.put_pixel(0, y, BLACK);
        image.put_pixel(width - 1, y, BLACK);
    }
    image
}

// ── Scenario A ───────────────────────────────────────────────────────

#[test]
fn scenario_a_wide_line_passes_unchanged() {
    let bytes = encode(
        DynamicImage::ImageRgba8(signature_line(1000, 100, 1)),
        ImageFormat::Png,
    );
    // Aspect 10 and width 1000 both exceed the defaults; widen them so the
    // image stays within bounds.
    let limits = SignatureLimits {
        max_width: 1000,
        max_aspect: 12.0,
        ..SignatureLimits::default()
    };

    let artifact = validate_and_sanitize(&bytes, "image/png", &limits).unwrap();

    assert_eq!((artifact.width(), artifact.height()), (1000, 100));
    assert!((artifact.aspect_ratio() - 10.0).abs() < 1e-9);
    assert!((artifact.ink_ratio() - 0.01).abs() < 0.003, "{}", artifact.ink_ratio());
}

#[test]
fn scenario_a_is_rejected_under_default_aspect_bounds() {
    let bytes = encode(
        DynamicImage::ImageRgba8(signature_line(1000, 100, 1)),
        ImageFormat::Png,
    );
    let err = validate_and_sanitize(&bytes, "image/png", &SignatureLimits::default()).unwrap_err();
    assert_eq!(err.kind(), SignatureErrorKind::InvalidAspect);
}

// ── Scenario B ───────────────────────────────────────────────────────

#[test]
fn scenario_b_square_gray_jpeg_fails_aspect() {
    let gray = RgbImage::from_pixel(50, 50, Rgb([128, 128, 128]));
    let bytes = encode(DynamicImage::ImageRgb8(gray), ImageFormat::Jpeg);

    let err = validate_and_sanitize(&bytes, "image/jpeg", &SignatureLimits::default()).unwrap_err();

    assert_eq!(err.kind(), SignatureErrorKind::InvalidAspect);
}

// ── Scenario C ───────────────────────────────────────────────────────

#[test]
fn scenario_c_oversized_signature_is_downscaled() {
    let bytes = encode(
        DynamicImage::ImageRgba8(signature_line(2000, 100, 4)),
        ImageFormat::Png,
    );
    let limits = SignatureLimits {
        max_aspect: 25.0,
        ..SignatureLimits::default()
    };

    let artifact = validate_and_sanitize(&bytes, "image/png", &limits).unwrap();

    assert_eq!((artifact.width(), artifact.height()), (800, 40));
    assert!((artifact.aspect_ratio() - 20.0).abs() < 1e-9);
}

#[test]
fn scenario_c_fails_size_gate_only_when_over_limit() {
    let bytes = encode(
        DynamicImage::ImageRgba8(signature_line(2000, 100, 4)),
        ImageFormat::Png,
    );
    let limits = SignatureLimits {
        max_bytes: bytes.len() - 1,
        max_aspect: 25.0,
        ..SignatureLimits::default()
    };

    let err = validate_and_sanitize(&bytes, "image/png", &limits).unwrap_err();

    assert_eq!(err.kind(), SignatureErrorKind::FileTooLarge);
}

// ── Scenario D ───────────────────────────────────────────────────────

#[test]
fn scenario_d_payload_without_originator() {
    let registry = RoleCodeRegistry::with_defaults();
    let a = UserRecord::new().with("userId", 1).with("primerNombre", "A");
    let b = UserRecord::new().with("userId", 2).with("primerNombre", "B");
    let selections = vec![
        Selection::new(a, 1).with_role_name("REVISA"),
        Selection::new(b, 2).with_role_name("APRUEBA"),
    ];

    let payload = build_responsables_payload(&registry, &selections, Some(3)).unwrap();

    assert!(payload.elabora.is_none());
    assert_eq!(payload.revisa.len(), 1);
    assert_eq!(payload.revisa[0].user_id, 1);
    assert_eq!(payload.aprueba.len(), 1);
    assert_eq!(payload.aprueba[0].user_id, 2);
    assert!(payload.enterado.is_empty());
    assert!(!payload.is_submittable());
}

// ── Scenario E ───────────────────────────────────────────────────────

#[test]
fn scenario_e_transparent_canvas_is_empty() {
    let bytes = encode(
        DynamicImage::ImageRgba8(RgbaImage::new(400, 400)),
        ImageFormat::Png,
    );

    let err = validate_and_sanitize(&bytes, "image/png", &SignatureLimits::default()).unwrap_err();

    assert_eq!(err.kind(), SignatureErrorKind::EmptyImage);
    assert_eq!(err.kind().user_message(), "Draw your signature before saving.");
}
