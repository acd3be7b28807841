//! Signature routes: `/v1/signatures/*`
//!
//! Validates and sanitizes an uploaded signature image without recording
//! anything. The raw image is the request body and `Content-Type` is its
//! declared MIME type.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::info;

use firma_core::signature::{SignatureArtifact, SignatureLimits, validate_and_sanitize};

use crate::error::AppError;
use crate::state::AppState;

/// Build the `/v1/signatures` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/validate", post(validate))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactResponse {
    /// Always `image/png`.
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub ink_ratio: f64,
    /// Hex SHA-256 of the PNG bytes.
    pub content_hash: String,
    /// Base64-encoded PNG.
    pub data: String,
}

impl From<&SignatureArtifact> for ArtifactResponse {
    fn from(artifact: &SignatureArtifact) -> Self {
        Self {
            mime_type: "image/png".to_owned(),
            width: artifact.width(),
            height: artifact.height(),
            aspect_ratio: artifact.aspect_ratio(),
            ink_ratio: artifact.ink_ratio(),
            content_hash: artifact.content_hash(),
            data: STANDARD.encode(artifact.png()),
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Validate and sanitize the request body.
async fn validate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ArtifactResponse>, AppError> {
    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(declared_mime)
        .unwrap_or_default();

    let artifact = sanitize(state.limits, body.to_vec(), mime).await?;
    info!(
        width = artifact.width(),
        height = artifact.height(),
        ink_ratio = artifact.ink_ratio(),
        "signature validated"
    );
    Ok(Json(ArtifactResponse::from(&artifact)))
}

/// The media type of a `Content-Type` value, without parameters.
fn declared_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_owned()
}

/// Run the pipeline on the blocking pool.
pub(crate) async fn sanitize(
    limits: SignatureLimits,
    bytes: Vec<u8>,
    mime: String,
) -> Result<SignatureArtifact, AppError> {
    tokio::task::spawn_blocking(move || validate_and_sanitize(&bytes, &mime, &limits))
        .await
        .map_err(|e| AppError::Internal(format!("signature task failed: {e}")))?
        .map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_mime_strips_parameters() {
        assert_eq!(declared_mime("image/png"), "image/png");
        assert_eq!(declared_mime("image/jpeg; q=0.9"), "image/jpeg");
        assert_eq!(declared_mime(""), "");
    }
}
