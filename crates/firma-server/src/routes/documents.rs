//! Document signing routes: `/v1/documents/{id}/*`
//!
//! Register the signatories of a document, inspect its ledger, and sign.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use firma_core::payload::ResponsablesPayload;
use firma_core::role::Role;
use firma_core::workflow::{LedgerEntry, SignOutcome, SignRequest};

use crate::error::AppError;
use crate::routes::signatures::sanitize;
use crate::state::AppState;

/// Build the `/v1/documents` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{id}/assignments", post(assign))
        .route("/{id}/signatures", get(list_signatures))
        .route("/{id}/sign", post(sign))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    /// Entries created by this call; existing tuples are not counted.
    pub created: usize,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerResponse {
    pub document_id: i64,
    pub complete: bool,
    pub entries: Vec<LedgerEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignaturePayload {
    pub mime_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignBody {
    pub acting_user_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub use_stored_signature: bool,
    #[serde(default)]
    pub signature: Option<SignaturePayload>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    #[serde(flatten)]
    pub outcome: SignOutcome,
    pub complete: bool,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Register a submittable payload's signatories as pending.
async fn assign(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<i64>,
    Json(payload): Json<ResponsablesPayload>,
) -> Result<(StatusCode, Json<AssignResponse>), AppError> {
    payload.ensure_submittable()?;

    let mut ledger = state.ledger.write().await;
    let created = ledger.assign_payload(document_id, &payload);
    let entries = ledger.entries(document_id);
    drop(ledger);

    info!(document_id, created, "signatories assigned");
    let status = if created > 0 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(AssignResponse { created, entries })))
}

/// Ledger entries and completeness for a document.
async fn list_signatures(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<i64>,
) -> Result<Json<LedgerResponse>, AppError> {
    let ledger = state.ledger.read().await;
    let entries = ledger.entries(document_id);
    if entries.is_empty() {
        return Err(AppError::NotFound(format!(
            "document {document_id} has no signatories"
        )));
    }
    Ok(Json(LedgerResponse {
        document_id,
        complete: ledger.is_complete(document_id),
        entries,
    }))
}

/// Sign a pending entry with a fresh signature or the stored one.
///
/// Signer checks run against the ledger before the signature image is
/// sanitized; the write lock then repeats them, since the ledger may have
/// moved while the image was processed.
async fn sign(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<i64>,
    Json(body): Json<SignBody>,
) -> Result<Json<SignResponse>, AppError> {
    let ledger = state.ledger.read().await;
    let pending = ledger.signable_roles(document_id, body.acting_user_id, body.user_id)?;
    if pending.is_empty() {
        let complete = ledger.is_complete(document_id);
        drop(ledger);
        debug!(document_id, user_id = body.user_id, "nothing pending, signature not processed");
        return Ok(Json(SignResponse {
            outcome: SignOutcome::NothingPending,
            complete,
        }));
    }
    drop(ledger);

    let artifact = match body.signature {
        Some(signature) => {
            let bytes = STANDARD
                .decode(signature.data.as_bytes())
                .map_err(|e| AppError::BadRequest(format!("signature data is not base64: {e}")))?;
            Some(sanitize(state.limits, bytes, signature.mime_type).await?)
        }
        None => None,
    };

    let request = SignRequest {
        document_id,
        acting_user_id: body.acting_user_id,
        user_id: body.user_id,
        role: body.role,
        artifact: artifact.as_ref(),
        use_stored_signature: body.use_stored_signature,
    };

    let mut ledger = state.ledger.write().await;
    let outcome = ledger.sign(&request)?;
    let complete = ledger.is_complete(document_id);
    drop(ledger);

    if complete && matches!(outcome, SignOutcome::Signed { .. }) {
        info!(document_id, "document fully signed");
    }
    Ok(Json(SignResponse { outcome, complete }))
}
