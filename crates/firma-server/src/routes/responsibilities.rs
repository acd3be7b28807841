//! Responsibility routes: role codes, catalogue learning, and payload
//! building.
//!
//! - `GET  /v1/responsibilities/codes`
//! - `POST /v1/responsibilities/catalog`
//! - `POST /v1/responsables`
//! - `POST /v1/responsables/readiness`

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use firma_core::assignment::{AssignmentSet, Readiness};
use firma_core::payload::{ResponsablesPayload, Selection, build_responsables_payload};
use firma_core::registry::{CatalogEntry, CatalogReport};
use firma_core::role::Role;
use firma_core::signatory::Signatory;

use crate::error::AppError;
use crate::state::AppState;

/// Build the router nested under `/v1`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/responsibilities/codes", get(list_codes))
        .route("/responsibilities/catalog", post(learn_catalog))
        .route("/responsables", post(build_payload))
        .route("/responsables/readiness", post(check_readiness))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CodeBinding {
    pub code: i64,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CodeListResponse {
    pub codes: Vec<CodeBinding>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogResponse {
    pub by_name: Vec<CodeBinding>,
    pub by_position: Vec<CodeBinding>,
    pub skipped: Vec<i64>,
}

impl From<CatalogReport> for CatalogResponse {
    fn from(report: CatalogReport) -> Self {
        let bindings = |pairs: Vec<(i64, Role)>| -> Vec<CodeBinding> {
            pairs
                .into_iter()
                .map(|(code, role)| CodeBinding { code, role })
                .collect()
        };
        Self {
            by_name: bindings(report.by_name),
            by_position: bindings(report.by_position),
            skipped: report.skipped,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadRequest {
    pub selections: Vec<Selection>,
    #[serde(default)]
    pub elabora_user_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadResponse {
    pub payload: ResponsablesPayload,
    pub submittable: bool,
    /// Required roles with no signatory yet.
    pub missing: Vec<Role>,
}

#[derive(Debug, Deserialize)]
pub struct ReadinessRequest {
    pub signatories: Vec<Signatory>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessResponse {
    #[serde(flatten)]
    pub readiness: Readiness,
    pub submittable: bool,
    pub missing: Vec<Role>,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Every known `code → role` binding, ordered by code.
async fn list_codes(State(state): State<Arc<AppState>>) -> Json<CodeListResponse> {
    let codes = state
        .registry
        .snapshot()
        .into_iter()
        .map(|(code, role)| CodeBinding { code, role })
        .collect();
    Json(CodeListResponse { codes })
}

/// Learn bindings from a backend responsibility catalogue.
async fn learn_catalog(
    State(state): State<Arc<AppState>>,
    Json(entries): Json<Vec<CatalogEntry>>,
) -> Json<CatalogResponse> {
    Json(state.registry.learn_catalog(&entries).into())
}

/// Resolve selections into a grouped payload. An incomplete payload is
/// still returned; `submittable` tells the caller whether to enable submit.
async fn build_payload(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PayloadRequest>,
) -> Result<Json<PayloadResponse>, AppError> {
    let payload =
        build_responsables_payload(&state.registry, &body.selections, body.elabora_user_id)?;
    let missing = payload.missing_roles();

    Ok(Json(PayloadResponse {
        submittable: missing.is_empty(),
        missing,
        payload,
    }))
}

/// Report how far an assignment form is from submittable. Signatories may
/// still lack a role; a repeated user id is a conflict.
async fn check_readiness(
    Json(body): Json<ReadinessRequest>,
) -> Result<Json<ReadinessResponse>, AppError> {
    let set = AssignmentSet::from_signatories(body.signatories)?;
    let readiness = set.readiness();
    Ok(Json(ReadinessResponse {
        submittable: readiness.is_submittable(),
        missing: readiness.missing_roles(),
        readiness,
    }))
}
