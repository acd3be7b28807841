//! HTTP route modules and router assembly.

pub mod documents;
pub mod responsibilities;
pub mod signatures;
pub mod sys;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Assemble the full application router.
pub fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    // Pixel work is CPU-bound; cap how many requests run it at once.
    let signature_routes = Router::new()
        .nest("/v1/signatures", signatures::router())
        .nest("/v1/documents", documents::router())
        .layer(ConcurrencyLimitLayer::new(config.signature_concurrency));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/v1/sys", sys::router())
        .nest("/v1", responsibilities::router())
        .merge(signature_routes)
        .layer(DefaultBodyLimit::max(config.body_limit()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}
