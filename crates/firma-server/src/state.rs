//! Shared application state for the `Firma` server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. It holds the process-wide role code registry,
//! the in-memory signing ledger, and the signature pipeline bounds.

use std::sync::Arc;

use tokio::sync::RwLock;

use firma_core::registry::RoleCodeRegistry;
use firma_core::signature::SignatureLimits;
use firma_core::workflow::SigningLedger;

use crate::config::ServerConfig;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Learned `code → role` bindings. Append-only and internally synchronized.
    pub registry: Arc<RoleCodeRegistry>,
    /// Pending and signed entries per document.
    pub ledger: RwLock<SigningLedger>,
    /// Bounds applied to every signature upload.
    pub limits: SignatureLimits,
}

impl AppState {
    /// Build state from configuration: seeds the registry with the
    /// configured codes, then the defaults.
    #[must_use]
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            registry: Arc::new(RoleCodeRegistry::with_seeds(
                config.role_seeds.iter().copied(),
            )),
            ledger: RwLock::new(SigningLedger::new()),
            limits: config.limits,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("known_codes", &self.registry.len())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}
