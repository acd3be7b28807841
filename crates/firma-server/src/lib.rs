//! `Firma` HTTP server.
//!
//! Exposes the signing-workflow core over a JSON API at `/v1/*`: role code
//! learning, responsibility payload building, signature sanitization, and
//! the per-document signing ledger.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
