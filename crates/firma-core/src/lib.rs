//! Core library for `Firma`.
//!
//! Contains the signing-workflow core: the responsibility resolution engine
//! (role catalogue, learned role-code registry, signatory extraction, payload
//! grouping), the signature image validation and sanitization pipeline, and
//! the per-document signing ledger. This crate performs no I/O; the server
//! and CLI crates own transport, configuration loading, and persistence.

pub mod assignment;
pub mod error;
pub mod ink;
pub mod payload;
pub mod raster;
pub mod registry;
pub mod resolve;
pub mod role;
pub mod signatory;
pub mod signature;
pub mod workflow;
