//! Server configuration for `Firma`.
//!
//! Loads configuration from environment variables with sensible defaults.
//! All settings can be overridden via `FIRMA_*` environment variables.

use std::net::SocketAddr;
use std::str::FromStr;

use firma_core::role::Role;
use firma_core::signature::SignatureLimits;

/// Default port when neither `FIRMA_BIND_ADDR` nor `PORT` is set.
const DEFAULT_PORT: u16 = 8300;

/// Extra body allowance on top of twice `max_bytes`, for JSON framing.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Signature pipeline bounds.
    pub limits: SignatureLimits,
    /// Extra `code → role` seeds applied before the defaults.
    pub role_seeds: Vec<(i64, Role)>,
    /// Maximum number of signature requests processed at once.
    pub signature_concurrency: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on, binds to `0.0.0.0`
    /// - `FIRMA_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:8300`)
    /// - `FIRMA_LOG_LEVEL`: log filter (default: `info`)
    /// - `FIRMA_SIGNATURE_MAX_BYTES`: largest accepted upload (default: 2 MiB)
    /// - `FIRMA_SIGNATURE_MAX_WIDTH` / `FIRMA_SIGNATURE_MAX_HEIGHT`: output bounds (default: `800` / `400`)
    /// - `FIRMA_SIGNATURE_MIN_ASPECT` / `FIRMA_SIGNATURE_MAX_ASPECT`: default `2` / `8`
    /// - `FIRMA_SIGNATURE_MIN_INK` / `FIRMA_SIGNATURE_MAX_INK`: default `0.003` / `0.2`
    /// - `FIRMA_SIGNATURE_MAX_PIXELS`: largest decoded raster (default: `40000000`)
    /// - `FIRMA_ROLE_CODES`: extra seeds, e.g. `11=REVISA,12=APRUEBA`
    /// - `FIRMA_SIGNATURE_CONCURRENCY`: concurrent signature requests (default: `8`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unparseable values,
    /// including non-finite ratios, fall back to their defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        // Priority: FIRMA_BIND_ADDR > PORT > default 127.0.0.1:8300
        let bind_addr = if let Some(addr) = lookup("FIRMA_BIND_ADDR") {
            addr.parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))
        } else if let Some(port) = lookup("PORT") {
            SocketAddr::from(([0, 0, 0, 0], port.parse().unwrap_or(DEFAULT_PORT)))
        } else {
            SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT))
        };

        let log_level = lookup("FIRMA_LOG_LEVEL").unwrap_or_else(|| "info".to_owned());

        let defaults = SignatureLimits::default();
        let limits = SignatureLimits {
            max_bytes: parse_var(&lookup, "FIRMA_SIGNATURE_MAX_BYTES")
                .unwrap_or(defaults.max_bytes),
            max_width: parse_var(&lookup, "FIRMA_SIGNATURE_MAX_WIDTH")
                .unwrap_or(defaults.max_width),
            max_height: parse_var(&lookup, "FIRMA_SIGNATURE_MAX_HEIGHT")
                .unwrap_or(defaults.max_height),
            min_aspect: parse_finite(&lookup, "FIRMA_SIGNATURE_MIN_ASPECT")
                .unwrap_or(defaults.min_aspect),
            max_aspect: parse_finite(&lookup, "FIRMA_SIGNATURE_MAX_ASPECT")
                .unwrap_or(defaults.max_aspect),
            min_ink: parse_finite(&lookup, "FIRMA_SIGNATURE_MIN_INK")
                .unwrap_or(defaults.min_ink),
            max_ink: parse_finite(&lookup, "FIRMA_SIGNATURE_MAX_INK")
                .unwrap_or(defaults.max_ink),
            max_pixels: parse_var(&lookup, "FIRMA_SIGNATURE_MAX_PIXELS")
                .unwrap_or(defaults.max_pixels),
        };

        let role_seeds = lookup("FIRMA_ROLE_CODES")
            .map(|v| parse_role_codes(&v))
            .unwrap_or_default();

        let signature_concurrency = parse_var::<usize>(&lookup, "FIRMA_SIGNATURE_CONCURRENCY")
            .filter(|n| *n > 0)
            .unwrap_or(8);

        Self {
            bind_addr,
            log_level,
            limits,
            role_seeds,
            signature_concurrency,
        }
    }

    /// Request body limit. Sized above `max_bytes` so oversized signatures
    /// reach the pipeline and are reported as `file-too-large`, and so a
    /// base64-wrapped signature still fits.
    #[must_use]
    pub fn body_limit(&self) -> usize {
        self.limits
            .max_bytes
            .saturating_mul(2)
            .saturating_add(BODY_LIMIT_SLACK)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

/// Like [`parse_var`], but `NaN` and infinities count as unparseable.
fn parse_finite(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<f64> {
    parse_var::<f64>(lookup, key).filter(|v| v.is_finite())
}

/// Parse `code=ROLE` pairs separated by commas. Malformed pairs are skipped.
#[must_use]
pub fn parse_role_codes(raw: &str) -> Vec<(i64, Role)> {
    raw.split(',')
        .filter_map(|pair| {
            let (code, role) = pair.split_once('=')?;
            Some((code.trim().parse().ok()?, Role::from_str(role).ok()?))
        })
        .collect()
}
