//! `Firma` CLI: sanitize signature images and build responsibility payloads
//! locally, or query a running `Firma` server.
//!
//! The local commands run the same `firma-core` pipeline the server uses, so
//! a signature accepted here is accepted there under the same limits.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use firma_core::error::SignatureError;
use firma_core::payload::{ResponsablesPayload, Selection, build_responsables_payload};
use firma_core::registry::{CatalogEntry, RoleCodeRegistry};
use firma_core::role::Role;
use firma_core::signature::{SignatureLimits, SignatureMime, validate_and_sanitize};

// ── ANSI color helpers ───────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

// ── CLI structure ────────────────────────────────────────────────────

/// Firma: document signing helpers.
#[derive(Parser)]
#[command(
    name = "firma",
    version,
    about = "Firma CLI: validate signatures, build responsibility payloads, query a server",
    long_about = None,
    after_help = format!(
        "{DIM}Environment variables:{RESET}\n  \
         FIRMA_ADDR    Server address (default: http://127.0.0.1:8300)\n\n\
         {DIM}Examples:{RESET}\n  \
         firma validate signature.png --out clean.png\n  \
         firma payload selections.json --elabora-user-id 7 --require-complete\n  \
         firma status"
    ),
)]
struct Cli {
    /// Firma server address.
    #[arg(long, env = "FIRMA_ADDR", default_value = "http://127.0.0.1:8300")]
    addr: String,

    /// Log pipeline decisions to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and sanitize a signature image.
    Validate {
        /// PNG or JPEG file.
        file: PathBuf,
        /// Declared MIME type (default: inferred from the file extension).
        #[arg(long)]
        mime: Option<String>,
        /// Write the sanitized PNG here.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        limits: LimitArgs,
    },
    /// Build a responsables payload from a JSON array of selections.
    Payload {
        /// JSON file holding an array of selections.
        file: PathBuf,
        /// User designated as the document originator (ELABORA).
        #[arg(long)]
        elabora_user_id: Option<i64>,
        /// Responsibility catalogue to learn before resolving.
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Extra `code=ROLE` binding; may be repeated.
        #[arg(long = "role-code", value_parser = parse_role_code)]
        role_codes: Vec<(i64, Role)>,
        /// Fail unless ELABORA, REVISA and APRUEBA are all present.
        #[arg(long)]
        require_complete: bool,
    },
    /// Show server health.
    Status,
    /// List the server's known responsibility codes.
    Codes,
}

/// Overrides for [`SignatureLimits`]; unset values keep the defaults.
#[derive(Args, Debug, Default)]
struct LimitArgs {
    /// Maximum upload size in bytes.
    #[arg(long)]
    max_bytes: Option<usize>,
    /// Maximum output width in pixels.
    #[arg(long)]
    max_width: Option<u32>,
    /// Maximum output height in pixels.
    #[arg(long)]
    max_height: Option<u32>,
    /// Minimum width/height ratio after trimming.
    #[arg(long, value_parser = parse_finite)]
    min_aspect: Option<f64>,
    /// Maximum width/height ratio after trimming.
    #[arg(long, value_parser = parse_finite)]
    max_aspect: Option<f64>,
    /// Minimum fraction of ink pixels.
    #[arg(long, value_parser = parse_finite)]
    min_ink: Option<f64>,
    /// Maximum fraction of ink pixels.
    #[arg(long, value_parser = parse_finite)]
    max_ink: Option<f64>,
    /// Largest decoded image, in pixels.
    #[arg(long)]
    max_pixels: Option<u64>,
}

impl LimitArgs {
    fn resolve(&self) -> SignatureLimits {
        let defaults = SignatureLimits::default();
        SignatureLimits {
            max_bytes: self.max_bytes.unwrap_or(defaults.max_bytes),
            max_width: self.max_width.unwrap_or(defaults.max_width),
            max_height: self.max_height.unwrap_or(defaults.max_height),
            min_aspect: self.min_aspect.unwrap_or(defaults.min_aspect),
            max_aspect: self.max_aspect.unwrap_or(defaults.max_aspect),
            min_ink: self.min_ink.unwrap_or(defaults.min_ink),
            max_ink: self.max_ink.unwrap_or(defaults.max_ink),
            max_pixels: self.max_pixels.unwrap_or(defaults.max_pixels),
        }
    }
}

fn parse_finite(raw: &str) -> Result<f64, String> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        Ok(_) => Err(format!("'{raw}' is not a finite number")),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_role_code(raw: &str) -> Result<(i64, Role), String> {
    let (code, role) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected code=ROLE, got '{raw}'"))?;
    let code = code
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid code '{code}': {e}"))?;
    let role = role.parse::<Role>().map_err(|e| e.to_string())?;
    Ok((code, role))
}

// ── Pretty output helpers ────────────────────────────────────────────

fn header(title: &str) {
    println!("{BOLD}{CYAN}{title}{RESET}");
    println!("{DIM}─────────────────────────────────────────{RESET}");
}

fn kv_line(key: &str, value: &str) {
    println!("  {DIM}{key:<16}{RESET} {WHITE}{value}{RESET}");
}

fn success(msg: &str) {
    println!("{GREEN}{BOLD}✓{RESET} {msg}");
}

fn warning(msg: &str) {
    println!("{YELLOW}{BOLD}⚠{RESET} {YELLOW}{msg}{RESET}");
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to format JSON")?;
    println!("{text}");
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

// ── HTTP client ──────────────────────────────────────────────────────

struct Client {
    http: reqwest::Client,
    addr: String,
}

impl Client {
    fn new(addr: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            addr: addr.trim_end_matches('/').to_owned(),
        }
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let resp = self
            .http
            .get(format!("{}{path}", self.addr))
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.addr))?;
        let status = resp.status();
        let body = resp.text().await.context("failed to read response body")?;
        if !status.is_success() {
            bail!("server returned {status}: {body}");
        }
        serde_json::from_str(&body).context("failed to parse response JSON")
    }
}

// ── Command dispatch ─────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{RED}{BOLD}✗ Error:{RESET} {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("firma_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Validate {
            file,
            mime,
            out,
            json,
            limits,
        } => cmd_validate(&file, mime.as_deref(), out.as_deref(), &limits.resolve(), json),
        Commands::Payload {
            file,
            elabora_user_id,
            catalog,
            role_codes,
            require_complete,
        } => cmd_payload(
            &file,
            elabora_user_id,
            catalog.as_deref(),
            &role_codes,
            require_complete,
        ),
        Commands::Status => cmd_status(&Client::new(cli.addr)).await,
        Commands::Codes => cmd_codes(&Client::new(cli.addr)).await,
    }
}

// ── validate ─────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateReport<'a> {
    file: &'a Path,
    width: u32,
    height: u32,
    aspect_ratio: f64,
    ink_ratio: f64,
    content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    out: Option<&'a Path>,
}

fn cmd_validate(
    file: &Path,
    mime: Option<&str>,
    out: Option<&Path>,
    limits: &SignatureLimits,
    json: bool,
) -> Result<()> {
    let mime = match mime {
        Some(mime) => mime.to_owned(),
        None => infer_mime(file)?,
    };
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;

    let artifact = validate_and_sanitize(&bytes, &mime, limits).map_err(rejection)?;

    if let Some(out) = out {
        fs::write(out, artifact.png())
            .with_context(|| format!("failed to write {}", out.display()))?;
    }

    if json {
        return print_json(&ValidateReport {
            file,
            width: artifact.width(),
            height: artifact.height(),
            aspect_ratio: artifact.aspect_ratio(),
            ink_ratio: artifact.ink_ratio(),
            content_hash: artifact.content_hash(),
            out,
        });
    }

    success(&format!("signature accepted: {}", file.display()));
    kv_line("size", &format!("{}x{}", artifact.width(), artifact.height()));
    kv_line("aspect", &format!("{:.2}", artifact.aspect_ratio()));
    kv_line("ink", &format!("{:.4}", artifact.ink_ratio()));
    kv_line("sha256", &artifact.content_hash());
    if let Some(out) = out {
        kv_line("written", &out.display().to_string());
    }
    Ok(())
}

fn infer_mime(file: &Path) -> Result<String> {
    file.extension()
        .and_then(|ext| ext.to_str())
        .and_then(SignatureMime::from_extension)
        .map(|mime| mime.as_str().to_owned())
        .ok_or_else(|| anyhow!("cannot infer image type of {}; pass --mime", file.display()))
}

fn rejection(err: SignatureError) -> anyhow::Error {
    let kind = err.kind();
    anyhow!("signature rejected [{kind}]: {} ({err})", kind.user_message())
}

// ── payload ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct PayloadReport<'a> {
    payload: &'a ResponsablesPayload,
    submittable: bool,
    missing: &'a [Role],
}

fn cmd_payload(
    file: &Path,
    elabora_user_id: Option<i64>,
    catalog: Option<&Path>,
    role_codes: &[(i64, Role)],
    require_complete: bool,
) -> Result<()> {
    let registry = RoleCodeRegistry::with_seeds(role_codes.iter().copied());
    if let Some(path) = catalog {
        let entries: Vec<CatalogEntry> = read_json(path)?;
        registry.learn_catalog(&entries);
    }

    let selections: Vec<Selection> = read_json(file)?;
    let payload = build_responsables_payload(&registry, &selections, elabora_user_id)?;
    let missing = payload.missing_roles();

    print_json(&PayloadReport {
        payload: &payload,
        submittable: missing.is_empty(),
        missing: &missing,
    })?;

    if require_complete && !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|r| r.as_str()).collect();
        bail!("payload is missing required roles: {}", names.join(", "));
    }
    Ok(())
}

// ── server ───────────────────────────────────────────────────────────

async fn cmd_status(client: &Client) -> Result<()> {
    let health = client.get("/v1/sys/health").await?;
    header("Firma server");
    kv_line("address", &client.addr);
    kv_line("status", health["status"].as_str().unwrap_or("unknown"));
    kv_line("version", health["version"].as_str().unwrap_or("unknown"));
    kv_line("known codes", &health["knownCodes"].to_string());
    Ok(())
}

async fn cmd_codes(client: &Client) -> Result<()> {
    let body = client.get("/v1/responsibilities/codes").await?;
    let codes = body["codes"].as_array().cloned().unwrap_or_default();
    if codes.is_empty() {
        warning("server knows no responsibility codes");
        return Ok(());
    }
    header("Responsibility codes");
    for binding in &codes {
        kv_line(
            &binding["code"].to_string(),
            binding["role"].as_str().unwrap_or("?"),
        );
    }
    Ok(())
}
