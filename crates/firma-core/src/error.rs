//! Error types for `firma-core`.
//!
//! Each subsystem owns a closed error enum. Variants carry the measured values
//! and limits involved so a failure can be diagnosed from the message alone.
//! Signature errors additionally map onto a stable [`SignatureErrorKind`] code
//! that callers use to pick the end-user message.

use serde::Serialize;

use crate::role::Role;

/// Errors from responsibility role resolution and payload construction.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The selection carried no numeric (or numeric-like) responsibility code.
    #[error("responsibility code missing or not numeric: {found}")]
    ResponsibilityCodeMissing { found: String },

    /// The user record has no field that resolves to a finite integer id.
    #[error("signatory has no usable identifier")]
    MissingIdentifier,

    /// No resolution path matched: no explicit role, no recognisable role
    /// name, not the originator, and the code is not in the registry.
    #[error("cannot determine responsibility role for this signatory (code {code})")]
    RoleUndeterminable { code: i64 },

    /// A selection inside a payload build failed; the whole build is aborted.
    #[error("selection {index} could not be resolved: {source}")]
    Selection {
        index: usize,
        #[source]
        source: Box<ResolveError>,
    },
}

impl ResolveError {
    /// The innermost error, skipping any [`ResolveError::Selection`] wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Selection { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Error returned when a string is not a canonical role name.
#[derive(Debug, thiserror::Error)]
#[error("unknown role name: '{name}'")]
pub struct RoleParseError {
    pub name: String,
}

/// Errors from the signature validation and sanitization pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// Declared MIME type is neither PNG nor JPEG.
    #[error("unsupported signature type '{mime}', expected image/png or image/jpeg")]
    InvalidType { mime: String },

    /// The bytes could not be decoded as the declared type.
    #[error("signature could not be decoded as {mime}: {reason}")]
    Undecodable { mime: String, reason: String },

    /// Input exceeds the configured byte limit.
    #[error("signature file is {size} bytes, limit is {max}")]
    FileTooLarge { size: usize, max: usize },

    /// The raster has unusable dimensions, or could not be re-encoded.
    #[error("invalid signature dimensions: {reason}")]
    InvalidDimensions { reason: String },

    /// Trimmed width/height ratio is outside the configured bounds.
    #[error("signature aspect ratio {aspect:.3} outside [{min}, {max}]")]
    InvalidAspect { aspect: f64, min: f64, max: f64 },

    /// Sampled ink ratio is outside the configured bounds.
    #[error("signature ink ratio {ratio:.4} outside [{min}, {max}]")]
    InvalidInk { ratio: f64, min: f64, max: f64 },

    /// No ink pixels were found.
    #[error("signature image is empty")]
    EmptyImage,
}

impl SignatureError {
    /// Stable classification of this error.
    #[must_use]
    pub fn kind(&self) -> SignatureErrorKind {
        match self {
            Self::InvalidType { .. } | Self::Undecodable { .. } => SignatureErrorKind::InvalidType,
            Self::FileTooLarge { .. } => SignatureErrorKind::FileTooLarge,
            Self::InvalidDimensions { .. } => SignatureErrorKind::InvalidDimensions,
            Self::InvalidAspect { .. } => SignatureErrorKind::InvalidAspect,
            Self::InvalidInk { .. } => SignatureErrorKind::InvalidInk,
            Self::EmptyImage => SignatureErrorKind::EmptyImage,
        }
    }
}

/// Closed set of signature rejection kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureErrorKind {
    InvalidType,
    FileTooLarge,
    InvalidDimensions,
    InvalidAspect,
    InvalidInk,
    EmptyImage,
}

impl SignatureErrorKind {
    /// Machine-readable code, stable across releases.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::InvalidType => "invalid-type",
            Self::FileTooLarge => "file-too-large",
            Self::InvalidDimensions => "invalid-dimensions",
            Self::InvalidAspect => "invalid-aspect",
            Self::InvalidInk => "invalid-ink",
            Self::EmptyImage => "empty-image",
        }
    }

    /// Message suitable for showing to the person signing.
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::InvalidType => "Upload your signature as a PNG or JPEG image.",
            Self::FileTooLarge => "The signature file is too large.",
            Self::InvalidDimensions => "The signature image has unusable dimensions.",
            Self::InvalidAspect => {
                "The signature must be wider than it is tall. Crop it to the signature only."
            }
            Self::InvalidInk => {
                "The image does not look like a signature. Use a clean stroke on a blank background."
            }
            Self::EmptyImage => "Draw your signature before saving.",
        }
    }
}

impl std::fmt::Display for SignatureErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors from signatory assignment bookkeeping.
#[derive(Debug, thiserror::Error)]
pub enum AssignmentError {
    /// The user is already part of the signatory set.
    #[error("user {user_id} is already a signatory")]
    DuplicateSignatory { user_id: i64 },

    /// The user is not part of the signatory set.
    #[error("user {user_id} is not a signatory")]
    UnknownSignatory { user_id: i64 },

    /// Required roles are missing or some signatories have no role.
    #[error("assignment incomplete: missing roles {missing:?}, unassigned users {unassigned:?}")]
    Incomplete {
        missing: Vec<Role>,
        unassigned: Vec<i64>,
    },
}

/// Errors from signing ledger transitions.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Someone other than the assigned user attempted to sign.
    #[error("user {acting_user_id} cannot sign on behalf of user {user_id}")]
    ActorMismatch { acting_user_id: i64, user_id: i64 },

    /// The user holds several pending roles and did not pick one.
    #[error("user {user_id} has pending roles {pending:?} on document {document_id}, select one")]
    RoleSelectionRequired {
        document_id: i64,
        user_id: i64,
        pending: Vec<Role>,
    },

    /// The selected role is not pending for this user on this document.
    #[error("role {role} is not pending for user {user_id} on document {document_id}")]
    RoleNotPending {
        document_id: i64,
        user_id: i64,
        role: Role,
    },

    /// Neither a validated signature nor the stored-signature flag was given.
    #[error("user {user_id} supplied no signature evidence for document {document_id}")]
    MissingEvidence { document_id: i64, user_id: i64 },
}
