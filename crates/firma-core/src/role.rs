//! Signing responsibilities.
//!
//! Every signatory on a document holds one of four roles:
//!
//! - `ELABORA`: the originator of the document (the acting user at creation).
//! - `REVISA`: a required reviewer.
//! - `APRUEBA`: a required approver.
//! - `ENTERADO`: an informational acknowledger with no gating effect.
//!
//! Backends label roles with free text whose spelling varies ("Revisión",
//! "REV", "Aprobado por"...). [`Role::from_name`] matches that text against
//! an ordered fragment table, first role wins. The table order and contents
//! are part of the compatibility surface with existing backend data.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RoleParseError;

/// A canonical signing responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Document originator.
    Elabora,
    /// Required reviewer.
    Revisa,
    /// Required approver.
    Aprueba,
    /// Informational acknowledger.
    Enterado,
}

/// Fragment table for free-text role names, evaluated in this order.
const NAME_FRAGMENTS: [(Role, &[&str]); 4] = [
    (Role::Revisa, &["REVISA", "REVISION", "REV"]),
    (Role::Aprueba, &["APRUEBA", "APROB", "APR"]),
    (Role::Enterado, &["ENTERADO", "ENT"]),
    (Role::Elabora, &["ELABORA", "ELAB"]),
];

impl Role {
    /// Roles in backend catalogue order. Also the positional order used when
    /// a catalogue entry has an unrecognisable name.
    pub const CATALOG_ORDER: [Self; 4] = [Self::Revisa, Self::Aprueba, Self::Enterado, Self::Elabora];

    /// Canonical uppercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Elabora => "ELABORA",
            Self::Revisa => "REVISA",
            Self::Aprueba => "APRUEBA",
            Self::Enterado => "ENTERADO",
        }
    }

    /// Seed numeric code used until the backend supplies its own.
    #[must_use]
    pub fn default_code(self) -> i64 {
        match self {
            Self::Revisa => 1,
            Self::Aprueba => 2,
            Self::Enterado => 3,
            Self::Elabora => 4,
        }
    }

    /// Whether a pending entry with this role blocks document completion.
    #[must_use]
    pub fn gates_completion(self) -> bool {
        !matches!(self, Self::Enterado)
    }

    /// Match free text against the fragment table.
    ///
    /// The text is trimmed and uppercased, then each role's fragments are
    /// tested as substrings in table order. Blank text never matches.
    #[must_use]
    pub fn from_name(text: &str) -> Option<Self> {
        let normalized = text.trim().to_uppercase();
        if normalized.is_empty() {
            return None;
        }
        NAME_FRAGMENTS
            .iter()
            .find(|(_, fragments)| fragments.iter().any(|f| normalized.contains(f)))
            .map(|(role, _)| *role)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    /// Parse an exact canonical name (case-insensitive). Use
    /// [`Role::from_name`] for tolerant matching.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ELABORA" => Ok(Self::Elabora),
            "REVISA" => Ok(Self::Revisa),
            "APRUEBA" => Ok(Self::Aprueba),
            "ENTERADO" => Ok(Self::Enterado),
            _ => Err(RoleParseError { name: s.to_owned() }),
        }
    }
}
