//! Signatories and user-record field extraction.
//!
//! User records come from several backend endpoints with slightly different
//! shapes (`userId` vs `idUsuario`, `puesto` vs `cargo`, ...). Rather than
//! modelling every shape, a [`UserRecord`] keeps the raw JSON object and
//! extracts each logical field from a prioritized list of candidate keys.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ResolveError;
use crate::role::Role;

/// Candidate keys for the user id, highest priority first.
const ID_FIELDS: &[&str] = &["userId", "usuarioId", "idUsuario", "id_usuario", "user_id", "id"];

/// Name parts concatenated, in order, to build a full name.
const NAME_PART_FIELDS: &[&str] = &[
    "primerNombre",
    "segundoNombre",
    "tercerNombre",
    "primerApellido",
    "segundoApellido",
    "apellidoCasada",
];

/// Keys holding a ready-made display name.
const DISPLAY_NAME_FIELDS: &[&str] = &["nombreCompleto", "displayName", "nombre"];

/// Keys holding the user's position.
const POSITION_FIELDS: &[&str] = &["puesto", "nombrePuesto", "cargo", "position"];

/// Keys holding the user's department.
const DEPARTMENT_FIELDS: &[&str] = &["gerencia", "nombreGerencia", "departamento", "area"];

/// A loosely-shaped user record as delivered by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(Map<String, Value>);

impl UserRecord {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_owned(), value.into());
        self
    }

    /// Raw field access.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// First id-shaped field that holds a finite integer.
    #[must_use]
    pub fn user_id(&self) -> Option<i64> {
        ID_FIELDS
            .iter()
            .filter_map(|key| self.0.get(*key))
            .find_map(parse_integer)
    }

    /// Like [`user_id`](Self::user_id) but failing with
    /// [`ResolveError::MissingIdentifier`].
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MissingIdentifier`] if no id field parses.
    pub fn require_user_id(&self) -> Result<i64, ResolveError> {
        self.user_id().ok_or(ResolveError::MissingIdentifier)
    }

    /// Name parts joined with single spaces, or `None` if every part is blank.
    #[must_use]
    pub fn full_name(&self) -> Option<String> {
        let words: Vec<&str> = NAME_PART_FIELDS
            .iter()
            .filter_map(|key| self.text(key))
            .flat_map(str::split_whitespace)
            .collect();
        if words.is_empty() {
            None
        } else {
            Some(words.join(" "))
        }
    }

    /// Name to show for this user.
    ///
    /// Falls back from the concatenated name parts to a ready-made display
    /// name field, then to `fallback`, then to `"Usuario <id>"`, and finally
    /// to `"Usuario"`.
    #[must_use]
    pub fn display_name(&self, fallback: Option<&str>) -> String {
        if let Some(name) = self.full_name() {
            return name;
        }
        if let Some(name) = first_text(self, DISPLAY_NAME_FIELDS) {
            return collapse_whitespace(name);
        }
        if let Some(name) = fallback.map(str::trim).filter(|s| !s.is_empty()) {
            return collapse_whitespace(name);
        }
        match self.user_id() {
            Some(id) => format!("Usuario {id}"),
            None => "Usuario".to_owned(),
        }
    }

    /// First non-blank position field.
    #[must_use]
    pub fn puesto(&self) -> Option<String> {
        first_text(self, POSITION_FIELDS).map(collapse_whitespace)
    }

    /// First non-blank department field.
    #[must_use]
    pub fn gerencia(&self) -> Option<String> {
        first_text(self, DEPARTMENT_FIELDS).map(collapse_whitespace)
    }

    fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for UserRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn first_text<'a>(record: &'a UserRecord, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| record.text(key))
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Interpret a JSON value as a finite integer.
///
/// Accepts integer numbers, floats with no fractional part, and strings that
/// parse to either. Everything else (booleans, `NaN`, `"12.5"`, blanks) is
/// rejected.
#[must_use]
pub fn parse_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn integral(f: f64) -> Option<i64> {
    // i64::MAX is not exactly representable; stay strictly inside the range.
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e18 {
        Some(f as i64)
    } else {
        None
    }
}

/// A user under consideration for, or assigned to, a signing responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signatory {
    /// Unique within a selection set.
    pub user_id: i64,
    /// Name shown in the assignment form.
    pub display_name: String,
    /// `None` until the user is given a responsibility.
    pub role: Option<Role>,
}

impl Signatory {
    /// Build a signatory from a user record.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MissingIdentifier`] if the record has no id.
    pub fn from_record(record: &UserRecord, role: Option<Role>) -> Result<Self, ResolveError> {
        Ok(Self {
            user_id: record.require_user_id()?,
            display_name: record.display_name(None),
            role,
        })
    }
}
