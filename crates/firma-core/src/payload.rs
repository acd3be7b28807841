//! Responsibility payload construction.
//!
//! Turns the assignment form's ordered selections into the
//! [`ResponsablesPayload`] shape the backend expects: a single `elabora`
//! slot plus `revisa`, `aprueba`, and `enterado` arrays.
//!
//! A build is all-or-nothing. Every selection is resolved and converted
//! first, with learned codes staged locally; only when all of them succeed
//! are the staged codes committed to the registry and the payload returned.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{AssignmentError, ResolveError};
use crate::registry::RoleCodeRegistry;
use crate::resolve::{self, Resolution, RoleRequest};
use crate::role::Role;
use crate::signatory::UserRecord;

/// One row of the assignment form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    /// Selected user.
    pub user: UserRecord,
    /// Backend responsibility code (number or numeric string).
    #[serde(default)]
    pub responsabilidad_id: Option<Value>,
    /// Already-known canonical role.
    #[serde(default)]
    pub role: Option<Role>,
    /// Backend responsibility name.
    #[serde(default)]
    pub responsabilidad_nombre: Option<String>,
    /// Name to use if the user record carries none.
    #[serde(default)]
    pub fallback_nombre: Option<String>,
}

impl Selection {
    /// Selection with a code and no hints.
    #[must_use]
    pub fn new(user: UserRecord, responsabilidad_id: impl Into<Value>) -> Self {
        Self {
            user,
            responsabilidad_id: Some(responsabilidad_id.into()),
            role: None,
            responsabilidad_nombre: None,
            fallback_nombre: None,
        }
    }

    /// Attach an explicit role.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Attach a backend responsibility name.
    #[must_use]
    pub fn with_role_name(mut self, name: impl Into<String>) -> Self {
        self.responsabilidad_nombre = Some(name.into());
        self
    }

    /// Attach a fallback display name.
    #[must_use]
    pub fn with_fallback_nombre(mut self, name: impl Into<String>) -> Self {
        self.fallback_nombre = Some(name.into());
        self
    }

    fn request(&self, elabora_user_id: Option<i64>) -> RoleRequest<'_> {
        RoleRequest {
            responsabilidad_id: self.responsabilidad_id.as_ref(),
            user: &self.user,
            role: self.role,
            role_name: self.responsabilidad_nombre.as_deref(),
            elabora_user_id,
        }
    }
}

/// A single signatory as sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsablePayload {
    pub user_id: i64,
    pub nombre: String,
    pub puesto: Option<String>,
    pub gerencia: Option<String>,
    pub responsabilidad_id: i64,
}

impl ResponsablePayload {
    /// Derive the payload entry for `user` under `responsabilidad_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MissingIdentifier`] if the record has no id.
    pub fn from_user(
        user: &UserRecord,
        responsabilidad_id: i64,
        fallback_nombre: Option<&str>,
    ) -> Result<Self, ResolveError> {
        Ok(Self {
            user_id: user.require_user_id()?,
            nombre: user.display_name(fallback_nombre),
            puesto: user.puesto(),
            gerencia: user.gerencia(),
            responsabilidad_id,
        })
    }
}

/// Signatories grouped by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsablesPayload {
    pub elabora: Option<ResponsablePayload>,
    #[serde(default)]
    pub revisa: Vec<ResponsablePayload>,
    #[serde(default)]
    pub aprueba: Vec<ResponsablePayload>,
    #[serde(default)]
    pub enterado: Vec<ResponsablePayload>,
}

impl ResponsablesPayload {
    /// Place `entry` under `role`. `elabora` is last-write-wins; the arrays
    /// keep insertion order.
    pub fn insert(&mut self, role: Role, entry: ResponsablePayload) {
        match role {
            Role::Elabora => self.elabora = Some(entry),
            Role::Revisa => self.revisa.push(entry),
            Role::Aprueba => self.aprueba.push(entry),
            Role::Enterado => self.enterado.push(entry),
        }
    }

    /// Every entry paired with its role, `elabora` first.
    pub fn entries(&self) -> impl Iterator<Item = (Role, &ResponsablePayload)> {
        self.elabora
            .iter()
            .map(|e| (Role::Elabora, e))
            .chain(self.revisa.iter().map(|e| (Role::Revisa, e)))
            .chain(self.aprueba.iter().map(|e| (Role::Aprueba, e)))
            .chain(self.enterado.iter().map(|e| (Role::Enterado, e)))
    }

    /// Total number of entries across all roles.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.elabora.is_some())
            + self.revisa.len()
            + self.aprueba.len()
            + self.enterado.len()
    }

    /// Whether no role has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Required roles with no entry, in `ELABORA, REVISA, APRUEBA` order.
    #[must_use]
    pub fn missing_roles(&self) -> Vec<Role> {
        let mut missing = Vec::new();
        if self.elabora.is_none() {
            missing.push(Role::Elabora);
        }
        if self.revisa.is_empty() {
            missing.push(Role::Revisa);
        }
        if self.aprueba.is_empty() {
            missing.push(Role::Aprueba);
        }
        missing
    }

    /// `elabora` set and at least one reviewer and one approver.
    #[must_use]
    pub fn is_submittable(&self) -> bool {
        self.missing_roles().is_empty()
    }

    /// Fail unless [`is_submittable`](Self::is_submittable).
    ///
    /// # Errors
    ///
    /// Returns [`AssignmentError::Incomplete`] naming the missing roles.
    pub fn ensure_submittable(&self) -> Result<(), AssignmentError> {
        let missing = self.missing_roles();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AssignmentError::Incomplete {
                missing,
                unassigned: Vec::new(),
            })
        }
    }
}

/// Resolve every selection and group the results by role.
///
/// Codes learned from a hinted selection are visible to later selections of
/// the same build, exactly as if the selections had been resolved one by
/// one. They are staged locally and reach the registry only once every
/// selection has resolved.
///
/// # Errors
///
/// Returns [`ResolveError::Selection`] wrapping the first failing
/// selection's error. On failure the registry is left untouched.
pub fn build_responsables_payload(
    registry: &RoleCodeRegistry,
    selections: &[Selection],
    elabora_user_id: Option<i64>,
) -> Result<ResponsablesPayload, ResolveError> {
    let mut staged: BTreeMap<i64, Role> = BTreeMap::new();
    let mut resolved = Vec::with_capacity(selections.len());

    for (index, selection) in selections.iter().enumerate() {
        let (resolution, entry) =
            resolve_selection(registry, &staged, selection, elabora_user_id).map_err(|source| {
                ResolveError::Selection {
                    index,
                    source: Box::new(source),
                }
            })?;
        if resolution.by.is_learnable() && registry.lookup(resolution.code).is_none() {
            staged.entry(resolution.code).or_insert(resolution.role);
        }
        resolved.push((resolution, entry));
    }

    let mut payload = ResponsablesPayload::default();
    for (resolution, entry) in resolved {
        resolve::commit(registry, &resolution);
        payload.insert(resolution.role, entry);
    }

    debug!(
        selections = selections.len(),
        staged = staged.len(),
        elabora = payload.elabora.is_some(),
        revisa = payload.revisa.len(),
        aprueba = payload.aprueba.len(),
        enterado = payload.enterado.len(),
        "responsables payload built"
    );

    Ok(payload)
}

fn resolve_selection(
    registry: &RoleCodeRegistry,
    staged: &BTreeMap<i64, Role>,
    selection: &Selection,
    elabora_user_id: Option<i64>,
) -> Result<(Resolution, ResponsablePayload), ResolveError> {
    let lookup = |code| registry.lookup(code).or_else(|| staged.get(&code).copied());
    let resolution = resolve::plan_role_with(lookup, &selection.request(elabora_user_id))?;
    let entry = ResponsablePayload::from_user(
        &selection.user,
        resolution.code,
        selection.fallback_nombre.as_deref(),
    )?;
    Ok((resolution, entry))
}
