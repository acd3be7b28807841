//! Responsibility role resolution.
//!
//! Given a backend responsibility code, a user record, and optional hints,
//! decide which [`Role`] the user holds. Resolution order, first match wins:
//!
//! 1. An explicit role supplied by the caller.
//! 2. A free-text role name, matched with [`Role::from_name`].
//! 3. The user is the document's designated originator → `ELABORA`.
//! 4. The code is already bound in the [`RoleCodeRegistry`].
//!
//! When steps 1–3 decide the role, the code is learned by the registry so
//! later selections carrying the same code resolve without hints.
//!
//! Resolution is split into a pure planning step and a commit step so that a
//! batch (see [`crate::payload`]) can resolve every selection before touching
//! the registry.

use serde_json::Value;
use tracing::debug;

use crate::error::ResolveError;
use crate::registry::RoleCodeRegistry;
use crate::role::Role;
use crate::signatory::{UserRecord, parse_integer};

/// Which resolution step decided the role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedBy {
    /// The caller supplied the role.
    Explicit,
    /// A free-text role name matched.
    Name,
    /// The user is the designated originator.
    Originator,
    /// The code was already known to the registry.
    Registry,
}

impl ResolvedBy {
    /// Whether this resolution teaches the registry something.
    #[must_use]
    pub fn is_learnable(self) -> bool {
        !matches!(self, Self::Registry)
    }
}

/// A decided role, not yet committed to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Resolved role.
    pub role: Role,
    /// Parsed responsibility code.
    pub code: i64,
    /// Step that decided the role.
    pub by: ResolvedBy,
}

/// Input to role resolution.
#[derive(Debug, Clone, Copy)]
pub struct RoleRequest<'a> {
    /// Backend responsibility code; required, numeric or numeric-like.
    pub responsabilidad_id: Option<&'a Value>,
    /// The user being assigned.
    pub user: &'a UserRecord,
    /// Already-known canonical role.
    pub role: Option<Role>,
    /// Free-text role name.
    pub role_name: Option<&'a str>,
    /// Id of the user designated `ELABORA` for the document.
    pub elabora_user_id: Option<i64>,
}

impl<'a> RoleRequest<'a> {
    /// Request with no hints.
    #[must_use]
    pub fn new(user: &'a UserRecord, responsabilidad_id: Option<&'a Value>) -> Self {
        Self {
            responsabilidad_id,
            user,
            role: None,
            role_name: None,
            elabora_user_id: None,
        }
    }

    /// Supply an explicit role.
    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    /// Supply a free-text role name.
    #[must_use]
    pub fn with_role_name(mut self, name: &'a str) -> Self {
        self.role_name = Some(name);
        self
    }

    /// Supply the document originator's user id.
    #[must_use]
    pub fn with_elabora_user_id(mut self, user_id: i64) -> Self {
        self.elabora_user_id = Some(user_id);
        self
    }
}

/// Decide the role for `request` without modifying the registry.
///
/// # Errors
///
/// - [`ResolveError::ResponsibilityCodeMissing`] if the code is absent or not numeric.
/// - [`ResolveError::MissingIdentifier`] if the originator check is needed
///   and the user has no id.
/// - [`ResolveError::RoleUndeterminable`] if no step matched.
pub fn plan_role(
    registry: &RoleCodeRegistry,
    request: &RoleRequest<'_>,
) -> Result<Resolution, ResolveError> {
    plan_role_with(|code| registry.lookup(code), request)
}

/// Like [`plan_role`], but the last step consults `lookup` instead of a
/// registry. Batch builds use this to see codes learned earlier in the same
/// batch before anything is committed.
///
/// # Errors
///
/// See [`plan_role`].
pub fn plan_role_with(
    lookup: impl Fn(i64) -> Option<Role>,
    request: &RoleRequest<'_>,
) -> Result<Resolution, ResolveError> {
    let code = parse_code(request.responsabilidad_id)?;
    let decided = |role, by| Ok(Resolution { role, code, by });

    if let Some(role) = request.role {
        return decided(role, ResolvedBy::Explicit);
    }

    if let Some(role) = request.role_name.and_then(Role::from_name) {
        return decided(role, ResolvedBy::Name);
    }

    if let Some(elabora) = request.elabora_user_id {
        if request.user.require_user_id()? == elabora {
            return decided(Role::Elabora, ResolvedBy::Originator);
        }
    }

    match lookup(code) {
        Some(role) => decided(role, ResolvedBy::Registry),
        None => Err(ResolveError::RoleUndeterminable { code }),
    }
}

/// Record a planned resolution in the registry if it was decided by a hint.
pub fn commit(registry: &RoleCodeRegistry, resolution: &Resolution) {
    if resolution.by.is_learnable() {
        registry.learn(resolution.code, resolution.role);
    }
}

/// Resolve the role for `request`, learning the code when a hint decided it.
///
/// # Errors
///
/// See [`plan_role`].
pub fn resolve_role(
    registry: &RoleCodeRegistry,
    request: &RoleRequest<'_>,
) -> Result<Role, ResolveError> {
    let resolution = plan_role(registry, request)?;
    debug!(
        code = resolution.code,
        role = %resolution.role,
        by = ?resolution.by,
        "responsibility resolved"
    );
    commit(registry, &resolution);
    Ok(resolution.role)
}

fn parse_code(value: Option<&Value>) -> Result<i64, ResolveError> {
    value
        .and_then(parse_integer)
        .ok_or_else(|| ResolveError::ResponsibilityCodeMissing {
            found: value.map_or_else(|| "nothing".to_owned(), Value::to_string),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn user(id: i64) -> UserRecord {
        UserRecord::new().with("userId", id)
    }

    // ── resolution order ─────────────────────────────────────────────

    #[test]
    fn explicit_role_dominates_other_hints() {
        let registry = RoleCodeRegistry::with_defaults();
        let u = user(5);
        let code = json!(1);
        let request = RoleRequest::new(&u, Some(&code))
            .with_role(Role::Enterado)
            .with_role_name("REVISA")
            .with_elabora_user_id(5);
        assert_eq!(resolve_role(&registry, &request).unwrap(), Role::Enterado);
    }

    #[test]
    fn role_name_beats_originator_and_registry() {
        let registry = RoleCodeRegistry::with_defaults();
        let u = user(5);
        let code = json!(1);
        let request = RoleRequest::new(&u, Some(&code))
            .with_role_name("Aprobación")
            .with_elabora_user_id(5);
        assert_eq!(resolve_role(&registry, &request).unwrap(), Role::Aprueba);
    }

    #[test]
    fn unmatched_role_name_falls_through() {
        let registry = RoleCodeRegistry::with_defaults();
        let u = user(5);
        let code = json!(3);
        let request = RoleRequest::new(&u, Some(&code)).with_role_name("Firma");
        assert_eq!(resolve_role(&registry, &request).unwrap(), Role::Enterado);
    }

    #[test]
    fn originator_resolves_to_elabora() {
        let registry = RoleCodeRegistry::with_defaults();
        let u = user(5);
        let code = json!(2);
        let request = RoleRequest::new(&u, Some(&code)).with_elabora_user_id(5);
        assert_eq!(resolve_role(&registry, &request).unwrap(), Role::Elabora);
    }

    #[test]
    fn non_originator_uses_registry() {
        let registry = RoleCodeRegistry::with_defaults();
        let u = user(6);
        let code = json!("2");
        let request = RoleRequest::new(&u, Some(&code)).with_elabora_user_id(5);
        assert_eq!(resolve_role(&registry, &request).unwrap(), Role::Aprueba);
    }

    // ── failures ─────────────────────────────────────────────────────

    #[test]
    fn unknown_code_without_hints_is_undeterminable() {
        let registry = RoleCodeRegistry::with_defaults();
        let u = user(5);
        let code = json!(77);
        let err = resolve_role(&registry, &RoleRequest::new(&u, Some(&code))).unwrap_err();
        assert!(matches!(err, ResolveError::RoleUndeterminable { code: 77 }));
    }

    #[test]
    fn missing_code_fails_even_with_explicit_role() {
        let registry = RoleCodeRegistry::with_defaults();
        let u = user(5);
        let request = RoleRequest::new(&u, None).with_role(Role::Revisa);
        let err = resolve_role(&registry, &request).unwrap_err();
        assert!(matches!(err, ResolveError::ResponsibilityCodeMissing { .. }));
    }

    #[test]
    fn non_numeric_code_fails() {
        let registry = RoleCodeRegistry::with_defaults();
        let u = user(5);
        let code = json!("revisa");
        let err = resolve_role(&registry, &RoleRequest::new(&u, Some(&code))).unwrap_err();
        assert!(
            matches!(err, ResolveError::ResponsibilityCodeMissing { ref found } if found.contains("revisa"))
        );
    }

    #[test]
    fn originator_check_requires_user_id() {
        let registry = RoleCodeRegistry::with_defaults();
        let anonymous = UserRecord::new().with("nombre", "sin id");
        let code = json!(1);
        let request = RoleRequest::new(&anonymous, Some(&code)).with_elabora_user_id(5);
        let err = resolve_role(&registry, &request).unwrap_err();
        assert!(matches!(err, ResolveError::MissingIdentifier));
    }

    // ── learning ─────────────────────────────────────────────────────

    #[test]
    fn hinted_resolution_teaches_registry() {
        let registry = RoleCodeRegistry::with_defaults();
        let u = user(5);
        let code = json!(40);
        resolve_role(
            &registry,
            &RoleRequest::new(&u, Some(&code)).with_role_name("REVISION"),
        )
        .unwrap();

        // No hints needed the second time.
        let other = user(6);
        let role = resolve_role(&registry, &RoleRequest::new(&other, Some(&code))).unwrap();
        assert_eq!(role, Role::Revisa);
    }

    #[test]
    fn originator_resolution_teaches_registry() {
        let registry = RoleCodeRegistry::new();
        let u = user(5);
        let code = json!(90);
        resolve_role(
            &registry,
            &RoleRequest::new(&u, Some(&code)).with_elabora_user_id(5),
        )
        .unwrap();
        assert_eq!(registry.lookup(90), Some(Role::Elabora));
    }

    #[test]
    fn plan_does_not_touch_registry() {
        let registry = RoleCodeRegistry::new();
        let u = user(5);
        let code = json!(12);
        let planned =
            plan_role(&registry, &RoleRequest::new(&u, Some(&code)).with_role(Role::Aprueba))
                .unwrap();
        assert_eq!(planned.by, ResolvedBy::Explicit);
        assert!(registry.is_empty());

        commit(&registry, &planned);
        assert_eq!(registry.lookup(12), Some(Role::Aprueba));
    }

    #[test]
    fn registry_resolution_is_not_relearned() {
        let registry = RoleCodeRegistry::with_defaults();
        let u = user(5);
        let code = json!(4);
        let planned = plan_role(&registry, &RoleRequest::new(&u, Some(&code))).unwrap();
        assert_eq!(planned.by, ResolvedBy::Registry);
        assert!(!planned.by.is_learnable());
    }
}
