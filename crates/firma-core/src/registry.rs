//! Learned mapping from backend responsibility codes to roles.
//!
//! Backends identify responsibilities with opaque integers whose meaning is
//! not known in advance. The registry starts from seed codes and learns new
//! bindings as selections are resolved by name or by an explicit role.
//!
//! # Invariants
//!
//! - Append-only: entries are never removed.
//! - Never rebinds: once a code is bound to a role, a later attempt to bind it
//!   to a different role is refused (and logged) and the original binding
//!   stays in place.
//! - Safe under concurrent learners: insertion goes through the map's entry
//!   API, so two racing writers of the same fact produce one entry, and a
//!   racing writer of a conflicting fact loses without overwriting.

use std::collections::{BTreeMap, BTreeSet};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::role::Role;

/// Outcome of a [`RoleCodeRegistry::learn`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Learned {
    /// The code was unseen and is now bound to the requested role.
    Inserted,
    /// The code was already bound; carries the existing role, which may
    /// differ from the one requested.
    AlreadyBound(Role),
}

/// One entry of a backend responsibility catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Backend responsibility code.
    pub id: i64,
    /// Backend display name, e.g. `"Revisión"`.
    #[serde(default)]
    pub nombre: String,
}

/// How each catalogue entry was handled by [`RoleCodeRegistry::learn_catalog`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogReport {
    /// Entries bound by fragment-matching their name.
    pub by_name: Vec<(i64, Role)>,
    /// Entries bound by their position in the catalogue.
    pub by_position: Vec<(i64, Role)>,
    /// Codes that could not be bound (unrecognised name, no free position,
    /// or already bound to a different role).
    pub skipped: Vec<i64>,
}

/// Process-scoped, append-only `code → role` map.
#[derive(Debug, Default, Clone)]
pub struct RoleCodeRegistry {
    codes: DashMap<i64, Role>,
}

impl RoleCodeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            codes: DashMap::new(),
        }
    }

    /// Create a registry seeded with each role's default code.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::with_seeds(std::iter::empty())
    }

    /// Create a registry from explicit seeds, then fill in the default code
    /// of every role whose default code is still unbound.
    ///
    /// Explicit seeds are applied first, so they take precedence over a
    /// conflicting default.
    #[must_use]
    pub fn with_seeds(seeds: impl IntoIterator<Item = (i64, Role)>) -> Self {
        let registry = Self::new();
        for (code, role) in seeds {
            registry.codes.entry(code).or_insert(role);
        }
        for role in Role::CATALOG_ORDER {
            registry.codes.entry(role.default_code()).or_insert(role);
        }
        registry
    }

    /// Role bound to `code`, if any.
    #[must_use]
    pub fn lookup(&self, code: i64) -> Option<Role> {
        self.codes.get(&code).map(|r| *r)
    }

    /// Bind `code` to `role` unless the code is already bound.
    pub fn learn(&self, code: i64, role: Role) -> Learned {
        match self.codes.entry(code) {
            Entry::Occupied(existing) => {
                let bound = *existing.get();
                if bound != role {
                    warn!(
                        code,
                        bound = %bound,
                        requested = %role,
                        "refusing to rebind responsibility code"
                    );
                }
                Learned::AlreadyBound(bound)
            }
            Entry::Vacant(slot) => {
                slot.insert(role);
                info!(code, role = %role, "responsibility code learned");
                Learned::Inserted
            }
        }
    }

    /// Lowest code bound to `role`, if any.
    #[must_use]
    pub fn code_for(&self, role: Role) -> Option<i64> {
        self.codes
            .iter()
            .filter(|entry| *entry.value() == role)
            .map(|entry| *entry.key())
            .min()
    }

    /// Ordered copy of every binding.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<i64, Role> {
        self.codes
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    /// Number of known codes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether no code is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Learn bindings from a backend responsibility catalogue.
    ///
    /// Entries whose name fragment-matches a role are bound by name. Each
    /// remaining entry is bound to the role at its own index in
    /// [`Role::CATALOG_ORDER`], provided no entry of this catalogue already
    /// claimed that role by name.
    pub fn learn_catalog(&self, entries: &[CatalogEntry]) -> CatalogReport {
        let named: Vec<Option<Role>> = entries.iter().map(|e| Role::from_name(&e.nombre)).collect();
        let claimed: BTreeSet<Role> = named.iter().flatten().copied().collect();

        let mut report = CatalogReport::default();
        for (index, (entry, by_name)) in entries.iter().zip(&named).enumerate() {
            let (role, positional) = match by_name {
                Some(role) => (*role, false),
                None => match Role::CATALOG_ORDER.get(index) {
                    Some(role) if !claimed.contains(role) => (*role, true),
                    _ => {
                        report.skipped.push(entry.id);
                        continue;
                    }
                },
            };

            match self.learn(entry.id, role) {
                Learned::AlreadyBound(bound) if bound != role => report.skipped.push(entry.id),
                _ if positional => report.by_position.push((entry.id, role)),
                _ => report.by_name.push((entry.id, role)),
            }
        }

        info!(
            by_name = report.by_name.len(),
            by_position = report.by_position.len(),
            skipped = report.skipped.len(),
            "responsibility catalog learned"
        );

        report
    }
}
