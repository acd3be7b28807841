//! Per-document signing state.
//!
//! The ledger holds one entry per `(document, user, role)`. An entry starts
//! pending and moves to signed exactly once; there is no way back. A user may
//! hold several pending roles on the same document and must then say which
//! one they are signing for.
//!
//! `ENTERADO` entries are tracked like any other but never hold up document
//! completion.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::WorkflowError;
use crate::payload::ResponsablesPayload;
use crate::role::Role;
use crate::signature::SignatureArtifact;

/// What a signer presented when signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SignatureEvidence {
    /// A freshly validated artifact, identified by its content hash.
    #[serde(rename_all = "camelCase")]
    Artifact { content_hash: String },
    /// The signer's previously stored signature.
    StoredSignature,
}

/// State of one ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum EntryState {
    Pending,
    #[serde(rename_all = "camelCase")]
    Signed {
        evidence: SignatureEvidence,
        signed_at: DateTime<Utc>,
    },
}

impl EntryState {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// A ledger entry with its key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub document_id: i64,
    pub user_id: i64,
    pub role: Role,
    #[serde(flatten)]
    pub state: EntryState,
}

/// A request to sign one pending entry.
#[derive(Debug, Clone, Copy)]
pub struct SignRequest<'a> {
    pub document_id: i64,
    /// The authenticated user performing the action.
    pub acting_user_id: i64,
    /// The user whose entry is being signed.
    pub user_id: i64,
    /// Required when the user holds more than one pending role.
    pub role: Option<Role>,
    pub artifact: Option<&'a SignatureArtifact>,
    pub use_stored_signature: bool,
}

/// Result of a sign attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SignOutcome {
    /// The entry for `role` moved to signed.
    Signed { role: Role },
    /// The user has nothing pending on the document; nothing changed.
    NothingPending,
}

type Key = (i64, i64, Role);

/// In-memory signing ledger.
#[derive(Debug, Clone, Default)]
pub struct SigningLedger {
    entries: BTreeMap<Key, EntryState>,
}

impl SigningLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pending entry. Returns `false` if the tuple already exists, in
    /// which case its state is left alone.
    pub fn assign(&mut self, document_id: i64, user_id: i64, role: Role) -> bool {
        let key = (document_id, user_id, role);
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, EntryState::Pending);
        debug!(document_id, user_id, role = %role, "signature pending");
        true
    }

    /// Add a pending entry for every signatory in `payload`. Returns how many
    /// entries were new.
    pub fn assign_payload(&mut self, document_id: i64, payload: &ResponsablesPayload) -> usize {
        let mut created = 0;
        for (role, entry) in payload.entries() {
            if self.assign(document_id, entry.user_id, role) {
                created += 1;
            }
        }
        created
    }

    /// Sign one pending entry.
    ///
    /// # Errors
    ///
    /// - [`WorkflowError::ActorMismatch`] if the acting user is not the signer.
    /// - [`WorkflowError::MissingEvidence`] if neither an artifact nor the
    ///   stored-signature flag is given.
    /// - [`WorkflowError::RoleNotPending`] if the selected role is not pending.
    /// - [`WorkflowError::RoleSelectionRequired`] if several roles are pending
    ///   and none was selected.
    pub fn sign(&mut self, request: &SignRequest<'_>) -> Result<SignOutcome, WorkflowError> {
        self.sign_at(request, Utc::now())
    }

    /// [`sign`](Self::sign) with an explicit timestamp.
    ///
    /// # Errors
    ///
    /// See [`sign`](Self::sign).
    pub fn sign_at(
        &mut self,
        request: &SignRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<SignOutcome, WorkflowError> {
        let SignRequest {
            document_id,
            acting_user_id,
            user_id,
            ..
        } = *request;

        let pending = self.signable_roles(document_id, acting_user_id, user_id)?;
        if pending.is_empty() {
            debug!(document_id, user_id, "sign attempt with nothing pending");
            return Ok(SignOutcome::NothingPending);
        }

        let evidence = match (request.artifact, request.use_stored_signature) {
            (Some(artifact), _) => SignatureEvidence::Artifact {
                content_hash: artifact.content_hash(),
            },
            (None, true) => SignatureEvidence::StoredSignature,
            (None, false) => {
                return Err(WorkflowError::MissingEvidence {
                    document_id,
                    user_id,
                });
            }
        };

        let role = match request.role {
            Some(role) if pending.contains(&role) => role,
            Some(role) => {
                return Err(WorkflowError::RoleNotPending {
                    document_id,
                    user_id,
                    role,
                });
            }
            None if pending.len() == 1 => pending[0],
            None => {
                return Err(WorkflowError::RoleSelectionRequired {
                    document_id,
                    user_id,
                    pending,
                });
            }
        };

        self.entries.insert(
            (document_id, user_id, role),
            EntryState::Signed {
                evidence,
                signed_at: now,
            },
        );
        info!(document_id, user_id, role = %role, "document signed");
        Ok(SignOutcome::Signed { role })
    }

    /// Roles `acting_user_id` may sign for `user_id` on `document_id`.
    ///
    /// Performs the checks of [`sign`](Self::sign) that need no evidence, so
    /// callers can reject a request before doing expensive work on its
    /// signature. An empty result means a sign call would be a no-op.
    ///
    /// # Errors
    ///
    /// [`WorkflowError::ActorMismatch`] if the acting user is not the signer.
    pub fn signable_roles(
        &self,
        document_id: i64,
        acting_user_id: i64,
        user_id: i64,
    ) -> Result<Vec<Role>, WorkflowError> {
        if acting_user_id != user_id {
            return Err(WorkflowError::ActorMismatch {
                acting_user_id,
                user_id,
            });
        }
        Ok(self.pending_for(document_id, user_id))
    }

    /// Roles still pending for `user_id` on `document_id`, in role order.
    #[must_use]
    pub fn pending_for(&self, document_id: i64, user_id: i64) -> Vec<Role> {
        self.entries
            .range((document_id, user_id, Role::Elabora)..=(document_id, user_id, Role::Enterado))
            .filter(|(_, state)| state.is_pending())
            .map(|((_, _, role), _)| *role)
            .collect()
    }

    /// Every entry of `document_id`, ordered by user then role.
    #[must_use]
    pub fn entries(&self, document_id: i64) -> Vec<LedgerEntry> {
        self.document(document_id)
            .map(|(&(document_id, user_id, role), state)| LedgerEntry {
                document_id,
                user_id,
                role,
                state: state.clone(),
            })
            .collect()
    }

    /// Whether `document_id` has entries and none of its gating entries is
    /// still pending.
    #[must_use]
    pub fn is_complete(&self, document_id: i64) -> bool {
        let mut entries = self.document(document_id).peekable();
        entries.peek().is_some()
            && entries.all(|((_, _, role), state)| !role.gates_completion() || !state.is_pending())
    }

    fn document(&self, document_id: i64) -> impl Iterator<Item = (&Key, &EntryState)> {
        self.entries
            .range((document_id, i64::MIN, Role::Elabora)..=(document_id, i64::MAX, Role::Enterado))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::payload::ResponsablePayload;
    use crate::raster::encode_png;
    use crate::signature::{SignatureLimits, validate_and_sanitize};

    const DOC: i64 = 100;

    fn request(user_id: i64, role: Option<Role>) -> SignRequest<'static> {
        SignRequest {
            document_id: DOC,
            acting_user_id: user_id,
            user_id,
            role,
            artifact: None,
            use_stored_signature: true,
        }
    }

    fn artifact() -> SignatureArtifact {
        let mut image = RgbaImage::from_pixel(300, 100, Rgba([255, 255, 255, 255]));
        for x in 0..300 {
            image.put_pixel(x, 50, Rgba([0, 0, 0, 255]));
        }
        for y in 0..100 {
            image.put_pixel(0, y, Rgba([0, 0, 0, 255]));
            image.put_pixel(299, y, Rgba([0, 0, 0, 255]));
        }
        let bytes = encode_png(&image).unwrap();
        validate_and_sanitize(&bytes, "image/png", &SignatureLimits::default()).unwrap()
    }

    fn entry(user_id: i64) -> ResponsablePayload {
        ResponsablePayload {
            user_id,
            nombre: format!("Usuario {user_id}"),
            puesto: None,
            gerencia: None,
            responsabilidad_id: 1,
        }
    }

    // ── assignment ───────────────────────────────────────────────────

    #[test]
    fn assign_is_idempotent() {
        let mut ledger = SigningLedger::new();
        assert!(ledger.assign(DOC, 1, Role::Revisa));
        assert!(!ledger.assign(DOC, 1, Role::Revisa));
        assert_eq!(ledger.pending_for(DOC, 1), vec![Role::Revisa]);
    }

    #[test]
    fn reassign_never_reopens_signed_entry() {
        let mut ledger = SigningLedger::new();
        ledger.assign(DOC, 1, Role::Revisa);
        ledger.sign(&request(1, None)).unwrap();
        assert!(!ledger.assign(DOC, 1, Role::Revisa));
        assert!(ledger.pending_for(DOC, 1).is_empty());
    }

    #[test]
    fn assign_payload_creates_one_entry_per_signatory() {
        let mut payload = ResponsablesPayload::default();
        payload.insert(Role::Elabora, entry(1));
        payload.insert(Role::Revisa, entry(2));
        payload.insert(Role::Aprueba, entry(3));
        payload.insert(Role::Enterado, entry(2));

        let mut ledger = SigningLedger::new();
        assert_eq!(ledger.assign_payload(DOC, &payload), 4);
        assert_eq!(ledger.assign_payload(DOC, &payload), 0);
        assert_eq!(ledger.pending_for(DOC, 2), vec![Role::Revisa, Role::Enterado]);
    }

    // ── signing ──────────────────────────────────────────────────────

    #[test]
    fn single_pending_role_needs_no_selection() {
        let mut ledger = SigningLedger::new();
        ledger.assign(DOC, 1, Role::Aprueba);
        let outcome = ledger.sign(&request(1, None)).unwrap();
        assert_eq!(outcome, SignOutcome::Signed { role: Role::Aprueba });
    }

    #[test]
    fn signing_with_artifact_records_hash() {
        let artifact = artifact();
        let mut ledger = SigningLedger::new();
        ledger.assign(DOC, 1, Role::Revisa);
        let req = SignRequest {
            artifact: Some(&artifact),
            use_stored_signature: false,
            ..request(1, None)
        };
        ledger.sign(&req).unwrap();

        let entries = ledger.entries(DOC);
        assert!(matches!(
            &entries[0].state,
            EntryState::Signed { evidence: SignatureEvidence::Artifact { content_hash }, .. }
                if *content_hash == artifact.content_hash()
        ));
    }

    #[test]
    fn multiple_pending_roles_require_selection() {
        let mut ledger = SigningLedger::new();
        ledger.assign(DOC, 1, Role::Revisa);
        ledger.assign(DOC, 1, Role::Aprueba);

        let err = ledger.sign(&request(1, None)).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::RoleSelectionRequired { ref pending, .. }
                if *pending == vec![Role::Revisa, Role::Aprueba]
        ));

        ledger.sign(&request(1, Some(Role::Aprueba))).unwrap();
        assert_eq!(ledger.pending_for(DOC, 1), vec![Role::Revisa]);
        // One left, so no selection needed now.
        ledger.sign(&request(1, None)).unwrap();
        assert!(ledger.pending_for(DOC, 1).is_empty());
    }

    #[test]
    fn selected_role_must_be_pending() {
        let mut ledger = SigningLedger::new();
        ledger.assign(DOC, 1, Role::Revisa);
        let err = ledger.sign(&request(1, Some(Role::Aprueba))).unwrap_err();
        assert!(matches!(err, WorkflowError::RoleNotPending { role: Role::Aprueba, .. }));
    }

    #[test]
    fn acting_user_must_match() {
        let mut ledger = SigningLedger::new();
        ledger.assign(DOC, 1, Role::Revisa);
        let req = SignRequest {
            acting_user_id: 2,
            ..request(1, None)
        };
        let err = ledger.sign(&req).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ActorMismatch {
                acting_user_id: 2,
                user_id: 1
            }
        ));
        assert_eq!(ledger.pending_for(DOC, 1), vec![Role::Revisa]);
    }

    #[test]
    fn signable_roles_checks_actor_without_evidence() {
        let mut ledger = SigningLedger::new();
        ledger.assign(DOC, 1, Role::Revisa);
        ledger.assign(DOC, 1, Role::Enterado);

        assert_eq!(
            ledger.signable_roles(DOC, 1, 1).unwrap(),
            vec![Role::Revisa, Role::Enterado]
        );
        assert!(ledger.signable_roles(DOC, 2, 2).unwrap().is_empty());
        assert!(matches!(
            ledger.signable_roles(DOC, 2, 1),
            Err(WorkflowError::ActorMismatch {
                acting_user_id: 2,
                user_id: 1
            })
        ));
    }

    #[test]
    fn evidence_is_required() {
        let mut ledger = SigningLedger::new();
        ledger.assign(DOC, 1, Role::Revisa);
        let req = SignRequest {
            use_stored_signature: false,
            ..request(1, None)
        };
        assert!(matches!(
            ledger.sign(&req),
            Err(WorkflowError::MissingEvidence { .. })
        ));
    }

    #[test]
    fn nothing_pending_is_a_no_op() {
        let mut ledger = SigningLedger::new();
        assert_eq!(
            ledger.sign(&request(1, None)).unwrap(),
            SignOutcome::NothingPending
        );
        assert!(ledger.entries(DOC).is_empty());
    }

    // ── completion ───────────────────────────────────────────────────

    #[test]
    fn enterado_does_not_block_completion() {
        let mut ledger = SigningLedger::new();
        ledger.assign(DOC, 1, Role::Elabora);
        ledger.assign(DOC, 2, Role::Revisa);
        ledger.assign(DOC, 3, Role::Enterado);
        assert!(!ledger.is_complete(DOC));

        ledger.sign(&request(1, None)).unwrap();
        ledger.sign(&request(2, None)).unwrap();
        assert!(ledger.is_complete(DOC));
        assert_eq!(ledger.pending_for(DOC, 3), vec![Role::Enterado]);
    }

    #[test]
    fn unknown_document_is_not_complete() {
        let ledger = SigningLedger::new();
        assert!(!ledger.is_complete(DOC));
    }

    #[test]
    fn documents_are_isolated() {
        let mut ledger = SigningLedger::new();
        ledger.assign(DOC, 1, Role::Revisa);
        ledger.assign(DOC + 1, 1, Role::Revisa);
        ledger.sign(&request(1, None)).unwrap();
        assert!(ledger.is_complete(DOC));
        assert_eq!(ledger.pending_for(DOC + 1, 1), vec![Role::Revisa]);
    }

    #[test]
    fn entry_serializes_flat() {
        let mut ledger = SigningLedger::new();
        ledger.assign(DOC, 1, Role::Revisa);
        let value = serde_json::to_value(&ledger.entries(DOC)[0]).unwrap();
        assert_eq!(value["state"], "pending");
        assert_eq!(value["role"], "REVISA");
        assert_eq!(value["documentId"], DOC);
    }
}
