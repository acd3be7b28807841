//! Signatory assignment bookkeeping.
//!
//! The assignment form keeps an ordered list of signatories, each of which
//! may or may not have been given a role yet. Submission is allowed only once
//! the set is ready: an originator, at least one reviewer, at least one
//! approver, and no signatory left without a role. Nothing here fills in a
//! missing role on the caller's behalf.

use serde::Serialize;

use crate::error::AssignmentError;
use crate::role::Role;
use crate::signatory::Signatory;

/// Ordered signatory set with unique user ids.
#[derive(Debug, Clone, Default)]
pub struct AssignmentSet {
    signatories: Vec<Signatory>,
}

/// Snapshot of how far an [`AssignmentSet`] is from submittable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Readiness {
    pub elabora_set: bool,
    pub revisa_count: usize,
    pub aprueba_count: usize,
    /// Users still without a role, in insertion order.
    pub unassigned: Vec<i64>,
}

impl Readiness {
    /// Required roles with no signatory.
    #[must_use]
    pub fn missing_roles(&self) -> Vec<Role> {
        let mut missing = Vec::new();
        if !self.elabora_set {
            missing.push(Role::Elabora);
        }
        if self.revisa_count == 0 {
            missing.push(Role::Revisa);
        }
        if self.aprueba_count == 0 {
            missing.push(Role::Aprueba);
        }
        missing
    }

    #[must_use]
    pub fn is_submittable(&self) -> bool {
        self.missing_roles().is_empty() && self.unassigned.is_empty()
    }
}

impl AssignmentSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from signatories in form order.
    ///
    /// # Errors
    ///
    /// Returns [`AssignmentError::DuplicateSignatory`] for the first user id
    /// that appears twice.
    pub fn from_signatories(
        signatories: impl IntoIterator<Item = Signatory>,
    ) -> Result<Self, AssignmentError> {
        let mut set = Self::new();
        for signatory in signatories {
            set.add(signatory)?;
        }
        Ok(set)
    }

    /// Append a signatory.
    ///
    /// # Errors
    ///
    /// Returns [`AssignmentError::DuplicateSignatory`] if the user is already
    /// in the set.
    pub fn add(&mut self, signatory: Signatory) -> Result<(), AssignmentError> {
        if self.get(signatory.user_id).is_some() {
            return Err(AssignmentError::DuplicateSignatory {
                user_id: signatory.user_id,
            });
        }
        self.signatories.push(signatory);
        Ok(())
    }

    /// Give `user_id` a role, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`AssignmentError::UnknownSignatory`] if the user is not in the set.
    pub fn assign_role(&mut self, user_id: i64, role: Role) -> Result<(), AssignmentError> {
        let signatory = self
            .signatories
            .iter_mut()
            .find(|s| s.user_id == user_id)
            .ok_or(AssignmentError::UnknownSignatory { user_id })?;
        signatory.role = Some(role);
        Ok(())
    }

    /// Remove and return a signatory.
    ///
    /// # Errors
    ///
    /// Returns [`AssignmentError::UnknownSignatory`] if the user is not in the set.
    pub fn remove(&mut self, user_id: i64) -> Result<Signatory, AssignmentError> {
        let index = self
            .signatories
            .iter()
            .position(|s| s.user_id == user_id)
            .ok_or(AssignmentError::UnknownSignatory { user_id })?;
        Ok(self.signatories.remove(index))
    }

    #[must_use]
    pub fn get(&self, user_id: i64) -> Option<&Signatory> {
        self.signatories.iter().find(|s| s.user_id == user_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signatory> {
        self.signatories.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.signatories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatories.is_empty()
    }

    /// Count signatories per required role and collect the unassigned ones.
    #[must_use]
    pub fn readiness(&self) -> Readiness {
        let count = |role| {
            self.signatories
                .iter()
                .filter(|s| s.role == Some(role))
                .count()
        };
        Readiness {
            elabora_set: count(Role::Elabora) > 0,
            revisa_count: count(Role::Revisa),
            aprueba_count: count(Role::Aprueba),
            unassigned: self
                .signatories
                .iter()
                .filter(|s| s.role.is_none())
                .map(|s| s.user_id)
                .collect(),
        }
    }

    /// Fail unless the set is ready to submit.
    ///
    /// # Errors
    ///
    /// Returns [`AssignmentError::Incomplete`] naming missing roles and
    /// unassigned users.
    pub fn ensure_submittable(&self) -> Result<(), AssignmentError> {
        let readiness = self.readiness();
        if readiness.is_submittable() {
            Ok(())
        } else {
            Err(AssignmentError::Incomplete {
                missing: readiness.missing_roles(),
                unassigned: readiness.unassigned,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signatory(user_id: i64, role: Option<Role>) -> Signatory {
        Signatory {
            user_id,
            display_name: format!("Usuario {user_id}"),
            role,
        }
    }

    fn complete_set() -> AssignmentSet {
        let mut set = AssignmentSet::new();
        set.add(signatory(1, Some(Role::Elabora))).unwrap();
        set.add(signatory(2, Some(Role::Revisa))).unwrap();
        set.add(signatory(3, Some(Role::Aprueba))).unwrap();
        set
    }

    // ── membership ───────────────────────────────────────────────────

    #[test]
    fn duplicate_user_is_rejected() {
        let mut set = complete_set();
        let err = set.add(signatory(2, None)).unwrap_err();
        assert!(matches!(err, AssignmentError::DuplicateSignatory { user_id: 2 }));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn from_signatories_keeps_order_and_rejects_duplicates() {
        let set = AssignmentSet::from_signatories([
            signatory(3, None),
            signatory(1, Some(Role::Elabora)),
        ])
        .unwrap();
        let ids: Vec<i64> = set.iter().map(|s| s.user_id).collect();
        assert_eq!(ids, vec![3, 1]);

        let err = AssignmentSet::from_signatories([signatory(5, None), signatory(5, None)])
            .unwrap_err();
        assert!(matches!(err, AssignmentError::DuplicateSignatory { user_id: 5 }));
    }

    #[test]
    fn assign_and_remove_unknown_user_fail() {
        let mut set = AssignmentSet::new();
        assert!(matches!(
            set.assign_role(9, Role::Revisa),
            Err(AssignmentError::UnknownSignatory { user_id: 9 })
        ));
        assert!(set.remove(9).is_err());
    }

    #[test]
    fn remove_preserves_order_of_the_rest() {
        let mut set = complete_set();
        set.remove(2).unwrap();
        let ids: Vec<i64> = set.iter().map(|s| s.user_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    // ── readiness ────────────────────────────────────────────────────

    #[test]
    fn complete_set_is_submittable() {
        let set = complete_set();
        assert!(set.readiness().is_submittable());
        set.ensure_submittable().unwrap();
    }

    #[test]
    fn unassigned_signatory_blocks_submission() {
        let mut set = complete_set();
        set.add(signatory(4, None)).unwrap();
        let readiness = set.readiness();
        assert_eq!(readiness.unassigned, vec![4]);
        assert!(!readiness.is_submittable());

        set.assign_role(4, Role::Enterado).unwrap();
        assert!(set.readiness().is_submittable());
    }

    #[test]
    fn missing_approver_is_reported() {
        let mut set = complete_set();
        set.assign_role(3, Role::Revisa).unwrap();
        let err = set.ensure_submittable().unwrap_err();
        assert!(matches!(
            err,
            AssignmentError::Incomplete { ref missing, ref unassigned }
                if *missing == vec![Role::Aprueba] && unassigned.is_empty()
        ));
    }

    #[test]
    fn empty_set_is_missing_every_required_role() {
        let readiness = AssignmentSet::new().readiness();
        assert_eq!(
            readiness.missing_roles(),
            vec![Role::Elabora, Role::Revisa, Role::Aprueba]
        );
    }
}
