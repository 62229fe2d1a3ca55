//! Minimal roster diff between an observed and a desired assignment set.

use std::collections::{BTreeMap, BTreeSet};

use crate::{EmailAddress, ObservedRoster, Role, RoleAssignmentSet};

/// Operations needed to converge an observed roster onto a desired one.
///
/// Built fresh for every reconciliation pass and discarded afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDiff {
    /// Members to add, with the role they should receive.
    pub to_add: BTreeMap<EmailAddress, Role>,
    /// Existing members whose role must change, with the new role.
    pub to_update: BTreeMap<EmailAddress, Role>,
    /// Members to remove from the organization.
    pub to_remove: BTreeSet<EmailAddress>,
}

impl RosterDiff {
    /// Computes the diff from `observed` to `desired`.
    ///
    /// Pure: no update entry keeps the observed role, and the total number of
    /// operations never exceeds the size of the union of both states.
    #[must_use]
    pub fn compute(observed: &RoleAssignmentSet, desired: &RoleAssignmentSet) -> Self {
        let mut diff = Self::default();

        for (email, desired_role) in desired {
            match observed.role_of(email) {
                None => {
                    diff.to_add.insert(email.clone(), *desired_role);
                }
                Some(observed_role) if observed_role != *desired_role => {
                    diff.to_update.insert(email.clone(), *desired_role);
                }
                Some(_) => {}
            }
        }

        diff.to_remove = observed
            .iter()
            .filter(|(email, _)| !desired.contains(email))
            .map(|(email, _)| email.clone())
            .collect();

        diff
    }

    /// Computes the diff from a fetched remote roster to `desired`.
    ///
    /// Exempt members are dropped from both sides, so they never appear in
    /// any operation set. A declared member already present with an
    /// unmanaged role gets an update instead of an add; undeclared unmanaged
    /// members are left alone.
    #[must_use]
    pub fn between(observed: &ObservedRoster, desired: &RoleAssignmentSet) -> Self {
        let desired = desired.without(observed.exempt());
        let mut diff = Self::compute(observed.assignments(), &desired);

        for email in observed.unmanaged() {
            if let Some(role) = diff.to_add.remove(email) {
                diff.to_update.insert(email.clone(), role);
            }
        }

        diff
    }

    /// Returns true when the states already match.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }

    /// Total number of remote operations the diff implies.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.to_add.len() + self.to_update.len() + self.to_remove.len()
    }

    /// Applies the diff to `state` in add, update, remove order.
    #[must_use]
    pub fn apply_to(&self, state: &RoleAssignmentSet) -> RoleAssignmentSet {
        let mut next = state.clone();
        for (email, role) in self.to_add.iter().chain(self.to_update.iter()) {
            next.insert(email.clone(), *role);
        }
        for email in &self.to_remove {
            next.remove(email);
        }

        next
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::{EmailAddress, ExemptLogin, ObservedRoster, Role, RoleAssignmentSet, RosterMember};

    use super::RosterDiff;

    fn email(value: &str) -> EmailAddress {
        EmailAddress::new(value).unwrap_or_else(|_| unreachable!())
    }

    fn set(entries: &[(&str, Role)]) -> RoleAssignmentSet {
        entries
            .iter()
            .map(|(value, role)| (email(value), *role))
            .collect()
    }

    fn role_strategy() -> impl Strategy<Value = Role> {
        prop_oneof![Just(Role::Admin), Just(Role::Editor), Just(Role::Viewer)]
    }

    fn assignment_strategy() -> impl Strategy<Value = RoleAssignmentSet> {
        prop::collection::btree_map("[a-f]{1,3}", role_strategy(), 0..12).prop_map(|entries| {
            entries
                .into_iter()
                .map(|(local, role)| (email(&format!("{local}@example.com")), role))
                .collect()
        })
    }

    #[test]
    fn identical_states_produce_empty_diff() {
        let observed = set(&[("a@example.com", Role::Editor), ("b@example.com", Role::Viewer)]);

        let diff = RosterDiff::compute(&observed, &observed);

        assert!(diff.is_empty());
    }

    #[test]
    fn empty_desired_removes_every_observed_member() {
        let observed = set(&[("a@example.com", Role::Admin), ("b@example.com", Role::Viewer)]);

        let diff = RosterDiff::compute(&observed, &RoleAssignmentSet::new());

        assert!(diff.to_add.is_empty());
        assert!(diff.to_update.is_empty());
        assert_eq!(
            diff.to_remove.into_iter().collect::<Vec<_>>(),
            vec![email("a@example.com"), email("b@example.com")]
        );
    }

    #[test]
    fn mixed_states_split_into_add_update_remove() {
        let observed = set(&[("a@example.com", Role::Editor), ("b@example.com", Role::Viewer)]);
        let desired = set(&[("a@example.com", Role::Admin), ("c@example.com", Role::Viewer)]);

        let diff = RosterDiff::compute(&observed, &desired);

        assert_eq!(
            diff.to_add.into_iter().collect::<Vec<_>>(),
            vec![(email("c@example.com"), Role::Viewer)]
        );
        assert_eq!(
            diff.to_update.into_iter().collect::<Vec<_>>(),
            vec![(email("a@example.com"), Role::Admin)]
        );
        assert_eq!(
            diff.to_remove.into_iter().collect::<Vec<_>>(),
            vec![email("b@example.com")]
        );
    }

    fn member(value: &str, login: &str, role: Option<Role>) -> RosterMember {
        RosterMember {
            email: email(value),
            login: login.to_owned(),
            role,
        }
    }

    #[test]
    fn exempt_login_never_enters_the_diff() {
        let roster = vec![
            member("admin@localhost", "admin", Some(Role::Admin)),
            member("bob@example.com", "bob", Some(Role::Viewer)),
        ];
        let observed = ObservedRoster::from_members(&roster, &ExemptLogin::default());
        let desired = set(&[("bob@example.com", Role::Editor)]);

        let diff = RosterDiff::between(&observed, &desired);
        let admin = email("admin@localhost");

        assert!(!diff.to_add.contains_key(&admin));
        assert!(!diff.to_update.contains_key(&admin));
        assert!(!diff.to_remove.contains(&admin));
        assert_eq!(diff.operation_count(), 1);
    }

    #[test]
    fn declared_exempt_member_is_not_added_or_updated() {
        let roster = vec![member("admin@localhost", "admin", Some(Role::Admin))];
        let observed = ObservedRoster::from_members(&roster, &ExemptLogin::default());
        let desired = set(&[
            ("admin@localhost", Role::Viewer),
            ("c@example.com", Role::Viewer),
        ]);

        let diff = RosterDiff::between(&observed, &desired);

        assert!(!diff.to_add.contains_key(&email("admin@localhost")));
        assert!(diff.to_update.is_empty());
        assert_eq!(
            diff.to_add.into_iter().collect::<Vec<_>>(),
            vec![(email("c@example.com"), Role::Viewer)]
        );
    }

    #[test]
    fn declared_unmanaged_member_is_updated_not_added() {
        let roster = vec![
            member("n@example.com", "n", None),
            member("idle@example.com", "idle", None),
        ];
        let observed = ObservedRoster::from_members(&roster, &ExemptLogin::default());
        let desired = set(&[("n@example.com", Role::Editor)]);

        let diff = RosterDiff::between(&observed, &desired);

        assert!(diff.to_add.is_empty());
        assert_eq!(
            diff.to_update.into_iter().collect::<Vec<_>>(),
            vec![(email("n@example.com"), Role::Editor)]
        );
        assert!(diff.to_remove.is_empty());
    }

    #[test]
    fn disabled_exemption_removes_default_admin() {
        let roster = vec![member("x@example.com", "admin", Some(Role::Admin))];
        let observed = ObservedRoster::from_members(&roster, &ExemptLogin::disabled());

        let diff = RosterDiff::between(&observed, &RoleAssignmentSet::new());

        assert!(diff.to_remove.contains(&email("x@example.com")));
    }

    proptest! {
        #[test]
        fn diff_of_state_with_itself_is_empty(observed in assignment_strategy()) {
            prop_assert!(RosterDiff::compute(&observed, &observed).is_empty());
        }

        #[test]
        fn applying_diff_converges_to_desired(
            observed in assignment_strategy(),
            desired in assignment_strategy(),
        ) {
            let diff = RosterDiff::compute(&observed, &desired);
            prop_assert_eq!(diff.apply_to(&observed), desired);
        }

        #[test]
        fn updates_always_change_the_role(
            observed in assignment_strategy(),
            desired in assignment_strategy(),
        ) {
            let diff = RosterDiff::compute(&observed, &desired);
            for (email, role) in &diff.to_update {
                prop_assert_ne!(observed.role_of(email), Some(*role));
            }
        }

        #[test]
        fn exempt_emails_never_appear_in_any_operation(
            observed in assignment_strategy(),
            desired in assignment_strategy(),
        ) {
            let roster: Vec<RosterMember> = observed
                .iter()
                .map(|(email, role)| RosterMember {
                    email: email.clone(),
                    login: email.as_str().to_owned(),
                    role: Some(*role),
                })
                .collect();
            let exempt = roster
                .first()
                .map(|member| ExemptLogin::new(member.login.as_str()))
                .unwrap_or_default();
            let fetched = ObservedRoster::from_members(&roster, &exempt);

            let diff = RosterDiff::between(&fetched, &desired);
            for email in fetched.exempt() {
                prop_assert!(!diff.to_add.contains_key(email));
                prop_assert!(!diff.to_update.contains_key(email));
                prop_assert!(!diff.to_remove.contains(email));
            }
        }

        #[test]
        fn operation_count_is_bounded_by_union(
            observed in assignment_strategy(),
            desired in assignment_strategy(),
        ) {
            let diff = RosterDiff::compute(&observed, &desired);
            let union = observed
                .iter()
                .map(|(email, _)| email)
                .chain(desired.iter().map(|(email, _)| email))
                .collect::<std::collections::BTreeSet<_>>();
            prop_assert!(diff.operation_count() <= union.len());
        }
    }
}
