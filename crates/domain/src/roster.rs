//! Role assignment sets for desired and observed organization rosters.

use std::collections::{BTreeMap, BTreeSet};
use std::collections::btree_map::Iter;

use rostersync_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::{EmailAddress, ExemptLogin, Role, RosterMember};

/// Three ordered member lists, one per role, as declared by configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleLists {
    /// Emails that should hold the Admin role.
    #[serde(default)]
    pub admins: Vec<String>,
    /// Emails that should hold the Editor role.
    #[serde(default)]
    pub editors: Vec<String>,
    /// Emails that should hold the Viewer role.
    #[serde(default)]
    pub viewers: Vec<String>,
}

impl RoleLists {
    /// Returns the list declared for `role`.
    #[must_use]
    pub fn for_role(&self, role: Role) -> &[String] {
        match role {
            Role::Admin => self.admins.as_slice(),
            Role::Editor => self.editors.as_slice(),
            Role::Viewer => self.viewers.as_slice(),
        }
    }

    fn for_role_mut(&mut self, role: Role) -> &mut Vec<String> {
        match role {
            Role::Admin => &mut self.admins,
            Role::Editor => &mut self.editors,
            Role::Viewer => &mut self.viewers,
        }
    }

    /// Returns true when no list contains an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.admins.is_empty() && self.editors.is_empty() && self.viewers.is_empty()
    }
}

/// How an email listed under more than one role is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Listing an email under several roles is a validation error.
    #[default]
    Reject,
    /// The last list in admins, editors, viewers order decides the role.
    LastListWins,
}

impl DuplicatePolicy {
    /// Parses a configuration value.
    pub fn parse_transport(value: &str) -> AppResult<Self> {
        match value {
            "reject" => Ok(Self::Reject),
            "last_list_wins" => Ok(Self::LastListWins),
            _ => Err(AppError::Validation(format!(
                "unknown duplicate policy '{value}'"
            ))),
        }
    }
}

/// Mapping from member email to the single role it holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleAssignmentSet {
    assignments: BTreeMap<EmailAddress, Role>,
}

impl RoleAssignmentSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the desired state from declared role lists.
    ///
    /// Lists are walked in admins, editors, viewers order. Repeating an email
    /// inside one list is harmless; listing it under two roles is resolved by
    /// `policy`.
    pub fn from_lists(lists: &RoleLists, policy: DuplicatePolicy) -> AppResult<Self> {
        let mut assignments = BTreeMap::new();
        let mut duplicates = Vec::new();

        for role in Role::all() {
            for raw_email in lists.for_role(*role) {
                let email = EmailAddress::new(raw_email.as_str())?;
                if let Some(previous) = assignments.insert(email.clone(), *role)
                    && previous != *role
                {
                    duplicates.push(format!(
                        "'{email}' ({} and {})",
                        previous.list_key(),
                        role.list_key()
                    ));
                }
            }
        }

        if policy == DuplicatePolicy::Reject && !duplicates.is_empty() {
            return Err(AppError::Validation(format!(
                "users must be listed under exactly one role: {}",
                duplicates.join(", ")
            )));
        }

        Ok(Self { assignments })
    }

    /// Returns a copy without the given emails.
    #[must_use]
    pub fn without(&self, emails: &BTreeSet<EmailAddress>) -> Self {
        self.assignments
            .iter()
            .filter(|(email, _)| !emails.contains(*email))
            .map(|(email, role)| (email.clone(), *role))
            .collect()
    }

    /// Assigns `role` to `email`, returning the previously held role.
    pub fn insert(&mut self, email: EmailAddress, role: Role) -> Option<Role> {
        self.assignments.insert(email, role)
    }

    /// Removes `email`, returning the role it held.
    pub fn remove(&mut self, email: &EmailAddress) -> Option<Role> {
        self.assignments.remove(email)
    }

    /// Returns the role held by `email`.
    #[must_use]
    pub fn role_of(&self, email: &EmailAddress) -> Option<Role> {
        self.assignments.get(email).copied()
    }

    /// Returns true when `email` holds any role.
    #[must_use]
    pub fn contains(&self, email: &EmailAddress) -> bool {
        self.assignments.contains_key(email)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Returns true when there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Iterates assignments in ascending email order.
    pub fn iter(&self) -> Iter<'_, EmailAddress, Role> {
        self.assignments.iter()
    }

    /// Projects the set back into sorted per-role lists.
    #[must_use]
    pub fn to_lists(&self) -> RoleLists {
        let mut lists = RoleLists::default();
        for (email, role) in &self.assignments {
            lists.for_role_mut(*role).push(email.as_str().to_owned());
        }

        lists
    }
}

/// Remote organization roster split by how the reconciler may treat it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservedRoster {
    assignments: RoleAssignmentSet,
    unmanaged: BTreeSet<EmailAddress>,
    exempt: BTreeSet<EmailAddress>,
}

impl ObservedRoster {
    /// Splits remote members into managed assignments, members holding a role
    /// outside the managed set, and members whose login is exempt.
    #[must_use]
    pub fn from_members(members: &[RosterMember], exempt_login: &ExemptLogin) -> Self {
        let mut roster = Self::default();
        for member in members {
            if exempt_login.exempts(member.login.as_str()) {
                roster.exempt.insert(member.email.clone());
                continue;
            }

            match member.role {
                Some(role) => {
                    roster.assignments.insert(member.email.clone(), role);
                }
                None => {
                    roster.unmanaged.insert(member.email.clone());
                }
            }
        }

        roster
    }

    /// Members holding Admin, Editor or Viewer.
    #[must_use]
    pub fn assignments(&self) -> &RoleAssignmentSet {
        &self.assignments
    }

    /// Members present with a role the reconciler does not manage.
    #[must_use]
    pub fn unmanaged(&self) -> &BTreeSet<EmailAddress> {
        &self.unmanaged
    }

    /// Emails of exempt members; never mutated.
    #[must_use]
    pub fn exempt(&self) -> &BTreeSet<EmailAddress> {
        &self.exempt
    }
}

impl FromIterator<(EmailAddress, Role)> for RoleAssignmentSet {
    fn from_iter<T: IntoIterator<Item = (EmailAddress, Role)>>(iter: T) -> Self {
        Self {
            assignments: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a RoleAssignmentSet {
    type Item = (&'a EmailAddress, &'a Role);
    type IntoIter = Iter<'a, EmailAddress, Role>;

    fn into_iter(self) -> Self::IntoIter {
        self.assignments.iter()
    }
}
