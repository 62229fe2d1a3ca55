//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod diff;
mod role;
mod roster;
mod user;

pub use diff::RosterDiff;
pub use role::Role;
pub use roster::{DuplicatePolicy, ObservedRoster, RoleAssignmentSet, RoleLists};
pub use user::{DirectoryUser, EMAIL_MAX_LENGTH, EmailAddress, ExemptLogin, RosterMember};
