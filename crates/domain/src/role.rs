use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rostersync_core::AppError;
use serde::{Deserialize, Serialize};

/// Organization role tiers understood by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Full administrative access to the organization.
    Admin,
    /// May edit organization content.
    Editor,
    /// Read-only access.
    Viewer,
}

impl Role {
    /// Returns the value the remote service uses for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Editor => "Editor",
            Self::Viewer => "Viewer",
        }
    }

    /// Returns the declarative list key holding members of this role.
    #[must_use]
    pub fn list_key(&self) -> &'static str {
        match self {
            Self::Admin => "admins",
            Self::Editor => "editors",
            Self::Viewer => "viewers",
        }
    }

    /// Maps a declarative list key back to its role.
    pub fn from_list_key(key: &str) -> Result<Self, AppError> {
        match key {
            "admins" => Ok(Self::Admin),
            "editors" => Ok(Self::Editor),
            "viewers" => Ok(Self::Viewer),
            _ => Err(AppError::Validation(format!("unknown role list '{key}'"))),
        }
    }

    /// Returns all roles in list enumeration order.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Role] = &[Role::Admin, Role::Editor, Role::Viewer];

        ALL
    }
}

impl Display for Role {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Admin" => Ok(Self::Admin),
            "Editor" => Ok(Self::Editor),
            "Viewer" => Ok(Self::Viewer),
            _ => Err(AppError::Validation(format!("unknown role value '{value}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::Role;

    #[test]
    fn role_roundtrips_wire_value() {
        for role in Role::all() {
            assert_eq!(Role::from_str(role.as_str()), Ok(*role));
        }
    }

    #[test]
    fn list_keys_use_explicit_table() {
        assert_eq!(Role::from_list_key("admins"), Ok(Role::Admin));
        assert_eq!(Role::from_list_key("editors"), Ok(Role::Editor));
        assert_eq!(Role::from_list_key("viewers"), Ok(Role::Viewer));
        assert!(Role::from_list_key("owners").is_err());
        assert_eq!(Role::Editor.list_key(), "editors");
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(Role::from_str("None").is_err());
        assert!(Role::from_str("admin").is_err());
    }

    #[test]
    fn role_serializes_as_wire_value() {
        assert_eq!(
            serde_json::to_string(&Role::Viewer).unwrap_or_default(),
            "\"Viewer\""
        );
    }
}
