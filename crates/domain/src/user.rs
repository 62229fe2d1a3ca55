//! User identity types shared by the roster and the user directory.

use std::fmt::{Display, Formatter};

use rostersync_core::{AppError, AppResult, RemoteUserId};
use serde::{Deserialize, Serialize};

use crate::Role;

/// Maximum accepted email length (RFC 5321 path limit).
pub const EMAIL_MAX_LENGTH: usize = 254;

/// Validated, normalized email address used as the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a validated email address.
    ///
    /// The value is trimmed and lowercased. It must contain exactly one `@`
    /// with a non-empty local part and domain. Dotless domains such as
    /// `localhost` are accepted because remote services seed accounts that way.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim().to_lowercase();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "email address must not be empty".to_owned(),
            ));
        }

        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(AppError::Validation(format!(
                "email address '{trimmed}' must contain '@'"
            )));
        };

        if domain.contains('@') {
            return Err(AppError::Validation(format!(
                "email address '{trimmed}' must contain exactly one '@'"
            )));
        }

        if local.is_empty() || domain.is_empty() {
            return Err(AppError::Validation(format!(
                "email address '{trimmed}' must have a local part and a domain"
            )));
        }

        if trimmed.len() > EMAIL_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "email address must not exceed {EMAIL_MAX_LENGTH} characters"
            )));
        }

        Ok(Self(trimmed))
    }

    /// Returns the normalized email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for EmailAddress {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

/// Login name that is never reconciled.
///
/// Remote services add their bootstrap administrator to every organization.
/// An empty login disables the exemption so that account is reconciled like
/// any other member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExemptLogin(String);

impl ExemptLogin {
    /// Login exempted when nothing else is configured.
    pub const DEFAULT: &'static str = "admin";

    /// Creates an exemption for the given login; empty disables it.
    #[must_use]
    pub fn new(login: impl Into<String>) -> Self {
        Self(login.into())
    }

    /// Creates a disabled exemption.
    #[must_use]
    pub fn disabled() -> Self {
        Self(String::new())
    }

    /// Returns true when an exemption is in effect.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.0.is_empty()
    }

    /// Returns true when `login` is exempt from reconciliation.
    #[must_use]
    pub fn exempts(&self, login: &str) -> bool {
        self.is_enabled() && self.0 == login
    }

    /// Returns the configured login.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for ExemptLogin {
    fn default() -> Self {
        Self::new(Self::DEFAULT)
    }
}

/// User entry from the remote service's global user directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    /// Normalised user email.
    pub email: EmailAddress,
    /// Remote numeric identifier.
    pub id: RemoteUserId,
}

/// Member entry from an organization's remote roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterMember {
    /// Member email.
    pub email: EmailAddress,
    /// Member login name.
    pub login: String,
    /// Role currently held in the organization; `None` when the remote role
    /// is outside Admin, Editor and Viewer.
    pub role: Option<Role>,
}

#[cfg(test)]
mod tests {
    use super::{EmailAddress, ExemptLogin};

    #[test]
    fn email_is_trimmed_and_lowercased() {
        let email = EmailAddress::new("  Alice@Example.COM ");
        assert_eq!(
            email.map(String::from),
            Ok("alice@example.com".to_owned())
        );
    }

    #[test]
    fn email_accepts_dotless_domain() {
        assert!(EmailAddress::new("admin@localhost").is_ok());
    }

    #[test]
    fn email_rejects_malformed_values() {
        assert!(EmailAddress::new("").is_err());
        assert!(EmailAddress::new("alice").is_err());
        assert!(EmailAddress::new("@example.com").is_err());
        assert!(EmailAddress::new("alice@").is_err());
        assert!(EmailAddress::new("a@b@example.com").is_err());
        assert!(EmailAddress::new(format!("{}@example.com", "a".repeat(250))).is_err());
    }

    #[test]
    fn exempt_login_defaults_to_admin() {
        let exempt = ExemptLogin::default();
        assert!(exempt.exempts("admin"));
        assert!(!exempt.exempts("alice"));
    }

    #[test]
    fn empty_exempt_login_exempts_nobody() {
        let exempt = ExemptLogin::disabled();
        assert!(!exempt.is_enabled());
        assert!(!exempt.exempts("admin"));
        assert!(!exempt.exempts(""));
    }
}
