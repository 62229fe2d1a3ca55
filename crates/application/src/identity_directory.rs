use std::collections::HashMap;

use rostersync_core::{AppResult, RemoteUserId};
use rostersync_domain::{DirectoryUser, EmailAddress};

use crate::OrganizationMembershipClient;

/// Email to remote user id index built from one full directory listing.
///
/// Rebuilt for every reconciliation pass; never cached across passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityDirectory {
    ids: HashMap<EmailAddress, RemoteUserId>,
}

impl IdentityDirectory {
    /// Queries the remote user list once and indexes it by email.
    ///
    /// A failed listing is returned as-is so the caller can abort the pass.
    pub async fn build(client: &dyn OrganizationMembershipClient) -> AppResult<Self> {
        let users = client.list_users().await?;
        Ok(Self::from_users(users))
    }

    /// Indexes an already fetched user list.
    #[must_use]
    pub fn from_users(users: impl IntoIterator<Item = DirectoryUser>) -> Self {
        Self {
            ids: users.into_iter().map(|user| (user.email, user.id)).collect(),
        }
    }

    /// Returns the remote id registered for `email`.
    #[must_use]
    pub fn resolve(&self, email: &EmailAddress) -> Option<RemoteUserId> {
        self.ids.get(email).copied()
    }

    /// Number of indexed users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true when no user is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
