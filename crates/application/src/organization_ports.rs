use async_trait::async_trait;

use rostersync_core::{AppResult, OrgId, RemoteUserId};
use rostersync_domain::{DirectoryUser, EmailAddress, Role, RosterMember};

/// Organization record exposed by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    /// Remote organization identifier.
    pub org_id: OrgId,
    /// Organization display name.
    pub name: String,
}

/// Remote capability required to reconcile an organization roster.
///
/// Each method is a single remote call. Implementations must not retry.
#[async_trait]
pub trait OrganizationMembershipClient: Send + Sync {
    /// Lists every user known to the remote service.
    async fn list_users(&self) -> AppResult<Vec<DirectoryUser>>;

    /// Lists the current members of an organization.
    async fn list_org_users(&self, org_id: OrgId) -> AppResult<Vec<RosterMember>>;

    /// Adds an existing user to an organization with a role.
    ///
    /// Returns `AppError::Conflict` when the user is already a member.
    async fn add_org_user(
        &self,
        org_id: OrgId,
        email: &EmailAddress,
        role: Role,
    ) -> AppResult<()>;

    /// Changes the role of an organization member.
    async fn update_org_user(
        &self,
        org_id: OrgId,
        user_id: RemoteUserId,
        role: Role,
    ) -> AppResult<()>;

    /// Removes a member from an organization.
    async fn remove_org_user(&self, org_id: OrgId, user_id: RemoteUserId) -> AppResult<()>;
}

/// Remote capability for the organization lifecycle.
#[async_trait]
pub trait OrganizationClient: Send + Sync {
    /// Creates an organization.
    ///
    /// Returns `AppError::Conflict` when the name is already taken.
    async fn create_org(&self, name: &str) -> AppResult<()>;

    /// Finds an organization by its unique name.
    async fn find_org_by_name(&self, name: &str) -> AppResult<Option<Organization>>;

    /// Finds an organization by id.
    async fn find_org(&self, org_id: OrgId) -> AppResult<Option<Organization>>;

    /// Renames an organization.
    async fn rename_org(&self, org_id: OrgId, name: &str) -> AppResult<()>;

    /// Deletes an organization.
    async fn delete_org(&self, org_id: OrgId) -> AppResult<()>;
}
