use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use rostersync_application::{Organization, OrganizationClient, OrganizationMembershipClient};
use rostersync_core::{AppError, AppResult, OrgId, RemoteUserId};
use rostersync_domain::{DirectoryUser, EmailAddress, Role, RosterMember};


/// Membership mutation received by the in-memory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipCall {
    /// `add_org_user` with the requested email and role.
    Add(OrgId, EmailAddress, Role),
    /// `update_org_user` with the target user and role.
    Update(OrgId, RemoteUserId, Role),
    /// `remove_org_user` with the target user.
    Remove(OrgId, RemoteUserId),
}

#[derive(Debug, Clone)]
struct StoredUser {
    email: EmailAddress,
    login: String,
}

#[derive(Debug, Clone)]
struct StoredOrganization {
    name: String,
    members: BTreeMap<RemoteUserId, Role>,
}

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<RemoteUserId, StoredUser>,
    organizations: BTreeMap<OrgId, StoredOrganization>,
    server_admin: Option<RemoteUserId>,
    next_user_id: i64,
    next_org_id: i64,
}

/// In-memory organization service for tests and local runs.
///
/// Mirrors the remote semantics the reconciler relies on: users must exist
/// before they join an organization, adding a member twice conflicts, and a
/// configured server administrator joins every new organization as Admin.
#[derive(Debug, Default)]
pub struct InMemoryOrganizationClient {
    state: RwLock<State>,
    failing_emails: RwLock<HashSet<EmailAddress>>,
    calls: RwLock<Vec<MembershipCall>>,
}

impl InMemoryOrganizationClient {
    /// Creates an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user in the global directory and returns its id.
    pub async fn add_user(&self, email: &str, login: &str) -> AppResult<RemoteUserId> {
        let email = EmailAddress::new(email)?;
        let mut state = self.state.write().await;
        if state.users.values().any(|user| user.email == email) {
            return Err(AppError::Conflict(format!("user '{email}' already exists")));
        }

        state.next_user_id += 1;
        let user_id = RemoteUserId::new(state.next_user_id);
        state.users.insert(
            user_id,
            StoredUser {
                email,
                login: login.to_owned(),
            },
        );

        Ok(user_id)
    }

    /// Registers the server administrator added to every new organization.
    pub async fn add_server_admin(&self, email: &str, login: &str) -> AppResult<RemoteUserId> {
        let user_id = self.add_user(email, login).await?;
        self.state.write().await.server_admin = Some(user_id);
        Ok(user_id)
    }

    /// Makes every mutation targeting `email` fail.
    pub async fn fail_mutations_for(&self, email: &str) -> AppResult<()> {
        self.failing_emails
            .write()
            .await
            .insert(EmailAddress::new(email)?);
        Ok(())
    }

    /// Returns the membership mutations received so far.
    pub async fn calls(&self) -> Vec<MembershipCall> {
        self.calls.read().await.clone()
    }

    async fn ensure_not_failing(&self, email: &EmailAddress) -> AppResult<()> {
        if self.failing_emails.read().await.contains(email) {
            return Err(AppError::Internal(format!(
                "injected failure for '{email}'"
            )));
        }
        Ok(())
    }
}

impl State {
    fn organization_mut(&mut self, org_id: OrgId) -> AppResult<&mut StoredOrganization> {
        self.organizations
            .get_mut(&org_id)
            .ok_or_else(|| AppError::NotFound(format!("organization {org_id} does not exist")))
    }

    fn user(&self, user_id: RemoteUserId) -> AppResult<&StoredUser> {
        self.users
            .get(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user {user_id} does not exist")))
    }
}

#[async_trait]
impl OrganizationMembershipClient for InMemoryOrganizationClient {
    async fn list_users(&self) -> AppResult<Vec<DirectoryUser>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .iter()
            .map(|(user_id, user)| DirectoryUser {
                email: user.email.clone(),
                id: *user_id,
            })
            .collect())
    }

    async fn list_org_users(&self, org_id: OrgId) -> AppResult<Vec<RosterMember>> {
        let state = self.state.read().await;
        let organization = state
            .organizations
            .get(&org_id)
            .ok_or_else(|| AppError::NotFound(format!("organization {org_id} does not exist")))?;

        organization
            .members
            .iter()
            .map(|(user_id, role)| {
                let user = state.user(*user_id)?;
                Ok(RosterMember {
                    email: user.email.clone(),
                    login: user.login.clone(),
                    role: Some(*role),
                })
            })
            .collect()
    }

    async fn add_org_user(
        &self,
        org_id: OrgId,
        email: &EmailAddress,
        role: Role,
    ) -> AppResult<()> {
        self.calls
            .write()
            .await
            .push(MembershipCall::Add(org_id, email.clone(), role));
        self.ensure_not_failing(email).await?;

        let mut state = self.state.write().await;
        let user_id = state
            .users
            .iter()
            .find_map(|(user_id, user)| (&user.email == email).then_some(*user_id))
            .ok_or_else(|| AppError::NotFound(format!("user '{email}' does not exist")))?;
        let organization = state.organization_mut(org_id)?;
        if organization.members.contains_key(&user_id) {
            return Err(AppError::Conflict(format!(
                "user '{email}' is already a member of organization {org_id}"
            )));
        }

        organization.members.insert(user_id, role);
        Ok(())
    }

    async fn update_org_user(
        &self,
        org_id: OrgId,
        user_id: RemoteUserId,
        role: Role,
    ) -> AppResult<()> {
        self.calls
            .write()
            .await
            .push(MembershipCall::Update(org_id, user_id, role));

        let mut state = self.state.write().await;
        let email = state.user(user_id)?.email.clone();
        self.ensure_not_failing(&email).await?;

        let organization = state.organization_mut(org_id)?;
        let current = organization.members.get_mut(&user_id).ok_or_else(|| {
            AppError::NotFound(format!(
                "user '{email}' is not a member of organization {org_id}"
            ))
        })?;
        *current = role;
        Ok(())
    }

    async fn remove_org_user(&self, org_id: OrgId, user_id: RemoteUserId) -> AppResult<()> {
        self.calls
            .write()
            .await
            .push(MembershipCall::Remove(org_id, user_id));

        let mut state = self.state.write().await;
        let email = state.user(user_id)?.email.clone();
        self.ensure_not_failing(&email).await?;

        let organization = state.organization_mut(org_id)?;
        if organization.members.remove(&user_id).is_none() {
            return Err(AppError::NotFound(format!(
                "user '{email}' is not a member of organization {org_id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl OrganizationClient for InMemoryOrganizationClient {
    async fn create_org(&self, name: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state
            .organizations
            .values()
            .any(|organization| organization.name == name)
        {
            return Err(AppError::Conflict(format!(
                "organization '{name}' already exists"
            )));
        }

        state.next_org_id += 1;
        let org_id = OrgId::new(state.next_org_id)?;
        let members = state
            .server_admin
            .map(|user_id| BTreeMap::from([(user_id, Role::Admin)]))
            .unwrap_or_default();
        state.organizations.insert(
            org_id,
            StoredOrganization {
                name: name.to_owned(),
                members,
            },
        );

        Ok(())
    }

    async fn find_org_by_name(&self, name: &str) -> AppResult<Option<Organization>> {
        Ok(self
            .state
            .read()
            .await
            .organizations
            .iter()
            .find(|(_, organization)| organization.name == name)
            .map(|(org_id, organization)| Organization {
                org_id: *org_id,
                name: organization.name.clone(),
            }))
    }

    async fn find_org(&self, org_id: OrgId) -> AppResult<Option<Organization>> {
        Ok(self
            .state
            .read()
            .await
            .organizations
            .get(&org_id)
            .map(|organization| Organization {
                org_id,
                name: organization.name.clone(),
            }))
    }

    async fn rename_org(&self, org_id: OrgId, name: &str) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state
            .organizations
            .iter()
            .any(|(stored_id, organization)| *stored_id != org_id && organization.name == name)
        {
            return Err(AppError::Conflict(format!(
                "organization '{name}' already exists"
            )));
        }

        state.organization_mut(org_id)?.name = name.to_owned();
        Ok(())
    }

    async fn delete_org(&self, org_id: OrgId) -> AppResult<()> {
        self.state
            .write()
            .await
            .organizations
            .remove(&org_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("organization {org_id} does not exist")))
    }
}
