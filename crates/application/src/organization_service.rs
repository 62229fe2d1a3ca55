use std::sync::Arc;

use tracing::info;

use rostersync_core::{AppError, AppResult, NonEmptyString, OrgId};
use rostersync_domain::RoleLists;

use crate::{Organization, OrganizationClient, ReconcileReport, RosterReconciler};


/// Declared organization name and membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationInput {
    /// Organization name, unique in the remote service.
    pub name: String,
    /// Declared role lists.
    pub members: RoleLists,
}

/// Organization as currently held by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationState {
    /// Remote organization record.
    pub organization: Organization,
    /// Observed roster, exempt login excluded.
    pub members: RoleLists,
}

/// Result of a write that ends with a roster reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationSync {
    /// Organization the roster was reconciled into.
    pub organization: Organization,
    /// Outcome of the reconciliation pass.
    pub report: ReconcileReport,
}

/// Application service for the organization lifecycle.
#[derive(Clone)]
pub struct OrganizationService {
    organizations: Arc<dyn OrganizationClient>,
    reconciler: RosterReconciler,
}

impl OrganizationService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(organizations: Arc<dyn OrganizationClient>, reconciler: RosterReconciler) -> Self {
        Self {
            organizations,
            reconciler,
        }
    }

    /// Creates an organization and reconciles its declared roster.
    ///
    /// Declared lists are validated before anything is created. A taken
    /// name is reported as `AppError::Conflict`.
    pub async fn create(&self, input: OrganizationInput) -> AppResult<OrganizationSync> {
        let name = NonEmptyString::new(input.name)?;
        self.reconciler.desired_state(&input.members)?;

        self.organizations
            .create_org(name.as_str())
            .await
            .map_err(|error| match error {
                AppError::Conflict(_) => AppError::Conflict(format!(
                    "organization '{}' already exists",
                    name.as_str()
                )),
                other => other,
            })?;

        let organization = self
            .organizations
            .find_org_by_name(name.as_str())
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "organization '{}' was created but cannot be found",
                    name.as_str()
                ))
            })?;

        info!(
            org_id = %organization.org_id,
            name = %organization.name,
            "created organization"
        );

        let report = self
            .reconciler
            .reconcile(organization.org_id, &input.members)
            .await?;

        Ok(OrganizationSync {
            organization,
            report,
        })
    }

    /// Returns the organization with its observed roster.
    pub async fn read(&self, org_id: OrgId) -> AppResult<OrganizationState> {
        let organization = self.require_org(org_id).await?;
        let members = self.reconciler.read_roster(org_id).await?;

        Ok(OrganizationState {
            organization,
            members,
        })
    }

    /// Renames the organization when needed and reconciles its roster.
    pub async fn update(
        &self,
        org_id: OrgId,
        input: OrganizationInput,
    ) -> AppResult<OrganizationSync> {
        let name = NonEmptyString::new(input.name)?;
        self.reconciler.desired_state(&input.members)?;

        let mut organization = self.require_org(org_id).await?;
        if organization.name != name.as_str() {
            self.organizations
                .rename_org(org_id, name.as_str())
                .await?;
            info!(
                org_id = %org_id,
                old_name = %organization.name,
                new_name = %name.as_str(),
                "renamed organization"
            );
            organization.name = name.into();
        }

        let report = self.reconciler.reconcile(org_id, &input.members).await?;

        Ok(OrganizationSync {
            organization,
            report,
        })
    }

    /// Deletes the organization.
    pub async fn delete(&self, org_id: OrgId) -> AppResult<()> {
        self.organizations.delete_org(org_id).await?;
        info!(org_id = %org_id, "deleted organization");
        Ok(())
    }

    /// Returns whether the organization still exists.
    pub async fn exists(&self, org_id: OrgId) -> AppResult<bool> {
        Ok(self.organizations.find_org(org_id).await?.is_some())
    }

    async fn require_org(&self, org_id: OrgId) -> AppResult<Organization> {
        self.organizations
            .find_org(org_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("organization {org_id} does not exist")))
    }
}
