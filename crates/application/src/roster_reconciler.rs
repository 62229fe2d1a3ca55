use std::sync::Arc;

use tracing::{info, warn};

use rostersync_core::{AppResult, OrgId};
use rostersync_domain::{
    DuplicatePolicy, EmailAddress, ExemptLogin, ObservedRoster, Role, RoleAssignmentSet,
    RoleLists, RosterDiff,
};

use crate::{IdentityDirectory, OperationKind, OrganizationMembershipClient, ReconcileReport};


/// Caller-owned reconciliation options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Login never added, updated or removed.
    pub exempt_login: ExemptLogin,
    /// Resolution of emails declared under several roles.
    pub duplicate_policy: DuplicatePolicy,
}

/// Fetched states and computed diff of a pass that is not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Roster currently held by the remote organization.
    pub observed: ObservedRoster,
    /// Roster declared by the caller.
    pub desired: RoleAssignmentSet,
    /// Operations that would converge the two.
    pub diff: RosterDiff,
    /// Diff entries whose email has no remote identity.
    pub unresolved: Vec<EmailAddress>,
}

struct FetchedDiff {
    desired: RoleAssignmentSet,
    observed: ObservedRoster,
    diff: RosterDiff,
    directory: IdentityDirectory,
}

/// Converges an organization roster onto declared role lists.
#[derive(Clone)]
pub struct RosterReconciler {
    client: Arc<dyn OrganizationMembershipClient>,
    settings: ReconcileSettings,
}

impl RosterReconciler {
    /// Creates a reconciler over a remote membership client.
    #[must_use]
    pub fn new(client: Arc<dyn OrganizationMembershipClient>, settings: ReconcileSettings) -> Self {
        Self { client, settings }
    }

    /// Returns the active settings.
    #[must_use]
    pub fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    /// Builds the desired state, validating the declared lists.
    pub fn desired_state(&self, lists: &RoleLists) -> AppResult<RoleAssignmentSet> {
        RoleAssignmentSet::from_lists(lists, self.settings.duplicate_policy)
    }

    /// Fetches the remote roster with exempt and unmanaged members set aside.
    pub async fn observed_state(&self, org_id: OrgId) -> AppResult<ObservedRoster> {
        let members = self.client.list_org_users(org_id).await?;
        Ok(ObservedRoster::from_members(
            &members,
            &self.settings.exempt_login,
        ))
    }

    /// Returns the managed part of the remote roster as per-role lists.
    pub async fn read_roster(&self, org_id: OrgId) -> AppResult<RoleLists> {
        Ok(self.observed_state(org_id).await?.assignments().to_lists())
    }

    /// Runs one full fetch, diff, apply pass.
    ///
    /// Invalid lists and failed fetches abort before any mutation. Once the
    /// apply phase starts every resolvable operation is attempted and the
    /// outcome of each is returned in the report.
    pub async fn reconcile(&self, org_id: OrgId, lists: &RoleLists) -> AppResult<ReconcileReport> {
        let fetched = self.fetch_diff(org_id, lists).await?;
        Ok(self
            .apply_diff(org_id, &fetched.diff, &fetched.directory)
            .await)
    }

    /// Fetches both states and computes the diff without applying it.
    pub async fn plan(&self, org_id: OrgId, lists: &RoleLists) -> AppResult<ReconcilePlan> {
        let FetchedDiff {
            desired,
            observed,
            diff,
            directory,
        } = self.fetch_diff(org_id, lists).await?;

        let unresolved = diff
            .to_add
            .keys()
            .chain(diff.to_update.keys())
            .chain(diff.to_remove.iter())
            .filter(|email| directory.resolve(email).is_none())
            .cloned()
            .collect();

        Ok(ReconcilePlan {
            observed,
            desired,
            diff,
            unresolved,
        })
    }

    async fn fetch_diff(&self, org_id: OrgId, lists: &RoleLists) -> AppResult<FetchedDiff> {
        let desired = self.desired_state(lists)?;
        let directory = IdentityDirectory::build(self.client.as_ref()).await?;
        let observed = self.observed_state(org_id).await?;
        let diff = RosterDiff::between(&observed, &desired);

        info!(
            org_id = %org_id,
            observed = observed.assignments().len(),
            unmanaged = observed.unmanaged().len(),
            desired = desired.len(),
            to_add = diff.to_add.len(),
            to_update = diff.to_update.len(),
            to_remove = diff.to_remove.len(),
            "computed roster diff"
        );

        Ok(FetchedDiff {
            desired,
            observed,
            diff,
            directory,
        })
    }

    /// Applies a diff in add, update, remove phase order.
    ///
    /// Each mutation is an independent remote call; a failure is recorded and
    /// the remaining operations still run. Emails missing from `directory`
    /// are skipped with a warning.
    pub async fn apply_diff(
        &self,
        org_id: OrgId,
        diff: &RosterDiff,
        directory: &IdentityDirectory,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::new(org_id);

        for (email, role) in &diff.to_add {
            if directory.resolve(email).is_none() {
                skip_unknown(&mut report, email, OperationKind::Add);
                continue;
            }

            let result = self.client.add_org_user(org_id, email, *role).await;
            record(&mut report, email, OperationKind::Add, Some(*role), result);
        }

        for (email, role) in &diff.to_update {
            let Some(user_id) = directory.resolve(email) else {
                skip_unknown(&mut report, email, OperationKind::Update);
                continue;
            };

            let result = self.client.update_org_user(org_id, user_id, *role).await;
            record(&mut report, email, OperationKind::Update, Some(*role), result);
        }

        for email in &diff.to_remove {
            let Some(user_id) = directory.resolve(email) else {
                skip_unknown(&mut report, email, OperationKind::Remove);
                continue;
            };

            let result = self.client.remove_org_user(org_id, user_id).await;
            record(&mut report, email, OperationKind::Remove, None, result);
        }

        let report = report.finish();
        info!(
            org_id = %org_id,
            pass_id = %report.pass_id,
            summary = %report.summary(),
            "roster reconciliation finished"
        );

        report
    }
}

fn skip_unknown(report: &mut ReconcileReport, email: &EmailAddress, kind: OperationKind) {
    warn!(
        org_id = %report.org_id,
        email = %email,
        operation = %kind,
        "skipping roster operation, user is not known to the remote service"
    );
    report.record_skip(email, kind);
}

fn record(
    report: &mut ReconcileReport,
    email: &EmailAddress,
    kind: OperationKind,
    role: Option<Role>,
    result: AppResult<()>,
) {
    if let Err(error) = &result {
        warn!(
            org_id = %report.org_id,
            email = %email,
            operation = %kind,
            conflict = error.is_conflict(),
            error = %error,
            "roster operation failed"
        );
    }

    report.record(email, kind, role, result);
}
