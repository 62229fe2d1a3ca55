//! Aggregated outcome of one reconciliation pass.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use rostersync_core::{AppError, AppResult, OrgId};
use rostersync_domain::{EmailAddress, Role};

/// Kind of roster mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Member added to the organization.
    Add,
    /// Member role changed.
    Update,
    /// Member removed from the organization.
    Remove,
}

impl OperationKind {
    /// Returns a stable label for logs and reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Mutation the remote service accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedOperation {
    /// Member email.
    pub email: EmailAddress,
    /// Mutation kind.
    pub kind: OperationKind,
    /// Role granted, absent for removals.
    pub role: Option<Role>,
}

/// Mutation the remote service rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    /// Member email.
    pub email: EmailAddress,
    /// Mutation kind.
    pub kind: OperationKind,
    /// Error returned by the remote call.
    pub error: AppError,
}

impl OperationFailure {
    /// Returns true when the remote service reported that the target already exists.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.error.is_conflict()
    }
}

/// Mutation left out because the email has no remote identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedOperation {
    /// Member email.
    pub email: EmailAddress,
    /// Mutation kind that was not attempted.
    pub kind: OperationKind,
}

/// Counts of a finished pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Accepted mutations.
    pub applied: usize,
    /// Rejected mutations.
    pub failed: usize,
    /// Mutations skipped for unknown users.
    pub skipped: usize,
}

impl Display for ReconcileSummary {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{} applied, {} failed, {} skipped",
            self.applied, self.failed, self.skipped
        )
    }
}

/// Per-operation outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Identifier correlating log lines of one pass.
    pub pass_id: Uuid,
    /// Reconciled organization.
    pub org_id: OrgId,
    /// When the apply phase started.
    pub started_at: DateTime<Utc>,
    /// When the apply phase ended.
    pub finished_at: Option<DateTime<Utc>>,
    /// Accepted mutations in issue order.
    pub applied: Vec<AppliedOperation>,
    /// Rejected mutations in issue order.
    pub failures: Vec<OperationFailure>,
    /// Mutations skipped for unknown users.
    pub skipped: Vec<SkippedOperation>,
}

impl ReconcileReport {
    /// Starts an empty report for `org_id`.
    #[must_use]
    pub fn new(org_id: OrgId) -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            org_id,
            started_at: Utc::now(),
            finished_at: None,
            applied: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Records the outcome of one remote call.
    pub fn record(
        &mut self,
        email: &EmailAddress,
        kind: OperationKind,
        role: Option<Role>,
        result: AppResult<()>,
    ) {
        match result {
            Ok(()) => self.applied.push(AppliedOperation {
                email: email.clone(),
                kind,
                role,
            }),
            Err(error) => self.failures.push(OperationFailure {
                email: email.clone(),
                kind,
                error,
            }),
        }
    }

    /// Records an operation skipped for lack of a remote identity.
    pub fn record_skip(&mut self, email: &EmailAddress, kind: OperationKind) {
        self.skipped.push(SkippedOperation {
            email: email.clone(),
            kind,
        });
    }

    /// Stamps the end of the apply phase.
    #[must_use]
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    /// Returns true when at least one remote call failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Returns true when every planned operation was applied.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    /// Returns the outcome counts.
    #[must_use]
    pub fn summary(&self) -> ReconcileSummary {
        ReconcileSummary {
            applied: self.applied.len(),
            failed: self.failures.len(),
            skipped: self.skipped.len(),
        }
    }

    /// Converts a report with failed mutations into an error listing them.
    ///
    /// Skipped operations are warnings and do not fail the result.
    pub fn into_result(self) -> AppResult<Self> {
        if self.failures.is_empty() {
            return Ok(self);
        }

        let details = self
            .failures
            .iter()
            .map(|failure| format!("{} '{}': {}", failure.kind, failure.email, failure.error))
            .collect::<Vec<_>>()
            .join("; ");

        Err(AppError::Internal(format!(
            "{} roster mutation(s) failed for organization {}: {details}",
            self.failures.len(),
            self.org_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use rostersync_core::{AppError, OrgId};
    use rostersync_domain::{EmailAddress, Role};

    use super::{OperationKind, ReconcileReport};

    fn email(value: &str) -> EmailAddress {
        EmailAddress::new(value).unwrap_or_else(|_| unreachable!())
    }

    fn report() -> ReconcileReport {
        ReconcileReport::new(OrgId::new(3).unwrap_or_else(|_| unreachable!()))
    }

    #[test]
    fn record_splits_successes_and_failures() {
        let mut report = report();
        report.record(&email("a@example.com"), OperationKind::Add, Some(Role::Viewer), Ok(()));
        report.record(
            &email("b@example.com"),
            OperationKind::Remove,
            None,
            Err(AppError::Internal("boom".to_owned())),
        );

        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.has_failures());
        assert_eq!(report.summary().to_string(), "1 applied, 1 failed, 0 skipped");
    }

    #[test]
    fn skips_prevent_convergence_but_not_success() {
        let mut report = report();
        report.record_skip(&email("c@example.com"), OperationKind::Add);

        assert!(!report.is_converged());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn into_result_lists_each_failure() {
        let mut report = report();
        report.record(
            &email("a@example.com"),
            OperationKind::Add,
            Some(Role::Admin),
            Err(AppError::Conflict("already member".to_owned())),
        );

        assert!(report.failures.iter().all(|failure| failure.is_conflict()));

        let Err(AppError::Internal(message)) = report.finish().into_result() else {
            unreachable!("failures must surface as an error");
        };
        assert!(message.contains("add 'a@example.com'"));
        assert!(message.contains("organization 3"));
    }
}
