//! Application services and ports.

#![forbid(unsafe_code)]

mod identity_directory;
mod organization_ports;
mod organization_service;
mod reconcile_report;
mod roster_reconciler;

pub use identity_directory::IdentityDirectory;
pub use organization_ports::{Organization, OrganizationClient, OrganizationMembershipClient};
pub use organization_service::{
    OrganizationInput, OrganizationService, OrganizationState, OrganizationSync,
};
pub use reconcile_report::{
    AppliedOperation, OperationFailure, OperationKind, ReconcileReport, ReconcileSummary,
    SkippedOperation,
};
pub use roster_reconciler::{ReconcilePlan, ReconcileSettings, RosterReconciler};
