//! Rostersync reconciliation worker runtime.

#![forbid(unsafe_code)]

mod worker_config;

use std::sync::Arc;
use std::time::Duration;

use rostersync_application::{
    OrganizationClient, OrganizationMembershipClient, ReconcileSettings, RosterReconciler,
};
use rostersync_core::{AppError, AppResult, OrgId};
use rostersync_domain::{Role, RoleLists};
use rostersync_infrastructure::{HttpOrganizationClient, InMemoryOrganizationClient};

use tracing::{info, warn};

use crate::worker_config::{RemoteBackendConfig, WorkerConfig, init_tracing};

const MEMORY_ORG_NAME: &str = "local";
const MEMORY_SERVER_ADMIN_EMAIL: &str = "admin@localhost";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let (client, org_id) = build_membership_client(&config).await?;
    let reconciler = RosterReconciler::new(client, config.settings.clone());

    info!(
        org_id = %org_id,
        exempt_login = %reconciler.settings().exempt_login.as_str(),
        duplicate_policy = ?reconciler.settings().duplicate_policy,
        interval_ms = ?config.interval_ms,
        dry_run = config.dry_run,
        "rostersync-worker started"
    );

    let Some(interval_ms) = config.interval_ms else {
        return run_pass(&reconciler, org_id, &config).await;
    };

    loop {
        if let Err(error) = run_pass(&reconciler, org_id, &config).await {
            warn!(org_id = %org_id, error = %error, "reconciliation pass failed");
        }
        tokio::time::sleep(Duration::from_millis(interval_ms)).await;
    }
}

async fn build_membership_client(
    config: &WorkerConfig,
) -> AppResult<(Arc<dyn OrganizationMembershipClient>, OrgId)> {
    match &config.backend {
        RemoteBackendConfig::Http {
            base_url,
            credentials,
            timeout_ms,
            org_id,
        } => {
            let http_client = reqwest::Client::builder()
                .timeout(Duration::from_millis(*timeout_ms))
                .build()
                .map_err(|error| {
                    AppError::Internal(format!("failed to build HTTP client: {error}"))
                })?;
            let client =
                HttpOrganizationClient::new(http_client, base_url.as_str(), credentials.clone())?;

            info!(base_url = %base_url, "using remote organization service");
            Ok((Arc::new(client), *org_id))
        }
        RemoteBackendConfig::Memory => {
            let (client, org_id) = seed_memory_backend(&config.members, &config.settings).await?;
            info!(org_id = %org_id, "using in-memory organization service");
            Ok((client, org_id))
        }
    }
}

/// Creates a local organization whose directory knows every declared email.
async fn seed_memory_backend(
    members: &RoleLists,
    settings: &ReconcileSettings,
) -> AppResult<(Arc<InMemoryOrganizationClient>, OrgId)> {
    let client = Arc::new(InMemoryOrganizationClient::new());
    if settings.exempt_login.is_enabled() {
        client
            .add_server_admin(MEMORY_SERVER_ADMIN_EMAIL, settings.exempt_login.as_str())
            .await?;
    }

    for role in Role::all() {
        for email in members.for_role(*role) {
            match client.add_user(email, email).await {
                Ok(_) | Err(AppError::Conflict(_)) => {}
                Err(error) => return Err(error),
            }
        }
    }

    client.create_org(MEMORY_ORG_NAME).await?;
    let organization = client
        .find_org_by_name(MEMORY_ORG_NAME)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!(
                "organization '{MEMORY_ORG_NAME}' missing after create"
            ))
        })?;

    Ok((client, organization.org_id))
}

async fn run_pass(
    reconciler: &RosterReconciler,
    org_id: OrgId,
    config: &WorkerConfig,
) -> AppResult<()> {
    if config.dry_run {
        let plan = reconciler.plan(org_id, &config.members).await?;
        for (email, role) in &plan.diff.to_add {
            info!(org_id = %org_id, email = %email, role = %role, "planned add");
        }
        for (email, role) in &plan.diff.to_update {
            info!(org_id = %org_id, email = %email, role = %role, "planned update");
        }
        for email in &plan.diff.to_remove {
            info!(org_id = %org_id, email = %email, "planned remove");
        }
        for email in &plan.unresolved {
            warn!(org_id = %org_id, email = %email, "user not found in directory");
        }
        info!(
            org_id = %org_id,
            operations = plan.diff.operation_count(),
            "dry run finished"
        );
        return Ok(());
    }

    let report = reconciler.reconcile(org_id, &config.members).await?;
    for failure in &report.failures {
        warn!(
            pass_id = %report.pass_id,
            email = %failure.email,
            operation = %failure.kind,
            error = %failure.error,
            "membership mutation failed"
        );
    }
    info!(
        pass_id = %report.pass_id,
        org_id = %org_id,
        summary = %report.summary(),
        "reconciliation pass finished"
    );

    report.into_result().map(|_| ())
}
