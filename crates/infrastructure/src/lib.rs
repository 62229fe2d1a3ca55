//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_organization_client;
mod in_memory_organization_client;

pub use http_organization_client::{HttpOrganizationClient, RemoteCredentials};
pub use in_memory_organization_client::{InMemoryOrganizationClient, MembershipCall};
