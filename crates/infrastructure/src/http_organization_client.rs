use std::str::FromStr;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use rostersync_application::{Organization, OrganizationClient, OrganizationMembershipClient};
use rostersync_core::{AppError, AppResult, OrgId, RemoteUserId};
use rostersync_domain::{DirectoryUser, EmailAddress, Role, RosterMember};

/// Page size used when listing the remote user directory.
const USERS_PAGE_SIZE: usize = 1000;

/// Credentials sent with every remote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCredentials {
    /// Service account or API token sent as a bearer token.
    Token(String),
    /// HTTP basic authentication.
    Basic {
        /// Basic auth user name.
        username: String,
        /// Basic auth password.
        password: String,
    },
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: i64,
    #[serde(default)]
    email: String,
}

#[derive(Debug, Deserialize)]
struct OrgUserResponse {
    #[serde(default)]
    email: String,
    #[serde(default)]
    login: String,
    role: String,
}

#[derive(Debug, Deserialize)]
struct OrgResponse {
    id: i64,
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddOrgUserRequest<'a> {
    login_or_email: &'a str,
    role: Role,
}

#[derive(Debug, Serialize)]
struct UpdateOrgUserRequest {
    role: Role,
}

#[derive(Debug, Serialize)]
struct OrgNameRequest<'a> {
    name: &'a str,
}

/// HTTP adapter for a Grafana-compatible organization API.
///
/// Every port method issues the request once; retries belong to the caller.
pub struct HttpOrganizationClient {
    http_client: reqwest::Client,
    base_url: Url,
    credentials: RemoteCredentials,
}

impl HttpOrganizationClient {
    /// Creates a client for the API rooted at `base_url`.
    pub fn new(
        http_client: reqwest::Client,
        base_url: &str,
        credentials: RemoteCredentials,
    ) -> AppResult<Self> {
        let base_url = Url::parse(base_url).map_err(|error| {
            AppError::Validation(format!("invalid remote API base URL '{base_url}': {error}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "remote API base URL '{base_url}' cannot carry a path"
            )));
        }

        Ok(Self {
            http_client,
            base_url,
            credentials,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                AppError::Internal(format!(
                    "remote API base URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http_client.request(method, url);
        match &self.credentials {
            RemoteCredentials::Token(token) => builder.bearer_auth(token),
            RemoteCredentials::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
        }
    }

    async fn send(&self, builder: RequestBuilder, context: &str) -> AppResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|error| AppError::Internal(format!("failed to {context}: {error}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_owned());
        Err(status_error(status, context, body.as_str()))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> AppResult<T> {
        self.send(builder, context)
            .await?
            .json::<T>()
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to parse response to {context}: {error}"))
            })
    }

    async fn find_org_at(&self, url: Url, context: &str) -> AppResult<Option<Organization>> {
        match self
            .send_json::<OrgResponse>(self.request(Method::GET, url), context)
            .await
        {
            Ok(organization) => Ok(Some(Organization {
                org_id: OrgId::new(organization.id)?,
                name: organization.name,
            })),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(error) => Err(error),
        }
    }
}

#[async_trait]
impl OrganizationMembershipClient for HttpOrganizationClient {
    async fn list_users(&self) -> AppResult<Vec<DirectoryUser>> {
        let mut users = Vec::new();
        let mut page = 1_usize;

        loop {
            let mut url = self.endpoint(&["api", "users"])?;
            url.query_pairs_mut()
                .append_pair("perpage", USERS_PAGE_SIZE.to_string().as_str())
                .append_pair("page", page.to_string().as_str());

            let batch = self
                .send_json::<Vec<UserResponse>>(self.request(Method::GET, url), "list users")
                .await?;
            let batch_len = batch.len();
            users.extend(directory_users(batch));

            if batch_len != USERS_PAGE_SIZE {
                break;
            }
            page = page.saturating_add(1);
        }

        debug!(users = users.len(), "listed remote user directory");
        Ok(users)
    }

    async fn list_org_users(&self, org_id: OrgId) -> AppResult<Vec<RosterMember>> {
        let org_segment = org_id.to_string();
        let url = self.endpoint(&["api", "orgs", org_segment.as_str(), "users"])?;
        let members = self
            .send_json::<Vec<OrgUserResponse>>(
                self.request(Method::GET, url),
                "list organization users",
            )
            .await?;

        Ok(roster_members(org_id, members))
    }

    async fn add_org_user(
        &self,
        org_id: OrgId,
        email: &EmailAddress,
        role: Role,
    ) -> AppResult<()> {
        let org_segment = org_id.to_string();
        let url = self.endpoint(&["api", "orgs", org_segment.as_str(), "users"])?;
        let builder = self
            .request(Method::POST, url)
            .json(&AddOrgUserRequest {
                login_or_email: email.as_str(),
                role,
            });

        self.send(builder, "add organization user").await.map(|_| ())
    }

    async fn update_org_user(
        &self,
        org_id: OrgId,
        user_id: RemoteUserId,
        role: Role,
    ) -> AppResult<()> {
        let org_segment = org_id.to_string();
        let user_segment = user_id.to_string();
        let url = self.endpoint(&[
            "api",
            "orgs",
            org_segment.as_str(),
            "users",
            user_segment.as_str(),
        ])?;
        let builder = self
            .request(Method::PATCH, url)
            .json(&UpdateOrgUserRequest { role });

        self.send(builder, "update organization user")
            .await
            .map(|_| ())
    }

    async fn remove_org_user(&self, org_id: OrgId, user_id: RemoteUserId) -> AppResult<()> {
        let org_segment = org_id.to_string();
        let user_segment = user_id.to_string();
        let url = self.endpoint(&[
            "api",
            "orgs",
            org_segment.as_str(),
            "users",
            user_segment.as_str(),
        ])?;

        self.send(
            self.request(Method::DELETE, url),
            "remove organization user",
        )
        .await
        .map(|_| ())
    }
}

#[async_trait]
impl OrganizationClient for HttpOrganizationClient {
    async fn create_org(&self, name: &str) -> AppResult<()> {
        let url = self.endpoint(&["api", "orgs"])?;
        let builder = self
            .request(Method::POST, url)
            .json(&OrgNameRequest { name });

        self.send(builder, "create organization").await.map(|_| ())
    }

    async fn find_org_by_name(&self, name: &str) -> AppResult<Option<Organization>> {
        let url = self.endpoint(&["api", "orgs", "name", name])?;
        self.find_org_at(url, "find organization by name").await
    }

    async fn find_org(&self, org_id: OrgId) -> AppResult<Option<Organization>> {
        let org_segment = org_id.to_string();
        let url = self.endpoint(&["api", "orgs", org_segment.as_str()])?;
        self.find_org_at(url, "find organization").await
    }

    async fn rename_org(&self, org_id: OrgId, name: &str) -> AppResult<()> {
        let org_segment = org_id.to_string();
        let url = self.endpoint(&["api", "orgs", org_segment.as_str()])?;
        let builder = self
            .request(Method::PUT, url)
            .json(&OrgNameRequest { name });

        self.send(builder, "rename organization").await.map(|_| ())
    }

    async fn delete_org(&self, org_id: OrgId) -> AppResult<()> {
        let org_segment = org_id.to_string();
        let url = self.endpoint(&["api", "orgs", org_segment.as_str()])?;

        self.send(self.request(Method::DELETE, url), "delete organization")
            .await
            .map(|_| ())
    }
}

fn status_error(status: StatusCode, context: &str, body: &str) -> AppError {
    let message = format!("{context} returned status {}: {body}", status.as_u16());
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            AppError::Validation(message)
        }
        StatusCode::UNAUTHORIZED => AppError::Unauthorized(message),
        StatusCode::FORBIDDEN => AppError::Forbidden(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        _ => AppError::Internal(message),
    }
}

fn directory_users(users: Vec<UserResponse>) -> Vec<DirectoryUser> {
    users
        .into_iter()
        .filter_map(|user| match EmailAddress::new(user.email.as_str()) {
            Ok(email) => Some(DirectoryUser {
                email,
                id: RemoteUserId::new(user.id),
            }),
            Err(error) => {
                debug!(user_id = user.id, error = %error, "directory user has no usable email");
                None
            }
        })
        .collect()
}

fn roster_members(org_id: OrgId, members: Vec<OrgUserResponse>) -> Vec<RosterMember> {
    members
        .into_iter()
        .filter_map(|member| {
            let email = match EmailAddress::new(member.email.as_str()) {
                Ok(email) => email,
                Err(error) => {
                    warn!(
                        org_id = %org_id,
                        login = %member.login,
                        error = %error,
                        "ignoring organization member without usable email"
                    );
                    return None;
                }
            };
            let role = Role::from_str(member.role.as_str()).ok();
            if role.is_none() {
                debug!(
                    org_id = %org_id,
                    email = %email,
                    role = %member.role,
                    "organization member holds an unmanaged role"
                );
            }

            Some(RosterMember {
                email,
                login: member.login,
                role,
            })
        })
        .collect()
}
