use std::env;

use rostersync_application::ReconcileSettings;
use rostersync_core::{AppError, AppResult, OrgId};
use rostersync_domain::{DuplicatePolicy, ExemptLogin, RoleLists};
use rostersync_infrastructure::RemoteCredentials;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteBackendConfig {
    Http {
        base_url: String,
        credentials: RemoteCredentials,
        timeout_ms: u64,
        org_id: OrgId,
    },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub backend: RemoteBackendConfig,
    pub members: RoleLists,
    pub settings: ReconcileSettings,
    pub interval_ms: Option<u64>,
    pub dry_run: bool,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let backend = match lookup("REMOTE_BACKEND")
            .unwrap_or_else(|| "http".to_owned())
            .as_str()
        {
            "http" => load_http_backend(&lookup)?,
            "memory" => RemoteBackendConfig::Memory,
            other => {
                return Err(AppError::Validation(format!(
                    "REMOTE_BACKEND must be either 'http' or 'memory', got '{other}'"
                )));
            }
        };

        let members = RoleLists {
            admins: parse_email_list(lookup("ROSTER_ADMINS")),
            editors: parse_email_list(lookup("ROSTER_EDITORS")),
            viewers: parse_email_list(lookup("ROSTER_VIEWERS")),
        };

        let exempt_login = lookup("ROSTER_EXEMPT_LOGIN")
            .map(|value| ExemptLogin::new(value.trim()))
            .unwrap_or_default();
        let duplicate_policy = lookup("ROSTER_DUPLICATE_POLICY")
            .map(|value| DuplicatePolicy::parse_transport(value.trim()))
            .transpose()?
            .unwrap_or_default();

        let interval_ms = parse_optional_u64(&lookup, "RECONCILE_INTERVAL_MS")?;
        if interval_ms == Some(0) {
            return Err(AppError::Validation(
                "RECONCILE_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        let dry_run = lookup("RECONCILE_DRY_RUN")
            .unwrap_or_else(|| "false".to_owned())
            .eq_ignore_ascii_case("true");

        Ok(Self {
            backend,
            members,
            settings: ReconcileSettings {
                exempt_login,
                duplicate_policy,
            },
            interval_ms,
            dry_run,
        })
    }
}

fn load_http_backend(lookup: &impl Fn(&str) -> Option<String>) -> AppResult<RemoteBackendConfig> {
    let base_url = required_non_empty(lookup, "REMOTE_API_BASE_URL")?
        .trim()
        .trim_end_matches('/')
        .to_owned();
    let parsed = Url::parse(base_url.as_str()).map_err(|error| {
        AppError::Validation(format!("invalid REMOTE_API_BASE_URL '{base_url}': {error}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::Validation(format!(
            "REMOTE_API_BASE_URL must use http or https, got '{}'",
            parsed.scheme()
        )));
    }

    let credentials = match (
        non_empty(lookup, "REMOTE_API_TOKEN"),
        non_empty(lookup, "REMOTE_API_USERNAME"),
    ) {
        (Some(token), _) => RemoteCredentials::Token(token),
        (None, Some(username)) => RemoteCredentials::Basic {
            username,
            password: required_non_empty(lookup, "REMOTE_API_PASSWORD")?,
        },
        (None, None) => {
            return Err(AppError::Validation(
                "either REMOTE_API_TOKEN or REMOTE_API_USERNAME is required".to_owned(),
            ));
        }
    };

    let timeout_ms = parse_optional_u64(lookup, "REMOTE_HTTP_TIMEOUT_MS")?.unwrap_or(15_000);
    if timeout_ms == 0 {
        return Err(AppError::Validation(
            "REMOTE_HTTP_TIMEOUT_MS must be greater than zero".to_owned(),
        ));
    }

    let raw_org_id = required_non_empty(lookup, "ROSTER_ORG_ID")?;
    let org_id = raw_org_id
        .trim()
        .parse::<i64>()
        .map_err(|error| {
            AppError::Validation(format!("invalid ROSTER_ORG_ID value '{raw_org_id}': {error}"))
        })
        .and_then(OrgId::new)?;

    Ok(RemoteBackendConfig::Http {
        base_url,
        credentials,
        timeout_ms,
        org_id,
    })
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_email_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_owned)
        .collect()
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|value| !value.trim().is_empty())
}

fn required_non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> AppResult<String> {
    non_empty(lookup, name).ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parse_optional_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> AppResult<Option<u64>> {
    non_empty(lookup, name)
        .map(|value| {
            value.trim().parse::<u64>().map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rostersync_core::{AppError, OrgId};
    use rostersync_domain::DuplicatePolicy;
    use rostersync_infrastructure::RemoteCredentials;

    use super::{RemoteBackendConfig, WorkerConfig};

    fn load(pairs: &[(&str, &str)]) -> Result<WorkerConfig, AppError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        WorkerConfig::from_lookup(|name| values.get(name).cloned())
    }

    fn http_pairs() -> Vec<(&'static str, &'static str)> {
        vec![
            ("REMOTE_API_BASE_URL", "https://grafana.example.com/"),
            ("REMOTE_API_TOKEN", "secret"),
            ("ROSTER_ORG_ID", "4"),
        ]
    }

    #[test]
    fn loads_http_backend_with_defaults() {
        let config = load(&http_pairs()).unwrap_or_else(|_| unreachable!());

        assert_eq!(
            config.backend,
            RemoteBackendConfig::Http {
                base_url: "https://grafana.example.com".to_owned(),
                credentials: RemoteCredentials::Token("secret".to_owned()),
                timeout_ms: 15_000,
                org_id: OrgId::new(4).unwrap_or_else(|_| unreachable!()),
            }
        );
        assert_eq!(config.settings.exempt_login.as_str(), "admin");
        assert_eq!(config.settings.duplicate_policy, DuplicatePolicy::Reject);
        assert_eq!(config.interval_ms, None);
        assert!(!config.dry_run);
    }

    #[test]
    fn empty_exempt_login_disables_exemption() {
        let mut pairs = http_pairs();
        pairs.push(("ROSTER_EXEMPT_LOGIN", ""));

        let config = load(&pairs).unwrap_or_else(|_| unreachable!());

        assert!(!config.settings.exempt_login.is_enabled());
    }

    #[test]
    fn parses_member_lists_and_policy() {
        let mut pairs = http_pairs();
        pairs.push(("ROSTER_ADMINS", "a@example.com, b@example.com,"));
        pairs.push(("ROSTER_VIEWERS", " v@example.com "));
        pairs.push(("ROSTER_DUPLICATE_POLICY", "last_list_wins"));

        let config = load(&pairs).unwrap_or_else(|_| unreachable!());

        assert_eq!(
            config.members.admins,
            vec!["a@example.com".to_owned(), "b@example.com".to_owned()]
        );
        assert!(config.members.editors.is_empty());
        assert_eq!(config.members.viewers, vec!["v@example.com".to_owned()]);
        assert_eq!(
            config.settings.duplicate_policy,
            DuplicatePolicy::LastListWins
        );
    }

    #[test]
    fn basic_credentials_require_password() {
        let result = load(&[
            ("REMOTE_API_BASE_URL", "http://localhost:3000"),
            ("REMOTE_API_USERNAME", "admin"),
            ("ROSTER_ORG_ID", "1"),
        ]);

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn rejects_invalid_org_id_and_interval() {
        let mut pairs = http_pairs();
        pairs.retain(|(name, _)| *name != "ROSTER_ORG_ID");
        pairs.push(("ROSTER_ORG_ID", "0"));
        assert!(load(&pairs).is_err());

        let mut pairs = http_pairs();
        pairs.push(("RECONCILE_INTERVAL_MS", "0"));
        assert!(load(&pairs).is_err());
    }

    #[test]
    fn memory_backend_needs_no_remote_settings() {
        let config = load(&[("REMOTE_BACKEND", "memory"), ("RECONCILE_DRY_RUN", "TRUE")])
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(config.backend, RemoteBackendConfig::Memory);
        assert!(config.dry_run);
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(load(&[("REMOTE_BACKEND", "ldap")]).is_err());
    }
}
