//! Credential checks and group resolution against the directory.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use ws_core::{PermissionMatrix, PermissionSet};

use crate::client::{DirectoryConnection, DirectoryConnector};
use crate::config::{DirectoryConfig, DirectorySettings, DirectoryState};
use crate::dn::DistinguishedName;
use crate::error::{DirectoryError, Result};
use crate::policy::{with_timeout, RetryPolicy};

const USER_ATTRIBUTES: [&str; 3] = ["memberOf", "displayName", "mail"];

/// A user the directory vouched for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryPrincipal {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Authenticated(DirectoryPrincipal),
    /// The directory refused the credentials.
    Rejected,
    /// No usable directory configuration; callers should fall back.
    Disabled { reason: String },
    /// Every attempt failed for a non-credential reason.
    Unavailable(DirectoryError),
}

impl AuthOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated(_))
    }

    pub fn principal(&self) -> Option<&DirectoryPrincipal> {
        match self {
            AuthOutcome::Authenticated(principal) => Some(principal),
            _ => None,
        }
    }
}

/// Result of a group lookup; `success == false` carries no groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupLookup {
    pub success: bool,
    pub groups: Vec<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl GroupLookup {
    pub fn failed() -> Self {
        Self::default()
    }
}

/// Outcome shape handed to callers after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedIdentity {
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub groups: Vec<String>,
    pub permissions: PermissionSet,
}

impl AuthenticatedIdentity {
    pub fn from_principal(principal: DirectoryPrincipal, matrix: &PermissionMatrix) -> Self {
        let permissions = matrix.resolve(&principal.groups);
        Self {
            username: principal.username,
            display_name: principal.display_name,
            email: principal.email,
            groups: principal.groups,
            permissions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct DirectoryAuthenticator {
    settings: Arc<DirectorySettings>,
    connector: Arc<dyn DirectoryConnector>,
    retry: RetryPolicy,
}

impl DirectoryAuthenticator {
    pub fn new(settings: Arc<DirectorySettings>, connector: Arc<dyn DirectoryConnector>) -> Self {
        Self {
            settings,
            connector,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn settings(&self) -> &Arc<DirectorySettings> {
        &self.settings
    }

    /// Bind as `username@domain`, then resolve the user's groups.
    ///
    /// Connect and bind are each bounded by the configured timeout and the
    /// connection is released after every attempt. Transient failures are
    /// retried per the [`RetryPolicy`]; a rejection ends the call at once.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> AuthOutcome {
        let config = match self.settings.current().await {
            DirectoryState::Enabled(config) => config,
            DirectoryState::Disabled { reason } => return AuthOutcome::Disabled { reason },
        };

        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            info!("Rejecting login with empty username or password");
            return AuthOutcome::Rejected;
        }

        let principal = config.user_principal(username);
        let bound = self
            .retry
            .run("bind", |attempt| {
                debug!(attempt, principal = %principal, "Binding to directory");
                self.bind_once(&config, &principal, password)
            })
            .await;

        match bound {
            Ok(()) => {}
            Err(DirectoryError::InvalidCredentials) => {
                info!("Directory rejected credentials");
                return AuthOutcome::Rejected;
            }
            Err(e) => {
                warn!(error = %e, "Directory authentication failed");
                return AuthOutcome::Unavailable(e);
            }
        }

        let lookup = self.lookup_groups(&config, username).await;
        info!(groups = lookup.groups.len(), "Directory authentication succeeded");

        AuthOutcome::Authenticated(DirectoryPrincipal {
            username: username.to_string(),
            display_name: lookup.display_name.unwrap_or_else(|| username.to_string()),
            email: lookup
                .email
                .unwrap_or_else(|| format!("{}@{}", username, config.domain)),
            groups: lookup.groups,
        })
    }

    /// Group memberships and display attributes of `username`.
    ///
    /// Never fails: a disabled directory, missing entry, search error or
    /// timeout all yield [`GroupLookup::failed`].
    #[instrument(skip(self))]
    pub async fn resolve_groups(&self, username: &str) -> GroupLookup {
        match self.settings.current().await {
            DirectoryState::Enabled(config) => self.lookup_groups(&config, username.trim()).await,
            DirectoryState::Disabled { reason } => {
                debug!(%reason, "Group lookup skipped, directory disabled");
                GroupLookup::failed()
            }
        }
    }

    /// Connect and bind with the service account.
    pub async fn health_check(&self) -> DirectoryHealth {
        let config = match self.settings.current().await {
            DirectoryState::Enabled(config) => config,
            DirectoryState::Disabled { reason } => {
                return DirectoryHealth {
                    status: HealthStatus::Disabled,
                    url: None,
                    domain: None,
                    message: Some(reason),
                }
            }
        };

        let probe = async {
            let account = config
                .service_account
                .as_ref()
                .ok_or_else(|| DirectoryError::Config("no service account configured".to_string()))?;
            let mut conn = with_timeout("connect", config.timeout, self.connector.connect(&config)).await?;
            let result = with_timeout(
                "bind",
                config.timeout,
                conn.bind(&account.principal, &account.password),
            )
            .await;
            release(conn, config.timeout).await;
            result
        };

        let (status, message) = match probe.await {
            Ok(()) => (HealthStatus::Healthy, None),
            Err(e) => {
                warn!(error = %e, "Directory health check failed");
                (HealthStatus::Unhealthy, Some(e.to_string()))
            }
        };

        DirectoryHealth {
            status,
            url: Some(config.url.clone()),
            domain: Some(config.domain.clone()),
            message,
        }
    }

    async fn bind_once(&self, config: &DirectoryConfig, principal: &str, password: &str) -> Result<()> {
        let mut conn = with_timeout("connect", config.timeout, self.connector.connect(config)).await?;
        let result = with_timeout("bind", config.timeout, conn.bind(principal, password)).await;
        release(conn, config.timeout).await;
        result
    }

    async fn lookup_groups(&self, config: &DirectoryConfig, username: &str) -> GroupLookup {
        match self.try_lookup_groups(config, username).await {
            Ok(lookup) => lookup,
            Err(e) => {
                warn!(username, error = %e, "Group lookup failed");
                GroupLookup::failed()
            }
        }
    }

    async fn try_lookup_groups(&self, config: &DirectoryConfig, username: &str) -> Result<GroupLookup> {
        let account = config
            .service_account
            .as_ref()
            .ok_or_else(|| DirectoryError::Config("no service account configured".to_string()))?;

        let mut conn = with_timeout("connect", config.timeout, self.connector.connect(config)).await?;
        let result = search_user(conn.as_mut(), config, &account.principal, &account.password, username).await;
        release(conn, config.timeout).await;
        result
    }
}

async fn search_user(
    conn: &mut dyn DirectoryConnection,
    config: &DirectoryConfig,
    principal: &str,
    password: &str,
    username: &str,
) -> Result<GroupLookup> {
    with_timeout("bind", config.timeout, conn.bind(principal, password)).await?;

    let filter = format!("(sAMAccountName={})", ldap3::ldap_escape(username));
    let entries = with_timeout(
        "search",
        config.timeout,
        conn.search(&config.base_dn, &filter, &USER_ATTRIBUTES),
    )
    .await?;

    let entry = entries
        .into_iter()
        .next()
        .ok_or_else(|| DirectoryError::Operation(format!("no directory entry for {username}")))?;

    let groups = entry
        .values("memberOf")
        .iter()
        .filter_map(|value| match DistinguishedName::parse(value) {
            Ok(dn) => dn.common_name().map(str::to_string),
            Err(e) => {
                warn!(dn = %value, error = %e, "Skipping unparseable group DN");
                None
            }
        })
        .collect();

    Ok(GroupLookup {
        success: true,
        groups,
        display_name: entry.first("displayName").map(str::to_string),
        email: entry.first("mail").map(str::to_string),
    })
}

async fn release(mut conn: Box<dyn DirectoryConnection>, limit: Duration) {
    if tokio::time::timeout(limit, conn.release()).await.is_err() {
        warn!("Timed out releasing directory connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectoryConfig;
    use crate::mock::{BindPlan, ScriptedConnector};
    use ws_core::{Action, Resource};

    fn enabled(timeout: Duration) -> Arc<DirectorySettings> {
        let config = DirectoryConfig::new("ldap://10.0.0.1:389", "DC=innovatech,DC=local", timeout)
            .unwrap()
            .with_service_account("svc", "svc-pass");
        Arc::new(DirectorySettings::fixed(DirectoryState::Enabled(Arc::new(config))))
    }

    #[tokio::test]
    async fn test_disabled_directory_is_a_distinct_outcome() {
        let settings = Arc::new(DirectorySettings::fixed(DirectoryState::Disabled {
            reason: "not enabled".into(),
        }));
        let connector = Arc::new(ScriptedConnector::new());
        let auth = DirectoryAuthenticator::new(settings, connector.clone());

        let outcome = auth.authenticate("ada", "pw").await;

        assert_eq!(outcome, AuthOutcome::Disabled { reason: "not enabled".into() });
        assert_eq!(connector.connects(), 0);
        assert_eq!(auth.resolve_groups("ada").await, GroupLookup::failed());
    }

    #[tokio::test]
    async fn test_empty_password_never_reaches_directory() {
        let connector = Arc::new(ScriptedConnector::new().with_account("ada@innovatech.local", ""));
        let auth = DirectoryAuthenticator::new(enabled(Duration::from_secs(5)), connector.clone());

        assert_eq!(auth.authenticate("ada", "").await, AuthOutcome::Rejected);
        assert_eq!(auth.authenticate("  ", "pw").await, AuthOutcome::Rejected);
        assert_eq!(connector.connects(), 0);
    }

    #[test]
    fn test_identity_carries_resolved_permissions() {
        let principal = DirectoryPrincipal {
            username: "ada".into(),
            display_name: "Ada Lovelace".into(),
            email: "ada@innovatech.local".into(),
            groups: vec!["IT-Admins".into()],
        };

        let identity = AuthenticatedIdentity::from_principal(principal, PermissionMatrix::standard());

        assert!(identity.permissions.allows(Resource::Monitoring, Action::Read));
        assert!(!identity.permissions.allows(Resource::Employees, Action::Read));

        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["displayName"], "Ada Lovelace");
        assert_eq!(json["permissions"]["workspaces"], serde_json::json!(["create", "read", "delete"]));
    }

    #[tokio::test]
    async fn test_health_reports_bind_failure() {
        let connector = Arc::new(ScriptedConnector::new().with_bind_plan(BindPlan::Fail));
        let auth = DirectoryAuthenticator::new(enabled(Duration::from_secs(5)), connector.clone());

        let health = auth.health_check().await;

        assert_eq!(health.status, HealthStatus::Unhealthy);
        assert_eq!(health.domain.as_deref(), Some("innovatech.local"));
        assert_eq!(connector.releases(), 1);
    }
}
