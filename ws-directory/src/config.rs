//! Directory settings.
//!
//! The endpoint, base DN and service-account credentials live in a remote
//! parameter store. [`DirectorySettings`] loads them on first use, caches the
//! result and can be told to [`refresh`](DirectorySettings::refresh) so a
//! credential rotation does not need a restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::dn::DistinguishedName;
use crate::error::{DirectoryError, Result};
use crate::policy::with_timeout;

pub const LDAP_PORT: u16 = 389;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Read access to a key/value parameter store.
#[async_trait]
pub trait ParameterSource: Send + Sync {
    /// `Ok(None)` when the parameter does not exist.
    async fn get_parameter(&self, name: &str, decrypt: bool) -> Result<Option<String>>;
}

/// Parameters held in memory, for static deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticParameters {
    values: HashMap<String, String>,
}

impl StaticParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl ParameterSource for StaticParameters {
    async fn get_parameter(&self, name: &str, _decrypt: bool) -> Result<Option<String>> {
        Ok(self.values.get(name).cloned())
    }
}

/// Credentials of the account used for directory searches.
#[derive(Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    pub principal: String,
    pub password: String,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("principal", &self.principal)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    pub url: String,
    pub base_dn: String,
    /// DNS domain derived from the `DC` components of `base_dn`.
    pub domain: String,
    pub timeout: Duration,
    pub service_account: Option<ServiceAccount>,
}

impl DirectoryConfig {
    pub fn new(url: impl Into<String>, base_dn: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_dn = base_dn.into();
        let domain = DistinguishedName::parse(&base_dn)?
            .dns_domain()
            .ok_or_else(|| DirectoryError::Config(format!("base DN {base_dn} has no DC components")))?;

        Ok(Self {
            url: url.into(),
            base_dn,
            domain,
            timeout,
            service_account: None,
        })
    }

    /// Attach the search account. Bare user names are turned into a UPN.
    pub fn with_service_account(mut self, user: &str, password: impl Into<String>) -> Self {
        let principal = if user.contains('@') || user.contains('=') {
            user.to_string()
        } else {
            self.user_principal(user)
        };
        self.service_account = Some(ServiceAccount {
            principal,
            password: password.into(),
        });
        self
    }

    /// Bind name for a user: `username@domain`.
    pub fn user_principal(&self, username: &str) -> String {
        format!("{}@{}", username, self.domain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryState {
    Enabled(Arc<DirectoryConfig>),
    Disabled { reason: String },
}

impl DirectoryState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, DirectoryState::Enabled(_))
    }
}

/// Lazily loaded, explicitly refreshable directory configuration.
pub struct DirectorySettings {
    source: Option<Arc<dyn ParameterSource>>,
    prefix: String,
    default_base_dn: String,
    timeout: Duration,
    state: RwLock<Option<DirectoryState>>,
    load_lock: Mutex<()>,
}

impl DirectorySettings {
    /// Settings read from `<prefix>/directory/*` in `source`.
    pub fn new(
        source: Arc<dyn ParameterSource>,
        prefix: &str,
        default_base_dn: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            source: Some(source),
            prefix: prefix.trim_end_matches('/').to_string(),
            default_base_dn: default_base_dn.into(),
            timeout,
            state: RwLock::new(None),
            load_lock: Mutex::new(()),
        }
    }

    /// Settings pinned to a known state; `refresh` keeps it.
    pub fn fixed(state: DirectoryState) -> Self {
        Self {
            source: None,
            prefix: String::new(),
            default_base_dn: String::new(),
            timeout: DEFAULT_TIMEOUT,
            state: RwLock::new(Some(state)),
            load_lock: Mutex::new(()),
        }
    }

    /// Current state, loading it on first use.
    pub async fn current(&self) -> DirectoryState {
        if let Some(state) = self.state.read().await.clone() {
            return state;
        }

        let _guard = self.load_lock.lock().await;
        if let Some(state) = self.state.read().await.clone() {
            return state;
        }

        let (state, cacheable) = self.load().await;
        if cacheable {
            *self.state.write().await = Some(state.clone());
        }
        state
    }

    /// Reload from the parameter store and swap the cached state.
    pub async fn refresh(&self) -> DirectoryState {
        let _guard = self.load_lock.lock().await;
        if self.source.is_none() {
            return self.state.read().await.clone().unwrap_or(DirectoryState::Disabled {
                reason: "no parameter source configured".to_string(),
            });
        }

        let (state, cacheable) = self.load().await;
        if cacheable {
            *self.state.write().await = Some(state.clone());
            info!(enabled = state.is_enabled(), "Directory settings refreshed");
        }
        state
    }

    /// Returns the state and whether it may be cached. Store outages are not
    /// cached so the next call tries again.
    async fn load(&self) -> (DirectoryState, bool) {
        match self.try_load().await {
            Ok(state) => {
                if let DirectoryState::Disabled { reason } = &state {
                    warn!(%reason, "Directory service disabled");
                }
                (state, true)
            }
            Err(DirectoryError::Parameter(e)) => {
                warn!(error = %e, "Could not read directory settings");
                (
                    DirectoryState::Disabled {
                        reason: format!("parameter store unavailable: {e}"),
                    },
                    false,
                )
            }
            Err(e) => {
                warn!(error = %e, "Invalid directory settings");
                (DirectoryState::Disabled { reason: e.to_string() }, true)
            }
        }
    }

    async fn try_load(&self) -> Result<DirectoryState> {
        let enabled = self.parameter("enabled", false).await?;
        if !enabled.is_some_and(|v| v.trim().eq_ignore_ascii_case("true")) {
            return Ok(DirectoryState::Disabled {
                reason: "directory service not enabled".to_string(),
            });
        }

        let Some(servers) = self.parameter("dns-servers", false).await? else {
            return Ok(DirectoryState::Disabled {
                reason: "no directory DNS servers configured".to_string(),
            });
        };
        let Some(primary) = primary_server(&servers) else {
            return Ok(DirectoryState::Disabled {
                reason: "directory DNS server list is empty".to_string(),
            });
        };

        let base_dn = self
            .parameter("base-dn", false)
            .await?
            .unwrap_or_else(|| self.default_base_dn.clone());
        let mut config = DirectoryConfig::new(format!("ldap://{primary}:{LDAP_PORT}"), base_dn, self.timeout)?;

        let user = self.parameter("admin-user", false).await?;
        let password = self.parameter("admin-password", true).await?;
        match (user, password) {
            (Some(user), Some(password)) => config = config.with_service_account(&user, password),
            _ => warn!("Directory service account not configured; group lookups will fail"),
        }

        info!(url = %config.url, domain = %config.domain, "Directory configuration loaded");
        Ok(DirectoryState::Enabled(Arc::new(config)))
    }

    async fn parameter(&self, key: &str, decrypt: bool) -> Result<Option<String>> {
        let Some(source) = &self.source else {
            return Ok(None);
        };
        let name = format!("{}/directory/{}", self.prefix, key);
        // A hung store is an outage: the result must not be cached.
        with_timeout("parameter read", self.timeout, source.get_parameter(&name, decrypt))
            .await
            .map_err(|e| match e {
                DirectoryError::Timeout { .. } => DirectoryError::Parameter(e.to_string()),
                other => other,
            })
    }
}

/// First entry of a comma- or whitespace-separated server list.
fn primary_server(list: &str) -> Option<&str> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .find(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn enabled_parameters() -> StaticParameters {
        StaticParameters::new()
            .with("/ws/directory/enabled", "true")
            .with("/ws/directory/dns-servers", "10.0.56.171,10.0.76.3")
            .with("/ws/directory/admin-user", "Admin")
            .with("/ws/directory/admin-password", "s3cret")
    }

    fn settings(source: impl ParameterSource + 'static) -> DirectorySettings {
        DirectorySettings::new(Arc::new(source), "/ws/", "DC=innovatech,DC=local", DEFAULT_TIMEOUT)
    }

    #[test]
    fn test_domain_and_principals() {
        let config = DirectoryConfig::new("ldap://dc:389", "OU=Corp,DC=innovatech,DC=local", DEFAULT_TIMEOUT)
            .unwrap()
            .with_service_account("Admin", "pw");

        assert_eq!(config.domain, "innovatech.local");
        assert_eq!(config.user_principal("ada"), "ada@innovatech.local");
        assert_eq!(
            config.service_account.as_ref().map(|a| a.principal.as_str()),
            Some("Admin@innovatech.local")
        );

        let dn_account = config.clone().with_service_account("CN=svc,CN=Users,DC=innovatech,DC=local", "pw");
        assert_eq!(
            dn_account.service_account.unwrap().principal,
            "CN=svc,CN=Users,DC=innovatech,DC=local"
        );
    }

    #[test]
    fn test_base_dn_without_domain_is_rejected() {
        let err = DirectoryConfig::new("ldap://dc:389", "OU=Corp", DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, DirectoryError::Config(_)));
    }

    #[test]
    fn test_service_password_is_redacted() {
        let account = ServiceAccount {
            principal: "svc@corp".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{account:?}").contains("hunter2"));
    }

    #[test]
    fn test_primary_server() {
        assert_eq!(primary_server("10.0.0.1,10.0.0.2"), Some("10.0.0.1"));
        assert_eq!(primary_server(" 10.0.53.80 10.0.69.99"), Some("10.0.53.80"));
        assert_eq!(primary_server(" , "), None);
    }

    #[tokio::test]
    async fn test_loads_enabled_configuration() {
        let state = settings(enabled_parameters()).current().await;

        let DirectoryState::Enabled(config) = state else {
            panic!("expected enabled directory");
        };
        assert_eq!(config.url, "ldap://10.0.56.171:389");
        assert_eq!(config.base_dn, "DC=innovatech,DC=local");
        assert_eq!(config.service_account.as_ref().unwrap().principal, "Admin@innovatech.local");
    }

    #[tokio::test]
    async fn test_missing_flag_means_disabled() {
        let state = settings(StaticParameters::new()).current().await;
        assert!(matches!(state, DirectoryState::Disabled { .. }));
    }

    #[tokio::test]
    async fn test_missing_servers_means_disabled() {
        let params = StaticParameters::new().with("/ws/directory/enabled", "true");
        assert!(!settings(params).current().await.is_enabled());
    }

    struct CountingSource {
        inner: StaticParameters,
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ParameterSource for CountingSource {
        async fn get_parameter(&self, name: &str, decrypt: bool) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DirectoryError::Parameter("throttled".into()));
            }
            self.inner.get_parameter(name, decrypt).await
        }
    }

    #[tokio::test]
    async fn test_configuration_is_cached_until_refresh() {
        let source = Arc::new(CountingSource {
            inner: enabled_parameters(),
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let settings =
            DirectorySettings::new(source.clone(), "/ws", "DC=innovatech,DC=local", DEFAULT_TIMEOUT);

        settings.current().await;
        let after_first = source.calls.load(Ordering::SeqCst);
        settings.current().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), after_first);

        settings.refresh().await;
        assert!(source.calls.load(Ordering::SeqCst) > after_first);
    }

    #[tokio::test]
    async fn test_store_outage_is_not_cached() {
        let source = Arc::new(CountingSource {
            inner: StaticParameters::new(),
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let settings =
            DirectorySettings::new(source.clone(), "/ws", "DC=innovatech,DC=local", DEFAULT_TIMEOUT);

        assert!(!settings.current().await.is_enabled());
        assert!(!settings.current().await.is_enabled());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    /// Never answers until `answer` is set.
    struct StalledSource {
        inner: StaticParameters,
        answer: std::sync::atomic::AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ParameterSource for StalledSource {
        async fn get_parameter(&self, name: &str, decrypt: bool) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.answer.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.inner.get_parameter(name, decrypt).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_store_times_out_and_is_not_cached() {
        let source = Arc::new(StalledSource {
            inner: enabled_parameters(),
            answer: std::sync::atomic::AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        });
        let settings = DirectorySettings::new(
            source.clone(),
            "/ws",
            "DC=innovatech,DC=local",
            Duration::from_secs(2),
        );

        let DirectoryState::Disabled { reason } = settings.current().await else {
            panic!("expected disabled directory");
        };
        assert!(reason.starts_with("parameter store unavailable"), "{reason}");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        source.answer.store(true, Ordering::SeqCst);
        assert!(settings.current().await.is_enabled());
        assert!(source.calls.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn test_fixed_settings_survive_refresh() {
        let config = DirectoryConfig::new("ldap://dc:389", "DC=corp,DC=local", DEFAULT_TIMEOUT).unwrap();
        let settings = DirectorySettings::fixed(DirectoryState::Enabled(Arc::new(config)));

        assert!(settings.refresh().await.is_enabled());
    }
}
