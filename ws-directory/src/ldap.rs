//! LDAP implementation of [`DirectoryConnector`].

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use tracing::{debug, warn};

use crate::client::{DirectoryConnection, DirectoryConnector, DirectoryEntry};
use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, Result};

const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_BUSY: u32 = 51;
const RC_UNAVAILABLE: u32 = 52;

#[derive(Debug, Clone, Copy, Default)]
pub struct LdapConnector;

impl LdapConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(&self, config: &DirectoryConfig) -> Result<Box<dyn DirectoryConnection>> {
        let settings = LdapConnSettings::new().set_conn_timeout(config.timeout);
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &config.url)
            .await
            .map_err(|e| DirectoryError::Connect(format!("{}: {}", config.url, e)))?;
        ldap3::drive!(conn);

        debug!(url = %config.url, "Directory connection established");
        Ok(Box::new(LdapConnection { ldap: Some(ldap) }))
    }
}

struct LdapConnection {
    ldap: Option<Ldap>,
}

impl LdapConnection {
    fn session(&mut self) -> Result<&mut Ldap> {
        self.ldap
            .as_mut()
            .ok_or_else(|| DirectoryError::Operation("connection already released".to_string()))
    }
}

#[async_trait]
impl DirectoryConnection for LdapConnection {
    async fn bind(&mut self, principal: &str, password: &str) -> Result<()> {
        let result = self.session()?.simple_bind(principal, password).await.map_err(map_error)?;
        result.success().map_err(map_error)?;
        Ok(())
    }

    async fn search(&mut self, base: &str, filter: &str, attributes: &[&str]) -> Result<Vec<DirectoryEntry>> {
        let attrs: Vec<&str> = attributes.to_vec();
        let (entries, _) = self
            .session()?
            .search(base, Scope::Subtree, filter, attrs)
            .await
            .map_err(map_error)?
            .success()
            .map_err(map_error)?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(|entry| DirectoryEntry {
                dn: entry.dn,
                attributes: entry.attrs,
            })
            .collect())
    }

    async fn release(&mut self) {
        if let Some(mut ldap) = self.ldap.take() {
            if let Err(e) = ldap.unbind().await {
                warn!(error = %e, "Failed to unbind directory connection");
            }
        }
    }
}

fn map_error(e: LdapError) -> DirectoryError {
    match e {
        LdapError::LdapResult { result } => match result.rc {
            RC_INVALID_CREDENTIALS => DirectoryError::InvalidCredentials,
            RC_BUSY | RC_UNAVAILABLE => DirectoryError::Unavailable(format!("rc={} {}", result.rc, result.text)),
            rc => DirectoryError::Operation(format!("rc={} {}", rc, result.text)),
        },
        LdapError::Io { source } => DirectoryError::Connect(source.to_string()),
        other => DirectoryError::Operation(other.to_string()),
    }
}
