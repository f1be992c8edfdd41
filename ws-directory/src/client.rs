//! Connection seam between the authenticator and the wire protocol.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::config::DirectoryConfig;
use crate::error::Result;

/// One search result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, values: &[&str]) -> Self {
        self.attributes
            .entry(name.to_string())
            .or_default()
            .extend(values.iter().map(|v| v.to_string()));
        self
    }

    /// All values of `name`; attribute names compare case-insensitively.
    pub fn values(&self, name: &str) -> &[String] {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }
}

/// Opens connections to the directory described by a [`DirectoryConfig`].
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(&self, config: &DirectoryConfig) -> Result<Box<dyn DirectoryConnection>>;
}

/// An open directory session.
///
/// `release` must be called on every path once the connection is no longer
/// needed; it never fails.
#[async_trait]
pub trait DirectoryConnection: Send {
    async fn bind(&mut self, principal: &str, password: &str) -> Result<()>;

    async fn search(&mut self, base: &str, filter: &str, attributes: &[&str]) -> Result<Vec<DirectoryEntry>>;

    async fn release(&mut self);
}
