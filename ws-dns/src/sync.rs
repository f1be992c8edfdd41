//! Keeps each workspace's DNS record pointed at the cluster.

use serde::Serialize;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use ws_core::{naming, Employee};

use crate::error::{DnsError, Result};
use crate::provider::{DnsProvider, NodeAddressSource};

/// Short TTL so records re-point quickly after node changes.
pub const DEFAULT_TTL: u32 = 60;

const HTTPS_PORT: u16 = 443;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsSettings {
    pub domain: String,
    pub ttl: u32,
}

impl DnsSettings {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ttl: DEFAULT_TTL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsRegistration {
    pub hostname: String,
    pub addresses: Vec<Ipv4Addr>,
    pub url: String,
    pub change_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsRemoval {
    pub hostname: String,
    /// False when there was nothing to delete.
    pub removed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsLookup {
    pub hostname: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addresses: Option<Vec<Ipv4Addr>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

pub struct DnsSynchronizer {
    provider: Arc<dyn DnsProvider>,
    nodes: Option<Arc<dyn NodeAddressSource>>,
    settings: DnsSettings,
}

impl DnsSynchronizer {
    pub fn new(provider: Arc<dyn DnsProvider>, settings: DnsSettings) -> Self {
        Self {
            provider,
            nodes: None,
            settings,
        }
    }

    /// Publish every healthy node instead of only the fallback address.
    pub fn with_node_addresses(mut self, nodes: Arc<dyn NodeAddressSource>) -> Self {
        self.nodes = Some(nodes);
        self
    }

    pub fn settings(&self) -> &DnsSettings {
        &self.settings
    }

    pub fn hostname(&self, employee: &Employee) -> Result<String> {
        Ok(naming::hostname(employee, &self.settings.domain)?)
    }

    /// Public URL for a hostname; the port is omitted when it is 443.
    pub fn url(hostname: &str, port: u16) -> String {
        if port == HTTPS_PORT {
            format!("https://{hostname}")
        } else {
            format!("https://{hostname}:{port}")
        }
    }

    /// Point the employee's hostname at all healthy nodes, or at `fallback`
    /// when nodes cannot be listed. The record is replaced, never appended to.
    #[instrument(skip(self, employee), fields(employee_id = %employee.employee_id))]
    pub async fn upsert(&self, employee: &Employee, fallback: Ipv4Addr, port: u16) -> Result<DnsRegistration> {
        let hostname = self.hostname(employee)?;
        let addresses = self.target_addresses(fallback).await;

        let change_id = self
            .provider
            .upsert_a_record(&hostname, &addresses, self.settings.ttl)
            .await?;

        info!(%hostname, addresses = ?addresses, %change_id, "DNS record upserted");
        Ok(DnsRegistration {
            url: Self::url(&hostname, port),
            hostname,
            addresses,
            change_id,
        })
    }

    /// Delete the employee's record if it exists. Deleting an absent record
    /// succeeds.
    #[instrument(skip(self, employee), fields(employee_id = %employee.employee_id))]
    pub async fn remove(&self, employee: &Employee) -> Result<DnsRemoval> {
        let hostname = self.hostname(employee)?;

        let Some(existing) = self.provider.find_a_record(&hostname).await? else {
            debug!(%hostname, "DNS record absent, nothing to remove");
            return Ok(DnsRemoval {
                hostname,
                removed: false,
            });
        };

        match self.provider.delete_record(&existing).await {
            Ok(change_id) => {
                info!(%hostname, %change_id, "DNS record removed");
                Ok(DnsRemoval { hostname, removed: true })
            }
            Err(DnsError::InvalidChangeBatch(reason)) => {
                warn!(%hostname, %reason, "DNS record already deleted");
                Ok(DnsRemoval {
                    hostname,
                    removed: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn lookup(&self, employee: &Employee) -> Result<DnsLookup> {
        let hostname = self.hostname(employee)?;
        let record = self.provider.find_a_record(&hostname).await?;

        Ok(DnsLookup {
            exists: record.is_some(),
            addresses: record.as_ref().map(|r| r.addresses.clone()),
            ttl: record.map(|r| r.ttl),
            hostname,
        })
    }

    async fn target_addresses(&self, fallback: Ipv4Addr) -> Vec<Ipv4Addr> {
        let Some(nodes) = &self.nodes else {
            return vec![fallback];
        };

        match nodes.node_addresses().await {
            Ok(found) if !found.is_empty() => {
                let unique: BTreeSet<Ipv4Addr> = found.into_iter().collect();
                unique.into_iter().collect()
            }
            Ok(_) => {
                warn!(%fallback, "No healthy nodes found, using fallback address");
                vec![fallback]
            }
            Err(e) => {
                warn!(%fallback, error = %e, "Node enumeration failed, using fallback address");
                vec![fallback]
            }
        }
    }
}
