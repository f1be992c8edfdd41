use async_trait::async_trait;
use serde::Serialize;
use std::net::Ipv4Addr;

use crate::error::Result;

/// An `A` record as stored by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSet {
    /// Hostname without the trailing dot.
    pub name: String,
    pub addresses: Vec<Ipv4Addr>,
    pub ttl: u32,
}

/// Hosted DNS zone.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Create or replace the `A` record for `name`; returns the change id.
    async fn upsert_a_record(&self, name: &str, addresses: &[Ipv4Addr], ttl: u32) -> Result<String>;

    async fn find_a_record(&self, name: &str) -> Result<Option<RecordSet>>;

    /// Delete exactly `record`; returns the change id.
    async fn delete_record(&self, record: &RecordSet) -> Result<String>;
}

/// Addresses of the nodes that can serve workspace traffic.
#[async_trait]
pub trait NodeAddressSource: Send + Sync {
    async fn node_addresses(&self) -> Result<Vec<Ipv4Addr>>;
}
