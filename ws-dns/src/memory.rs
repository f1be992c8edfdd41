//! In-memory DNS zone and node list for tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{DnsError, Result};
use crate::provider::{DnsProvider, NodeAddressSource, RecordSet};

#[derive(Debug, Default)]
struct Zone {
    records: Mutex<BTreeMap<String, RecordSet>>,
    changes: AtomicUsize,
    deletes: AtomicUsize,
    fail_upserts: AtomicBool,
    reject_deletes: AtomicBool,
}

/// A zone that applies changes immediately.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDnsProvider {
    zone: Arc<Zone>,
}

impl InMemoryDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every upsert fail with a provider error.
    pub fn fail_upserts(&self, fail: bool) {
        self.zone.fail_upserts.store(fail, Ordering::SeqCst);
    }

    /// Answer deletes with an invalid change batch, as if the record
    /// vanished between lookup and delete.
    pub fn reject_deletes(&self, reject: bool) {
        self.zone.reject_deletes.store(reject, Ordering::SeqCst);
    }

    pub fn record(&self, name: &str) -> Option<RecordSet> {
        self.records().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete requests that reached the zone.
    pub fn delete_calls(&self) -> usize {
        self.zone.deletes.load(Ordering::SeqCst)
    }

    fn records(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, RecordSet>> {
        self.zone.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_change_id(&self) -> String {
        format!("/change/C{:04}", self.zone.changes.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl DnsProvider for InMemoryDnsProvider {
    async fn upsert_a_record(&self, name: &str, addresses: &[Ipv4Addr], ttl: u32) -> Result<String> {
        if self.zone.fail_upserts.load(Ordering::SeqCst) {
            return Err(DnsError::Provider("throttled".to_string()));
        }
        self.records().insert(
            name.to_string(),
            RecordSet {
                name: name.to_string(),
                addresses: addresses.to_vec(),
                ttl,
            },
        );
        Ok(self.next_change_id())
    }

    async fn find_a_record(&self, name: &str) -> Result<Option<RecordSet>> {
        Ok(self.record(name))
    }

    async fn delete_record(&self, record: &RecordSet) -> Result<String> {
        self.zone.deletes.fetch_add(1, Ordering::SeqCst);
        if self.zone.reject_deletes.load(Ordering::SeqCst) {
            return Err(DnsError::InvalidChangeBatch(format!("{} not found", record.name)));
        }

        let mut records = self.records();
        match records.get(&record.name) {
            Some(existing) if existing == record => {
                records.remove(&record.name);
                drop(records);
                Ok(self.next_change_id())
            }
            _ => Err(DnsError::InvalidChangeBatch(format!(
                "record {} does not match the zone",
                record.name
            ))),
        }
    }
}

/// Fixed node list, or a failing control plane.
#[derive(Debug, Clone)]
pub struct StaticNodeAddresses {
    addresses: Result<Vec<Ipv4Addr>>,
}

impl StaticNodeAddresses {
    pub fn new(addresses: Vec<Ipv4Addr>) -> Self {
        Self { addresses: Ok(addresses) }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            addresses: Err(DnsError::NodeAddresses(message.to_string())),
        }
    }
}

#[async_trait]
impl NodeAddressSource for StaticNodeAddresses {
    async fn node_addresses(&self) -> Result<Vec<Ipv4Addr>> {
        self.addresses.clone()
    }
}
