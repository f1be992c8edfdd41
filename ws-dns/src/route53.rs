//! Amazon Route 53 hosted zone.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_route53::error::DisplayErrorContext;
use aws_sdk_route53::operation::change_resource_record_sets::ChangeResourceRecordSetsError;
use aws_sdk_route53::types::{Change, ChangeAction, ChangeBatch, ResourceRecord, ResourceRecordSet, RrType};
use aws_sdk_route53::Client;
use std::net::Ipv4Addr;
use tracing::{debug, warn};

use crate::error::{DnsError, Result};
use crate::provider::{DnsProvider, RecordSet};

#[derive(Debug, Clone)]
pub struct Route53Provider {
    client: Client,
    hosted_zone_id: String,
}

impl Route53Provider {
    pub fn new(client: Client, hosted_zone_id: impl Into<String>) -> Result<Self> {
        let hosted_zone_id = hosted_zone_id.into();
        if hosted_zone_id.trim().is_empty() {
            return Err(DnsError::Config("hosted zone id is empty".to_string()));
        }
        Ok(Self { client, hosted_zone_id })
    }

    /// Client built from the default AWS credential chain.
    pub async fn from_env(region: &str, hosted_zone_id: impl Into<String>) -> Result<Self> {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::new(Client::new(&config), hosted_zone_id)
    }

    async fn submit(&self, action: ChangeAction, record: ResourceRecordSet, comment: String) -> Result<String> {
        let change = Change::builder()
            .action(action)
            .resource_record_set(record)
            .build()
            .map_err(|e| DnsError::Provider(e.to_string()))?;
        let batch = ChangeBatch::builder()
            .comment(comment)
            .changes(change)
            .build()
            .map_err(|e| DnsError::Provider(e.to_string()))?;

        let output = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(&self.hosted_zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(|err| match err.as_service_error() {
                Some(ChangeResourceRecordSetsError::InvalidChangeBatch(e)) => {
                    DnsError::InvalidChangeBatch(e.to_string())
                }
                _ => DnsError::Provider(DisplayErrorContext(&err).to_string()),
            })?;

        Ok(output
            .change_info()
            .map(|info| info.id().to_string())
            .unwrap_or_default())
    }

    /// The zone's A record set for `name`, as Route 53 returns it.
    async fn find_record_set(&self, name: &str) -> Result<Option<ResourceRecordSet>> {
        let wanted = fqdn(name);
        let output = self
            .client
            .list_resource_record_sets()
            .hosted_zone_id(&self.hosted_zone_id)
            .start_record_name(&wanted)
            .start_record_type(RrType::A)
            .max_items(1)
            .send()
            .await
            .map_err(|err| DnsError::Provider(DisplayErrorContext(&err).to_string()))?;

        Ok(matching_set(output.resource_record_sets(), &wanted).cloned())
    }
}

fn fqdn(name: &str) -> String {
    format!("{}.", name.trim_end_matches('.'))
}

fn a_record(name: &str, addresses: &[Ipv4Addr], ttl: u32) -> Result<ResourceRecordSet> {
    let records = addresses
        .iter()
        .map(|ip| {
            ResourceRecord::builder()
                .value(ip.to_string())
                .build()
                .map_err(|e| DnsError::Provider(e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    ResourceRecordSet::builder()
        .name(fqdn(name))
        .r#type(RrType::A)
        .ttl(i64::from(ttl))
        .set_resource_records(Some(records))
        .build()
        .map_err(|e| DnsError::Provider(e.to_string()))
}

/// Listing starts at the wanted name but may return the next set in the zone.
fn matching_set<'a>(sets: &'a [ResourceRecordSet], wanted: &str) -> Option<&'a ResourceRecordSet> {
    sets.iter()
        .find(|r| r.name().eq_ignore_ascii_case(wanted) && *r.r#type() == RrType::A)
}

fn to_record_set(name: &str, found: &ResourceRecordSet) -> RecordSet {
    let mut addresses = Vec::new();
    for record in found.resource_records() {
        match record.value().parse::<Ipv4Addr>() {
            Ok(ip) => addresses.push(ip),
            Err(_) => warn!(name, value = record.value(), "Ignoring non-IPv4 record value"),
        }
    }

    RecordSet {
        name: name.trim_end_matches('.').to_string(),
        addresses,
        ttl: found.ttl().and_then(|t| u32::try_from(t).ok()).unwrap_or_default(),
    }
}

#[async_trait]
impl DnsProvider for Route53Provider {
    async fn upsert_a_record(&self, name: &str, addresses: &[Ipv4Addr], ttl: u32) -> Result<String> {
        let record = a_record(name, addresses, ttl)?;
        self.submit(ChangeAction::Upsert, record, format!("Workspace DNS for {name}"))
            .await
    }

    async fn find_a_record(&self, name: &str) -> Result<Option<RecordSet>> {
        match self.find_record_set(name).await? {
            Some(found) => Ok(Some(to_record_set(name, &found))),
            None => {
                debug!(name, "No A record found");
                Ok(None)
            }
        }
    }

    async fn delete_record(&self, record: &RecordSet) -> Result<String> {
        // Route 53 only deletes a set that matches the zone's copy exactly,
        // alias and routing fields included.
        let Some(existing) = self.find_record_set(&record.name).await? else {
            return Err(DnsError::InvalidChangeBatch(format!(
                "no A record for {} to delete",
                record.name
            )));
        };
        self.submit(ChangeAction::Delete, existing, format!("Remove workspace DNS for {}", record.name))
            .await
    }
}
