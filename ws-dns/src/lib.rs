//! Workspace DNS records.
//!
//! Every workspace gets an `A` record named after its owner
//! (`first.last.<domain>`) pointing at all healthy cluster nodes. Records are
//! replaced wholesale on every write and removal is idempotent.

pub mod error;
pub mod provider;
pub mod route53;
pub mod sync;

#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;

pub use error::{DnsError, Result};
pub use provider::{DnsProvider, NodeAddressSource, RecordSet};
pub use route53::Route53Provider;
pub use sync::{DnsLookup, DnsRegistration, DnsRemoval, DnsSettings, DnsSynchronizer, DEFAULT_TTL};
