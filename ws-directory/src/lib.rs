//! Directory service integration.
//!
//! Authenticates employees against the corporate directory, resolves their
//! group memberships and exposes the directory settings that are loaded from
//! the remote parameter store. A directory that cannot be configured reports
//! itself as disabled instead of failing, so callers can fall back to another
//! login path.

pub mod authenticator;
pub mod client;
pub mod config;
pub mod dn;
pub mod error;
pub mod ldap;
pub mod policy;
pub mod ssm;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

pub use authenticator::{
    AuthOutcome, AuthenticatedIdentity, DirectoryAuthenticator, DirectoryHealth, DirectoryPrincipal,
    GroupLookup, HealthStatus,
};
pub use client::{DirectoryConnection, DirectoryConnector, DirectoryEntry};
pub use config::{
    DirectoryConfig, DirectorySettings, DirectoryState, ParameterSource, ServiceAccount,
    StaticParameters,
};
pub use dn::{DistinguishedName, DnError};
pub use error::{DirectoryError, Result};
pub use ldap::LdapConnector;
pub use policy::{with_timeout, RetryPolicy};
pub use ssm::SsmParameterSource;
