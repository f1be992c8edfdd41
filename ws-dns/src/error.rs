use thiserror::Error;
use ws_core::CoreError;

pub type Result<T> = std::result::Result<T, DnsError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    #[error("DNS configuration error: {0}")]
    Config(String),

    #[error("DNS provider error: {0}")]
    Provider(String),

    /// The provider refused the change batch, e.g. deleting a record that
    /// is already gone.
    #[error("Invalid change batch: {0}")]
    InvalidChangeBatch(String),

    #[error("Node enumeration failed: {0}")]
    NodeAddresses(String),

    #[error(transparent)]
    Naming(#[from] CoreError),
}
