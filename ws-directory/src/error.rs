use std::time::Duration;
use thiserror::Error;

use crate::dn::DnError;

pub type Result<T> = std::result::Result<T, DirectoryError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("Directory configuration error: {0}")]
    Config(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Directory operation failed: {0}")]
    Operation(String),

    #[error("Parameter store error: {0}")]
    Parameter(String),

    #[error("Invalid distinguished name: {0}")]
    InvalidDn(#[from] DnError),
}

impl DirectoryError {
    /// Network-level failures that may succeed on another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DirectoryError::Connect(_) | DirectoryError::Unavailable(_) | DirectoryError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(DirectoryError::Connect("refused".into()).is_transient());
        assert!(DirectoryError::Timeout {
            operation: "bind",
            after: Duration::from_secs(5)
        }
        .is_transient());
        assert!(!DirectoryError::InvalidCredentials.is_transient());
        assert!(!DirectoryError::Parameter("throttled".into()).is_transient());
    }

    #[test]
    fn test_timeout_message() {
        let err = DirectoryError::Timeout {
            operation: "bind",
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "bind timed out after 1500ms");
    }
}
