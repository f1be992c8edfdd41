use thiserror::Error;
use ws_core::CoreError;
use ws_dns::DnsError;

use crate::cluster::ClusterError;
use crate::workspace::WorkspaceStatus;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Workspace not found: {0}")]
    NotFound(String),

    #[error("Employee not found: {0}")]
    EmployeeNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidState {
        from: WorkspaceStatus,
        to: WorkspaceStatus,
    },

    #[error("Employee {0} already has a workspace")]
    AlreadyProvisioned(String),

    #[error("Provisioning already in progress for employee {0}")]
    ProvisionInFlight(String),

    #[error("Cleanup of workspace {workspace} incomplete: {}", .failures.join("; "))]
    CleanupIncomplete {
        workspace: String,
        failures: Vec<String>,
    },

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("DNS error: {0}")]
    Dns(#[from] DnsError),

    #[error(transparent)]
    Naming(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OrchestratorError {
    /// Conflicts the caller can resolve by waiting or deprovisioning first.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            OrchestratorError::AlreadyProvisioned(_) | OrchestratorError::ProvisionInFlight(_)
        )
    }
}
