//! Workspace orchestration.
//!
//! Provisioning creates five cluster resources in dependency order, registers
//! the workspace hostname in DNS and persists the workspace record. Any
//! failure along the way deletes what was created so far, newest first.
//! Deprovisioning reverses the sequence and tolerates resources that are
//! already gone.

pub mod cluster;
pub mod error;
pub mod orchestrator;
pub mod password;
pub mod provisioner;
pub mod deprovisioner;
pub mod store;
pub mod workspace;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cluster::{
    ClusterClient, ClusterError, ClusterNodes, ClusterSettings, KubeCluster, ResourceKind, WorkloadPhase,
    WorkloadState, WorkspaceSpec,
};
pub use deprovisioner::Deprovisioner;
pub use error::{OrchestratorError, Result};
pub use orchestrator::{WorkspaceOrchestrator, WorkspaceStatusReport};
pub use provisioner::{CleanupFailure, CleanupReport, ProvisionSettings, Provisioner};
pub use store::{EmployeeStore, SqliteStore, WorkspaceStore};
pub use workspace::{Workspace, WorkspaceStatus};
