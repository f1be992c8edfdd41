//! Cluster resources that make up a workspace.

mod kubernetes;

pub use kubernetes::{manifests, ClusterSettings, KubeCluster};

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use thiserror::Error;
use ws_core::Employee;
use ws_dns::{DnsError, NodeAddressSource};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("Cluster configuration error: {0}")]
    Config(String),

    #[error("Failed to create {kind} {name}: {message}")]
    Create {
        kind: ResourceKind,
        name: String,
        message: String,
    },

    #[error("Failed to delete {kind} {name}: {message}")]
    Delete {
        kind: ResourceKind,
        name: String,
        message: String,
    },

    #[error("Cluster API error: {0}")]
    Api(String),
}

/// The five resources of a workspace, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    StorageClaim,
    Secret,
    Workload,
    Service,
    Ingress,
}

impl ResourceKind {
    /// Creation order; deletion walks it backwards.
    pub const ORDER: [ResourceKind; 5] = [
        ResourceKind::StorageClaim,
        ResourceKind::Secret,
        ResourceKind::Workload,
        ResourceKind::Service,
        ResourceKind::Ingress,
    ];

    /// Cluster object name for a workspace called `workspace`.
    pub fn resource_name(&self, workspace: &str) -> String {
        match self {
            ResourceKind::StorageClaim => format!("{workspace}-pvc"),
            ResourceKind::Secret => format!("{workspace}-secret"),
            ResourceKind::Workload | ResourceKind::Service | ResourceKind::Ingress => workspace.to_string(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::StorageClaim => "storage claim",
            ResourceKind::Secret => "secret",
            ResourceKind::Workload => "workload",
            ResourceKind::Service => "service",
            ResourceKind::Ingress => "ingress",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to render a workspace's resources.
#[derive(Clone, PartialEq, Eq)]
pub struct WorkspaceSpec {
    pub workspace_id: String,
    pub name: String,
    pub hostname: String,
    pub employee: Employee,
    pub password: String,
}

impl fmt::Debug for WorkspaceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceSpec")
            .field("workspace_id", &self.workspace_id)
            .field("name", &self.name)
            .field("hostname", &self.hostname)
            .field("employee", &self.employee.employee_id)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
    /// The workload does not exist.
    Missing,
}

impl WorkloadPhase {
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => WorkloadPhase::Pending,
            "Running" => WorkloadPhase::Running,
            "Succeeded" => WorkloadPhase::Succeeded,
            "Failed" => WorkloadPhase::Failed,
            _ => WorkloadPhase::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkloadState {
    pub phase: WorkloadPhase,
    pub ready: bool,
}

/// Cluster control plane operations used by provisioning.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn create(&self, kind: ResourceKind, spec: &WorkspaceSpec) -> Result<(), ClusterError>;

    /// Delete a resource by name. An absent resource is not an error.
    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), ClusterError>;

    /// Internal addresses of the nodes that are ready to serve traffic.
    async fn list_node_addresses(&self) -> Result<Vec<Ipv4Addr>, ClusterError>;

    async fn workload_state(&self, name: &str) -> Result<WorkloadState, ClusterError>;
}

/// Exposes cluster nodes as DNS targets.
pub struct ClusterNodes(pub Arc<dyn ClusterClient>);

#[async_trait]
impl NodeAddressSource for ClusterNodes {
    async fn node_addresses(&self) -> ws_dns::Result<Vec<Ipv4Addr>> {
        self.0
            .list_node_addresses()
            .await
            .map_err(|e| DnsError::NodeAddresses(e.to_string()))
    }
}
