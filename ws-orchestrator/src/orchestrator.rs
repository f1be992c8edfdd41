use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{info, instrument};
use ws_core::Employee;
use ws_dns::{DnsLookup, DnsRemoval, DnsSynchronizer};

use crate::cluster::{ClusterClient, WorkloadPhase};
use crate::deprovisioner::Deprovisioner;
use crate::error::{OrchestratorError, Result};
use crate::provisioner::{ProvisionSettings, Provisioner};
use crate::store::{EmployeeStore, WorkspaceStore};
use crate::workspace::{Workspace, WorkspaceStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceStatusReport {
    pub status: WorkspaceStatus,
    pub ready: bool,
    pub url: String,
    pub phase: WorkloadPhase,
}

/// Entry point tying employees, cluster, DNS and the workspace store
/// together.
#[derive(Clone)]
pub struct WorkspaceOrchestrator {
    employees: Arc<dyn EmployeeStore>,
    workspaces: Arc<dyn WorkspaceStore>,
    cluster: Arc<dyn ClusterClient>,
    dns: Arc<DnsSynchronizer>,
    provisioner: Provisioner,
    deprovisioner: Deprovisioner,
}

impl WorkspaceOrchestrator {
    pub fn new(
        employees: Arc<dyn EmployeeStore>,
        workspaces: Arc<dyn WorkspaceStore>,
        cluster: Arc<dyn ClusterClient>,
        dns: Arc<DnsSynchronizer>,
        settings: ProvisionSettings,
    ) -> Self {
        let provisioner = Provisioner::new(cluster.clone(), dns.clone(), workspaces.clone(), settings);
        let deprovisioner = Deprovisioner::new(cluster.clone(), workspaces.clone());
        Self {
            employees,
            workspaces,
            cluster,
            dns,
            provisioner,
            deprovisioner,
        }
    }

    pub async fn employee(&self, employee_id: &str) -> Result<Employee> {
        self.employees
            .get_employee(employee_id)
            .await?
            .ok_or_else(|| OrchestratorError::EmployeeNotFound(employee_id.to_string()))
    }

    pub async fn provision(&self, employee_id: &str) -> Result<Workspace> {
        let employee = self.employee(employee_id).await?;
        self.provisioner.provision(&employee).await
    }

    pub async fn deprovision(&self, employee_id: &str) -> Result<Option<Workspace>> {
        self.deprovisioner.deprovision(employee_id).await
    }

    pub async fn list(&self) -> Result<Vec<Workspace>> {
        self.workspaces.list_workspaces().await
    }

    /// Addresses of the cluster's ready nodes; an error means the cluster
    /// cannot be reached.
    pub async fn ready_nodes(&self) -> Result<Vec<Ipv4Addr>> {
        Ok(self.cluster.list_node_addresses().await?)
    }

    pub async fn workspace_for(&self, employee_id: &str) -> Result<Workspace> {
        self.workspaces
            .get_workspace_by_employee(employee_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(employee_id.to_string()))
    }

    /// Current workload state, promoting the record when the workload
    /// becomes ready or fails.
    #[instrument(skip(self))]
    pub async fn status(&self, employee_id: &str) -> Result<WorkspaceStatusReport> {
        let workspace = self.workspace_for(employee_id).await?;
        let state = self.cluster.workload_state(&workspace.name).await?;

        let observed = match state.phase {
            WorkloadPhase::Running if state.ready => Some(WorkspaceStatus::Active),
            WorkloadPhase::Failed | WorkloadPhase::Missing => Some(WorkspaceStatus::Error),
            _ => None,
        };

        let mut status = workspace.status;
        if let Some(next) = observed.and_then(|next| status.transition(next).ok()) {
            self.workspaces.update_status(&workspace.workspace_id, next).await?;
            info!(workspace = %workspace.name, from = %status, to = %next, "Workspace status changed");
            status = next;
        }

        Ok(WorkspaceStatusReport {
            status,
            ready: state.ready,
            url: workspace.url,
            phase: state.phase,
        })
    }

    pub async fn dns_lookup(&self, employee_id: &str) -> Result<DnsLookup> {
        let employee = self.employee(employee_id).await?;
        Ok(self.dns.lookup(&employee).await?)
    }

    pub async fn dns_remove(&self, employee_id: &str) -> Result<DnsRemoval> {
        let employee = self.employee(employee_id).await?;
        Ok(self.dns.remove(&employee).await?)
    }
}
