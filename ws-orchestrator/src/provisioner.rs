//! Workspace provisioning with compensating cleanup.

use chrono::{SubsecRound, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use ws_core::{naming, Employee};
use ws_dns::DnsSynchronizer;

use crate::cluster::{ClusterClient, ResourceKind, WorkspaceSpec};
use crate::error::{OrchestratorError, Result};
use crate::password::generate_password;
use crate::store::WorkspaceStore;
use crate::workspace::{Workspace, WorkspaceStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionSettings {
    /// DNS target when the cluster's nodes cannot be listed.
    pub fallback_address: Ipv4Addr,
    /// Port published in workspace URLs.
    pub public_port: u16,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            fallback_address: Ipv4Addr::LOCALHOST,
            public_port: 443,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub kind: ResourceKind,
    pub name: String,
    pub error: String,
}

/// What a best-effort cleanup did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Deletions attempted, in the order issued.
    pub attempted: Vec<ResourceKind>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_messages(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|f| format!("{} {}: {}", f.kind, f.name, f.error))
            .collect()
    }
}

/// Delete `kinds` of workspace `name` in the given order, recording and
/// logging every failure without stopping.
pub(crate) async fn delete_resources(
    cluster: &dyn ClusterClient,
    name: &str,
    kinds: impl IntoIterator<Item = ResourceKind>,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    for kind in kinds {
        let resource = kind.resource_name(name);
        report.attempted.push(kind);
        if let Err(e) = cluster.delete(kind, &resource).await {
            warn!(workspace = name, %kind, %resource, error = %e, "Failed to delete cluster resource");
            report.failures.push(CleanupFailure {
                kind,
                name: resource,
                error: e.to_string(),
            });
        }
    }

    report
}

/// Marks an employee as being provisioned for as long as it lives.
struct InFlight {
    set: Arc<Mutex<HashSet<String>>>,
    employee_id: String,
}

impl InFlight {
    fn acquire(set: &Arc<Mutex<HashSet<String>>>, employee_id: &str) -> Option<Self> {
        let mut guard = set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !guard.insert(employee_id.to_string()) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            employee_id: employee_id.to_string(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut guard = self.set.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.remove(&self.employee_id);
    }
}

#[derive(Clone)]
pub struct Provisioner {
    cluster: Arc<dyn ClusterClient>,
    dns: Arc<DnsSynchronizer>,
    store: Arc<dyn WorkspaceStore>,
    settings: ProvisionSettings,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Provisioner {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        dns: Arc<DnsSynchronizer>,
        store: Arc<dyn WorkspaceStore>,
        settings: ProvisionSettings,
    ) -> Self {
        Self {
            cluster,
            dns,
            store,
            settings,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Create the workspace resources, register DNS and persist the record.
    ///
    /// Resources are created strictly in [`ResourceKind::ORDER`]. If any step
    /// fails, everything created so far is deleted in reverse order and the
    /// original error is returned. A record that cannot be stored also takes
    /// its DNS registration with it. Cleanup failures are logged, never
    /// returned.
    #[instrument(skip(self, employee), fields(employee_id = %employee.employee_id))]
    pub async fn provision(&self, employee: &Employee) -> Result<Workspace> {
        let name = naming::workspace_name(employee)?;
        let hostname = self.dns.hostname(employee)?;

        let _in_flight = InFlight::acquire(&self.in_flight, &employee.employee_id)
            .ok_or_else(|| OrchestratorError::ProvisionInFlight(employee.employee_id.clone()))?;

        if self
            .store
            .get_workspace_by_employee(&employee.employee_id)
            .await?
            .is_some()
        {
            return Err(OrchestratorError::AlreadyProvisioned(employee.employee_id.clone()));
        }

        let spec = WorkspaceSpec {
            workspace_id: Uuid::new_v4().to_string(),
            name: name.clone(),
            hostname,
            employee: employee.clone(),
            password: generate_password(),
        };
        info!(workspace = %name, workspace_id = %spec.workspace_id, "Provisioning workspace");

        let mut created = Vec::with_capacity(ResourceKind::ORDER.len());
        for kind in ResourceKind::ORDER {
            if let Err(e) = self.cluster.create(kind, &spec).await {
                error!(workspace = %name, %kind, error = %e, "Workspace resource creation failed");
                self.compensate(&name, &created).await;
                return Err(e.into());
            }
            created.push(kind);
        }

        let registration = match self
            .dns
            .upsert(employee, self.settings.fallback_address, self.settings.public_port)
            .await
        {
            Ok(registration) => registration,
            Err(e) => {
                error!(workspace = %name, error = %e, "Workspace DNS registration failed");
                self.compensate(&name, &created).await;
                return Err(e.into());
            }
        };

        let workspace = Workspace {
            workspace_id: spec.workspace_id,
            employee_id: employee.employee_id.clone(),
            name: name.clone(),
            url: registration.url,
            status: WorkspaceStatus::Provisioning,
            // Stored at second precision.
            created_at: Utc::now().trunc_subsecs(0),
        };

        if let Err(e) = self.store.create_workspace(&workspace).await {
            error!(workspace = %name, error = %e, "Failed to persist workspace record");
            self.compensate(&name, &created).await;
            // A conflicting record means another writer owns the hostname.
            if !matches!(e, OrchestratorError::AlreadyProvisioned(_)) {
                self.unregister(employee, &name).await;
            }
            return Err(e);
        }

        info!(workspace = %name, url = %workspace.url, "Workspace provisioned");
        Ok(workspace)
    }

    /// Delete `created` newest first.
    async fn compensate(&self, name: &str, created: &[ResourceKind]) -> CleanupReport {
        let report = delete_resources(self.cluster.as_ref(), name, created.iter().rev().copied()).await;

        if report.is_clean() {
            info!(workspace = name, deleted = report.attempted.len(), "Compensating cleanup complete");
        } else {
            warn!(
                workspace = name,
                attempted = report.attempted.len(),
                failed = report.failures.len(),
                "Compensating cleanup left resources behind"
            );
        }
        report
    }

    /// Drop the hostname registered for a workspace that was never recorded.
    async fn unregister(&self, employee: &Employee, name: &str) {
        match self.dns.remove(employee).await {
            Ok(removal) => info!(
                workspace = name,
                hostname = %removal.hostname,
                removed = removal.removed,
                "Workspace DNS record rolled back"
            ),
            Err(e) => warn!(workspace = name, error = %e, "Failed to roll back workspace DNS record"),
        }
    }
}
