use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::cluster::{ClusterClient, ResourceKind};
use crate::error::{OrchestratorError, Result};
use crate::provisioner::delete_resources;
use crate::store::WorkspaceStore;
use crate::workspace::{Workspace, WorkspaceStatus};

#[derive(Clone)]
pub struct Deprovisioner {
    cluster: Arc<dyn ClusterClient>,
    store: Arc<dyn WorkspaceStore>,
}

impl Deprovisioner {
    pub fn new(cluster: Arc<dyn ClusterClient>, store: Arc<dyn WorkspaceStore>) -> Self {
        Self { cluster, store }
    }

    /// Tear down the employee's workspace.
    ///
    /// Returns the removed record marked `terminated`, or `None` when the employee had no
    /// workspace. All five deletions are attempted; if any of them fails the
    /// record is kept in `error` so the call can be repeated.
    #[instrument(skip(self))]
    pub async fn deprovision(&self, employee_id: &str) -> Result<Option<Workspace>> {
        let Some(mut workspace) = self.store.get_workspace_by_employee(employee_id).await? else {
            info!("No workspace to deprovision");
            return Ok(None);
        };

        let report = delete_resources(
            self.cluster.as_ref(),
            &workspace.name,
            ResourceKind::ORDER.iter().rev().copied(),
        )
        .await;

        if !report.is_clean() {
            if let Ok(next) = workspace.status.transition(WorkspaceStatus::Error) {
                self.store.update_status(&workspace.workspace_id, next).await?;
            }
            warn!(
                workspace = %workspace.name,
                failed = report.failures.len(),
                "Workspace deprovisioning incomplete, record kept"
            );
            return Err(OrchestratorError::CleanupIncomplete {
                workspace: workspace.name,
                failures: report.failure_messages(),
            });
        }

        workspace.status = workspace.status.transition(WorkspaceStatus::Terminated)?;
        self.store.delete_workspace(&workspace.workspace_id).await?;
        info!(workspace = %workspace.name, workspace_id = %workspace.workspace_id, "Workspace deprovisioned");
        Ok(Some(workspace))
    }
}
