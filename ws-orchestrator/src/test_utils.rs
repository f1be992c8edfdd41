use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::{BTreeSet, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, MutexGuard};
use ws_core::Employee;

use crate::cluster::{ClusterClient, ClusterError, ResourceKind, WorkloadPhase, WorkloadState, WorkspaceSpec};

/// Helper to create an in-memory test database with migrations applied
pub async fn create_test_db() -> SqlitePool {
    // A single connection keeps every query on the same in-memory database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub fn employee(employee_id: &str, first_name: &str, last_name: &str) -> Employee {
    Employee {
        employee_id: employee_id.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: format!("{}.{}@innovatech.com", first_name.to_lowercase(), last_name.to_lowercase()),
        department: "Engineering".to_string(),
        role: "developer".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    Create(ResourceKind, String),
    Delete(ResourceKind, String),
}

#[derive(Debug, Default)]
struct State {
    resources: BTreeSet<(ResourceKind, String)>,
    calls: Vec<ClusterCall>,
    failing_creates: HashSet<ResourceKind>,
    failing_deletes: HashSet<ResourceKind>,
    nodes: Option<Result<Vec<Ipv4Addr>, String>>,
    workload: Option<WorkloadState>,
}

/// In-memory cluster with per-kind fault injection.
#[derive(Debug, Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<State>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail_create(&self, kind: ResourceKind) {
        self.state().failing_creates.insert(kind);
    }

    pub fn fail_delete(&self, kind: ResourceKind) {
        self.state().failing_deletes.insert(kind);
    }

    pub fn clear_faults(&self) {
        let mut state = self.state();
        state.failing_creates.clear();
        state.failing_deletes.clear();
    }

    pub fn set_nodes(&self, nodes: Vec<Ipv4Addr>) {
        self.state().nodes = Some(Ok(nodes));
    }

    pub fn fail_node_listing(&self, message: &str) {
        self.state().nodes = Some(Err(message.to_string()));
    }

    pub fn set_workload_state(&self, phase: WorkloadPhase, ready: bool) {
        self.state().workload = Some(WorkloadState { phase, ready });
    }

    /// Resources currently present.
    pub fn resources(&self) -> Vec<(ResourceKind, String)> {
        self.state().resources.iter().cloned().collect()
    }

    pub fn calls(&self) -> Vec<ClusterCall> {
        self.state().calls.clone()
    }

    /// Kinds of every delete call, in order.
    pub fn deletions(&self) -> Vec<ResourceKind> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ClusterCall::Delete(kind, _) => Some(kind),
                ClusterCall::Create(..) => None,
            })
            .collect()
    }

    pub fn creations(&self) -> Vec<ResourceKind> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ClusterCall::Create(kind, _) => Some(kind),
                ClusterCall::Delete(..) => None,
            })
            .collect()
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn create(&self, kind: ResourceKind, spec: &WorkspaceSpec) -> Result<(), ClusterError> {
        let name = kind.resource_name(&spec.name);
        let mut state = self.state();
        state.calls.push(ClusterCall::Create(kind, name.clone()));

        if state.failing_creates.contains(&kind) {
            return Err(ClusterError::Create {
                kind,
                name,
                message: "injected failure".to_string(),
            });
        }
        if !state.resources.insert((kind, name.clone())) {
            return Err(ClusterError::Create {
                kind,
                name,
                message: "already exists".to_string(),
            });
        }
        Ok(())
    }

    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<(), ClusterError> {
        let mut state = self.state();
        state.calls.push(ClusterCall::Delete(kind, name.to_string()));

        if state.failing_deletes.contains(&kind) {
            return Err(ClusterError::Delete {
                kind,
                name: name.to_string(),
                message: "injected failure".to_string(),
            });
        }
        state.resources.remove(&(kind, name.to_string()));
        Ok(())
    }

    async fn list_node_addresses(&self) -> Result<Vec<Ipv4Addr>, ClusterError> {
        match self.state().nodes.clone() {
            Some(Ok(nodes)) => Ok(nodes),
            Some(Err(message)) => Err(ClusterError::Api(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn workload_state(&self, name: &str) -> Result<WorkloadState, ClusterError> {
        let state = self.state();
        if let Some(workload) = state.workload {
            return Ok(workload);
        }
        let phase = if state.resources.contains(&(ResourceKind::Workload, name.to_string())) {
            WorkloadPhase::Pending
        } else {
            WorkloadPhase::Missing
        };
        Ok(WorkloadState { phase, ready: false })
    }
}
