use std::sync::Arc;
use ws_core::PermissionMatrix;
use ws_directory::DirectoryAuthenticator;
use ws_orchestrator::{SqliteStore, WorkspaceOrchestrator};

#[derive(Clone)]
pub struct AppState {
    pub store: SqliteStore,
    pub orchestrator: WorkspaceOrchestrator,
    pub authenticator: Arc<DirectoryAuthenticator>,
    pub permissions: &'static PermissionMatrix,
}

impl AppState {
    pub fn new(
        store: SqliteStore,
        orchestrator: WorkspaceOrchestrator,
        authenticator: Arc<DirectoryAuthenticator>,
    ) -> Self {
        Self {
            store,
            orchestrator,
            authenticator,
            permissions: PermissionMatrix::standard(),
        }
    }
}
