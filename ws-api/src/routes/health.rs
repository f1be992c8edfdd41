use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tracing::warn;
use ws_directory::DirectoryState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ws-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Workspace store and cluster must both answer. The directory is reported
/// but does not gate readiness: a disabled directory only blocks logins.
async fn readiness_check(State(state): State<AppState>) -> Json<Value> {
    let db_ok = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Readiness: workspace database unreachable");
            false
        }
    };

    let cluster = match state.orchestrator.ready_nodes().await {
        Ok(nodes) => json!({ "reachable": true, "readyNodes": nodes.len() }),
        Err(e) => {
            warn!(error = %e, "Readiness: cluster unreachable");
            json!({ "reachable": false, "error": e.to_string() })
        }
    };
    let cluster_ok = cluster["reachable"] == true;

    let directory = match state.authenticator.settings().current().await {
        DirectoryState::Enabled(config) => json!({ "status": "enabled", "domain": config.domain }),
        DirectoryState::Disabled { reason } => json!({ "status": "disabled", "reason": reason }),
    };

    Json(json!({
        "status": if db_ok && cluster_ok { "ready" } else { "not_ready" },
        "service": "ws-api",
        "version": env!("CARGO_PKG_VERSION"),
        "database": if db_ok { "connected" } else { "disconnected" },
        "cluster": cluster,
        "directory": directory
    }))
}
