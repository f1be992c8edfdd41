use crate::{auth::AuthenticatedUser, error::ApiResult, state::AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use ws_core::{Action, Resource};
use ws_orchestrator::{Workspace, WorkspaceStatusReport};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/workspaces", get(list_workspaces))
        .route("/api/v1/workspaces/employee/{employee_id}", get(get_workspace))
        .route(
            "/api/v1/workspaces/employee/{employee_id}/status",
            get(workspace_status),
        )
        .route(
            "/api/v1/workspaces/provision/{employee_id}",
            post(provision_workspace),
        )
        .route("/api/v1/workspaces/{employee_id}", delete(deprovision_workspace))
}

async fn list_workspaces(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<Workspace>>> {
    user.require(state.permissions, Resource::Workspaces, Action::Read)?;

    Ok(Json(state.orchestrator.list().await?))
}

async fn get_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(employee_id): Path<String>,
) -> ApiResult<Json<Workspace>> {
    user.require(state.permissions, Resource::Workspaces, Action::Read)?;

    Ok(Json(state.orchestrator.workspace_for(&employee_id).await?))
}

async fn workspace_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(employee_id): Path<String>,
) -> ApiResult<Json<WorkspaceStatusReport>> {
    user.require(state.permissions, Resource::Workspaces, Action::Read)?;

    Ok(Json(state.orchestrator.status(&employee_id).await?))
}

async fn provision_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(employee_id): Path<String>,
) -> ApiResult<(StatusCode, Json<Workspace>)> {
    user.require(state.permissions, Resource::Workspaces, Action::Create)?;

    let workspace = state.orchestrator.provision(&employee_id).await?;

    Ok((StatusCode::CREATED, Json(workspace)))
}

async fn deprovision_workspace(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(employee_id): Path<String>,
) -> ApiResult<Json<Value>> {
    user.require(state.permissions, Resource::Workspaces, Action::Delete)?;

    let body = match state.orchestrator.deprovision(&employee_id).await? {
        Some(workspace) => json!({ "message": "Workspace deprovisioned", "workspace": workspace }),
        None => json!({ "message": "No workspace to deprovision" }),
    };

    Ok(Json(body))
}
