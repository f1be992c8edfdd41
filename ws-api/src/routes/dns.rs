use crate::{auth::AuthenticatedUser, error::ApiResult, state::AppState};
use axum::{
    extract::{Path, State},
    routing::get,
    Extension, Json, Router,
};
use ws_core::{Action, Resource};
use ws_dns::{DnsLookup, DnsRemoval};

pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/api/v1/dns/{employee_id}",
        get(lookup_record).delete(remove_record),
    )
}

async fn lookup_record(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(employee_id): Path<String>,
) -> ApiResult<Json<DnsLookup>> {
    user.require(state.permissions, Resource::Workspaces, Action::Read)?;

    Ok(Json(state.orchestrator.dns_lookup(&employee_id).await?))
}

async fn remove_record(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(employee_id): Path<String>,
) -> ApiResult<Json<DnsRemoval>> {
    user.require(state.permissions, Resource::Workspaces, Action::Delete)?;

    Ok(Json(state.orchestrator.dns_remove(&employee_id).await?))
}
