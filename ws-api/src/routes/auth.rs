use crate::{
    auth::AuthenticatedUser,
    error::{ApiError, ApiResult},
    state::AppState,
};
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use ws_core::{Action, Resource};
use ws_directory::{AuthOutcome, AuthenticatedIdentity, DirectoryHealth, DirectoryState};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub fn public_routes() -> Router<AppState> {
    Router::new().route("/api/v1/auth/login", post(login))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/directory/health", get(directory_health))
        .route("/api/v1/auth/directory/refresh", post(refresh_directory))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthenticatedIdentity>> {
    match state.authenticator.authenticate(&req.username, &req.password).await {
        AuthOutcome::Authenticated(principal) => Ok(Json(AuthenticatedIdentity::from_principal(
            principal,
            state.permissions,
        ))),
        AuthOutcome::Rejected => Err(ApiError::Unauthorized("Invalid credentials".to_string())),
        AuthOutcome::Disabled { reason } => Err(ApiError::ServiceUnavailable(format!(
            "Directory authentication disabled: {}",
            reason
        ))),
        AuthOutcome::Unavailable(e) => Err(ApiError::BadGateway(e.to_string())),
    }
}

async fn directory_health(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<DirectoryHealth>> {
    user.require(state.permissions, Resource::Monitoring, Action::Read)?;

    Ok(Json(state.authenticator.health_check().await))
}

/// Re-read the directory settings from the parameter store.
///
/// Gated like the health check on monitoring read: the refresh only reloads
/// values operators already control elsewhere and changes no directory data.
/// Only IT-Admins hold that grant in the standard matrix.
async fn refresh_directory(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Value>> {
    user.require(state.permissions, Resource::Monitoring, Action::Read)?;

    let body = match state.authenticator.settings().refresh().await {
        DirectoryState::Enabled(config) => json!({
            "enabled": true,
            "url": config.url,
            "domain": config.domain,
        }),
        DirectoryState::Disabled { reason } => json!({
            "enabled": false,
            "reason": reason,
        }),
    };
    info!(
        user = %user.username,
        enabled = body["enabled"].as_bool().unwrap_or(false),
        "Directory settings refreshed"
    );

    Ok(Json(body))
}
