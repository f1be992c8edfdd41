use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use ws_dns::DnsError;
use ws_orchestrator::OrchestratorError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    /// An upstream dependency (directory, cluster, DNS) failed.
    BadGateway(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Conflict(msg)
            | ApiError::BadGateway(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::Internal(msg) => msg,
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::NotFound(id) => ApiError::NotFound(format!("Workspace not found: {}", id)),
            OrchestratorError::EmployeeNotFound(id) => ApiError::NotFound(format!("Employee not found: {}", id)),
            OrchestratorError::InvalidInput(msg) => ApiError::BadRequest(msg),
            OrchestratorError::Naming(e) => ApiError::BadRequest(e.to_string()),
            e if e.is_conflict() => ApiError::Conflict(e.to_string()),
            e @ OrchestratorError::InvalidState { .. } => ApiError::Conflict(e.to_string()),
            e @ (OrchestratorError::Cluster(_) | OrchestratorError::CleanupIncomplete { .. }) => {
                ApiError::BadGateway(e.to_string())
            }
            OrchestratorError::Dns(e) => e.into(),
            e => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<DnsError> for ApiError {
    fn from(err: DnsError) -> Self {
        match err {
            DnsError::Naming(e) => ApiError::BadRequest(e.to_string()),
            DnsError::Config(msg) => ApiError::ServiceUnavailable(msg),
            e => ApiError::BadGateway(e.to_string()),
        }
    }
}
