use crate::error::ApiError;
use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};
use ws_core::{Action, PermissionMatrix, Resource};

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub username: String,
    pub email: Option<String>,
    pub groups: Vec<String>,
}

impl AuthenticatedUser {
    /// Forbidden unless one of the user's groups grants `action` on `resource`.
    pub fn require(
        &self,
        matrix: &PermissionMatrix,
        resource: Resource,
        action: Action,
    ) -> Result<(), ApiError> {
        if matrix.has_permission(&self.groups, resource, action) {
            return Ok(());
        }
        Err(ApiError::Forbidden(format!(
            "Access denied: {} may not {} {}",
            self.username, action, resource
        )))
    }
}

fn parse_groups(header: &str) -> Vec<String> {
    header
        .split(',')
        .map(str::trim)
        .filter(|group| !group.is_empty())
        .map(str::to_string)
        .collect()
}

/// Auth middleware - extracts the caller from the auth proxy headers
///
/// The proxy in front of ws-api authenticates the session and sets
/// `x-ws-user`, `x-ws-email` and a comma-separated `x-ws-groups`.
pub async fn auth_middleware(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let (username, email, groups) = {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(|s| s.to_string())
        };

        let username = header("x-ws-user")
            .filter(|u| !u.trim().is_empty())
            .ok_or(StatusCode::UNAUTHORIZED)?;
        let email = header("x-ws-email");
        let groups = header("x-ws-groups").as_deref().map(parse_groups).unwrap_or_default();
        (username, email, groups)
    };

    req.extensions_mut().insert(AuthenticatedUser {
        username,
        email,
        groups,
    });

    Ok(next.run(req).await)
}
