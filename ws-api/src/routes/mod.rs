pub mod auth;
pub mod dns;
pub mod health;
pub mod workspaces;

use crate::{auth::auth_middleware, state::AppState};
use axum::{middleware, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn create_app(state: AppState) -> Router {
    // The portal frontend is served from a different origin
    let cors = CorsLayer::permissive();

    Router::new()
        .merge(health::routes()) // Health and login don't need proxy identity
        .merge(auth::public_routes())
        .merge(
            auth::routes()
                .merge(workspaces::routes())
                .merge(dns::routes())
                .layer(middleware::from_fn(auth_middleware)),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
