use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes for any signed-in user. The router is wrapped in `auth_middleware`, and every
/// handler also takes `AuthUser`, so identity is always resolved from the live record.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/me
        .route("/api/me", get(handlers::get_me))
        // GET/POST /api/applications
        // List own whitelist applications, or submit a new one (one pending at a time).
        .route(
            "/api/applications",
            get(handlers::get_my_applications).post(handlers::submit_application),
        )
}
