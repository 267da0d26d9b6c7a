use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Nothing here mutates existing records.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        .route("/health", get(handlers::health))
        // POST /api/auth/register
        // Creates a non-admin account.
        .route("/api/auth/register", post(handlers::register_user))
        // POST /api/auth/login
        // Verifies credentials and sets the session cookie.
        .route("/api/auth/login", post(handlers::login))
        // POST /api/auth/logout
        .route("/api/auth/logout", post(handlers::logout))
        // GET /api/auth/session
        // Current session or null; polled by the client.
        .route("/api/auth/session", get(handlers::get_session))
        // GET /api/uploads?kind=GALLERY|MODPACK
        // Gallery images and modpack downloads.
        .route("/api/uploads", get(handlers::list_uploads))
}
