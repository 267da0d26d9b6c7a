use crate::{AppState, handlers, upload::MAX_MODPACK_BYTES};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch},
};

/// Multipart framing on top of the largest accepted file.
const UPLOAD_BODY_LIMIT: usize = MAX_MODPACK_BYTES + 1024 * 1024;

/// Admin Router Module
///
/// Moderation endpoints, nested under `/api/admin`. Each handler takes the `AdminUser`
/// extractor, which rejects with 401 unless the caller's live record is an admin. This
/// check does not rely on the page-level route guard.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/admin/stats
        .route("/stats", get(handlers::get_admin_stats))
        // GET /api/admin/users
        .route("/users", get(handlers::list_users))
        // PATCH /api/admin/users/{id}/admin
        // Flips the target user's admin flag.
        .route("/users/{id}/admin", patch(handlers::toggle_admin))
        // GET /api/admin/applications?status=PENDING
        .route("/applications", get(handlers::list_applications))
        // PATCH /api/admin/applications/{id}
        // PENDING -> APPROVED | REJECTED; reviewed applications are final.
        .route("/applications/{id}", patch(handlers::review_application))
        // GET/POST /api/admin/uploads
        // Listing reuses the public handler; creation takes a multipart form.
        .route(
            "/uploads",
            get(handlers::list_uploads)
                .post(handlers::create_upload)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        // DELETE /api/admin/uploads/{id}
        .route("/uploads/{id}", delete(handlers::delete_upload))
}
