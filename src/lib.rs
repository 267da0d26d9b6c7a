use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod guard;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod storage;
pub mod upload;

// Routing split by access level (pages, public, authenticated, admin).
pub mod routes;
use routes::{admin, authenticated, pages, public};

use auth::{AuthUser, SessionKeys};
use guard::RouteTable;

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for every JSON endpoint, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login, handlers::logout, handlers::get_session,
        handlers::get_me, handlers::submit_application, handlers::get_my_applications,
        handlers::list_uploads, handlers::get_admin_stats, handlers::list_users,
        handlers::toggle_admin, handlers::list_applications, handlers::review_application,
        handlers::create_upload, handlers::delete_upload
    ),
    components(
        schemas(
            models::UserProfile, models::RegisterRequest, models::LoginRequest,
            models::SessionResponse, models::Application, models::ApplicationStatus,
            models::CreateApplicationRequest, models::ReviewApplicationRequest,
            models::Upload, models::UploadKind, models::UploadForm,
            models::AdminDashboardStats,
        )
    ),
    tags(
        (name = "hub-portal", description = "Portfolio & Minecraft community hub API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Single shared container for every service a request may need. Cloned per request;
/// all members are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// Credential store (users, applications, uploads).
    pub repo: RepositoryState,
    /// Object storage for uploaded files.
    pub storage: StorageState,
    pub config: AppConfig,
    /// Session token signing/verification keys.
    pub sessions: SessionKeys,
    /// Path classification used by the route guard.
    pub routes: Arc<RouteTable>,
}

impl AppState {
    /// Builds the state with keys derived from `config` and the default route table.
    pub fn new(repo: RepositoryState, storage: StorageState, config: AppConfig) -> Self {
        Self {
            sessions: SessionKeys::from_config(&config),
            routes: Arc::new(RouteTable::default()),
            repo,
            storage,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(app_state: &AppState) -> SessionKeys {
        app_state.sessions.clone()
    }
}

/// auth_middleware
///
/// Rejects requests whose session does not resolve to a live user before they reach
/// any authenticated handler. The resolved `AuthUser` rides along in the request
/// extensions, so the handler's own `AuthUser` does not hit the store again.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree, the route guard and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(pages::page_routes())
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest("/api/admin", admin::admin_routes())
        // Edge guard: runs ahead of every handler, pages and API alike.
        .layer(middleware::from_fn_with_state(state.clone(), guard::route_guard))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    MakeRequestUuid,
                ))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// Span for one request, correlated by the `x-request-id` header.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
