use hub_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{S3StorageClient, StorageService, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Human-readable logs while developing, one JSON object per line in production.
fn init_tracing(env: &Env) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hub_portal=debug,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match env {
        Env::Local => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
        Env::Production => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

async fn connect_store(config: &AppConfig) -> RepositoryState {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: could not reach Postgres at DATABASE_URL");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: schema migrations failed");

    Arc::new(PostgresRepository::new(pool))
}

async fn connect_storage(config: &AppConfig) -> StorageState {
    let client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    )
    .await;

    // MinIO starts empty; production buckets are provisioned ahead of time.
    if config.env == Env::Local {
        client.ensure_bucket_exists().await;
    }

    Arc::new(client)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let config = AppConfig::load().expect("FATAL: invalid configuration");
    init_tracing(&config.env);

    tracing::info!(env = ?config.env, "hub portal starting");

    let repo = connect_store(&config).await;
    let storage = connect_storage(&config).await;

    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState::new(repo, storage, config));

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: failed to bind listener");

    tracing::info!(%bind_addr, "listening; API docs at /swagger-ui");

    axum::serve(listener, app).await.expect("FATAL: server error");
}
