use martyr_registry::{
    AppState, accounts,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
    storage::{LocalStorage, S3StorageClient, StorageState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database and migrations, storage, admin
/// bootstrap, then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "martyr_registry=debug,tower_http=info".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for log aggregation.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres) and schema migrations
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let postgres = PostgresRepository::new(pool);
    postgres
        .migrate()
        .await
        .expect("FATAL: Failed to apply database migrations.");
    let repo = Arc::new(postgres) as RepositoryState;

    // 5. Storage Initialization: S3-compatible bucket when configured, local disk otherwise.
    let storage = match &config.s3 {
        Some(s3) => {
            tracing::info!(bucket = %s3.bucket, endpoint = %s3.endpoint, "Using S3 storage");
            Arc::new(
                S3StorageClient::new(
                    &s3.endpoint,
                    &s3.region,
                    &s3.access_key,
                    &s3.secret_key,
                    &s3.bucket,
                )
                .await,
            ) as StorageState
        }
        None => {
            tracing::info!(root = %config.upload_dir, "Using local disk storage");
            Arc::new(LocalStorage::new(&config.upload_dir)) as StorageState
        }
    };
    storage
        .ensure_ready()
        .await
        .expect("FATAL: Storage backend is not usable.");

    // 6. Default admin bootstrap
    match accounts::ensure_default_admin(repo.as_ref(), &config).await {
        Ok(true) => tracing::info!("Default admin account created"),
        Ok(false) => {}
        Err(e) => tracing::error!(error = %e, "Failed to bootstrap default admin"),
    }

    // 7. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        repo,
        storage,
        config,
    };

    // 8. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Failed to bind {bind_addr}: {e}"));

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{bind_addr}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
