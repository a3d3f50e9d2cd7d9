use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
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

// Domain operations. Each takes the actor explicitly and talks to `dyn Repository`.
pub mod accounts;
pub mod policy;
pub mod workflow;

// Supporting components.
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod storage;
pub mod validation;

// Route tables, split by access level.
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{LocalStorage, MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::root, handlers::health, handlers::register_user, handlers::login,
        handlers::get_me, handlers::create_record, handlers::list_records,
        handlers::get_record, handlers::update_record_status, handlers::upload_photo,
        handlers::upload_document, handlers::fetch_file, handlers::get_admin_stats,
        handlers::list_users
    ),
    components(
        schemas(
            models::Role, models::RecordStatus, models::EntityKind, models::UserResponse,
            models::RegisterUserRequest, models::LoginRequest, models::LoginResponse,
            models::MartyrFields, models::InjuredFields, models::PrisonerFields,
            models::RecordFields, models::Record,
            models::StatusUpdateRequest, models::StatusCounts, models::KindStatistics,
            models::StatsResponse, models::FileUploadResponse, models::ErrorResponse,
            models::HealthResponse,
        )
    ),
    tags(
        (name = "martyr-registry", description = "Registry of martyrs, injured persons and prisoners")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single container of shared services, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Record and user persistence.
    pub repo: RepositoryState,
    /// Attachment storage (local disk, S3 or the in-memory mock).
    pub storage: StorageState,
    /// The loaded configuration.
    pub config: AppConfig,
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

/// auth_middleware
///
/// Route layer for everything that requires a session. Extracting `AuthUser` runs
/// token validation and the user lookup; a failure rejects with 401 before the
/// handler is reached.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree, applies scoped and global middleware and registers
/// the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS: any origin, the API is token-authenticated.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let protected = authenticated::authenticated_routes(state.config.max_upload_bytes)
        .nest("/admin", admin::admin_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // 2. Routing tree
    let base_router = Router::new()
        // OpenAPI document and Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Health, root, register and login.
        .merge(public::public_routes())
        // Authenticated and admin routes share the session layer.
        .merge(protected)
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation: a UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing: one span per request carrying the request ID.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Request ID Propagation: echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, URI and the `x-request-id` set above, so
/// every log line of a request can be correlated.
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
