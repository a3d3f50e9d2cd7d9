use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no bearer token. Nothing here reads or writes records.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Service name, version and where to find the API documentation.
        .route("/", get(handlers::root))
        // GET /health
        // Monitoring and load balancer health check.
        .route("/health", get(handlers::health))
        // POST /auth/register
        // Account creation. Admin self-registration is gated by configuration.
        .route("/auth/register", post(handlers::register_user))
        // POST /auth/login
        // Exchanges credentials for a bearer token and stamps `last_login`.
        .route("/auth/login", post(handlers::login))
}
