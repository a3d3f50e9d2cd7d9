use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Oversight endpoints. The router is mounted behind the authentication layer; the
/// admin role itself is checked by `policy::authorize` inside the called operation,
/// so a regular user receives 403 rather than 401.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/stats
        // Per-kind pending/approved/rejected counts and the total number of users.
        .route("/stats", get(handlers::get_admin_stats))
        // GET /admin/users?skip=&limit=
        // All accounts, oldest first.
        .route("/users", get(handlers::list_users))
}
