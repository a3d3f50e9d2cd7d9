/// Router Module Index
///
/// Splits the HTTP surface by access level. The authentication requirement is
/// attached per module (as a route layer in `create_router`), so an endpoint cannot
/// become reachable anonymously by being registered in the wrong place.

/// Routes reachable without a session: service info, health and the account gateway.
pub mod public;

/// Routes that require a resolved `AuthUser`. Ownership scoping and the admin-only
/// status transition are enforced by the workflow behind the handlers.
pub mod authenticated;

/// Dashboard routes for administrators, nested under `/admin`.
pub mod admin;
