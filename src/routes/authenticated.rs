use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Authenticated Router Module
///
/// Record submission, listing and review, plus attachment upload and download.
///
/// Access Control Strategy:
/// The `auth_middleware` route layer rejects requests without a valid session before
/// any handler runs. Handlers then pass the `AuthUser` to the workflow, which applies
/// the ownership predicate to reads and the admin capability check to status changes.
pub fn authenticated_routes(max_upload_bytes: usize) -> Router<AppState> {
    let upload_limit = DefaultBodyLimit::max(max_upload_bytes + MULTIPART_OVERHEAD_BYTES);

    Router::<AppState>::new()
        // GET /auth/me
        // Profile of the requesting user.
        .route("/auth/me", get(handlers::get_me))
        // --- File Attachments ---
        // POST /upload/photo, POST /upload/document
        // Multipart upload (field `file`). The returned `file_path` is what records
        // store in `photo_path` / `cv_file_path`. Size and type are checked again
        // after the body limit.
        .route(
            "/upload/photo",
            post(handlers::upload_photo).layer(upload_limit.clone()),
        )
        .route(
            "/upload/document",
            post(handlers::upload_document).layer(upload_limit),
        )
        // GET /files/{*path}
        // Serves a stored attachment back with a content type derived from its extension.
        .route("/files/{*path}", get(handlers::fetch_file))
        // --- Records (martyrs | injured | prisoners) ---
        // POST /{kind}, GET /{kind}?skip=&limit=&status=
        // Creation always yields a pending record owned by the caller. Listing is
        // scoped to the caller's own records unless the caller is an admin.
        .route(
            "/{kind}",
            post(handlers::create_record).get(handlers::list_records),
        )
        // GET /{kind}/{id}
        // Single record; 403 for a non-admin who does not own it.
        .route("/{kind}/{id}", get(handlers::get_record))
        // PUT /{kind}/{id}/status
        // Review transition (approve / reject / reopen). Admin only.
        .route("/{kind}/{id}/status", put(handlers::update_record_status))
}
