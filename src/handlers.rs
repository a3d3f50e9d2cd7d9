use crate::{
    AppState, accounts,
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::{AppJson, AppPath, AppQuery},
    models::{
        EntityKind, FileUploadResponse, HealthResponse, ListRecordsQuery, ListUsersQuery,
        LoginRequest, LoginResponse, Record, RegisterUserRequest, StatsResponse,
        StatusUpdateRequest, UserResponse,
    },
    policy::{self, Capability},
    storage::{self, UploadKind},
    validation, workflow,
};
use axum::{
    Json,
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::{Value, json};

// --- Helpers ---

/// Resolves the `{kind}` path segment. Unknown collections are reported as 404 so the
/// URL space looks the same as for unknown ids.
fn resolve_kind(segment: &str) -> AppResult<EntityKind> {
    EntityKind::from_segment(segment)
        .ok_or_else(|| AppError::NotFound(format!("Unknown record collection '{segment}'")))
}

// --- Public Handlers ---

/// root
///
/// [Public Route] Service banner with pointers to the API documentation.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service information"))
)]
pub async fn root() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/swagger-ui",
        "openapi": "/api-docs/openapi.json",
    }))
}

/// health
///
/// [Public Route] Liveness check.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// register_user
///
/// [Public Route] Creates a new account.
///
/// *Validation*: password of at least 6 characters, `user_type` of `admin` or `regular`,
/// unique username. Registering as `admin` is refused (403) unless the deployment
/// enables admin self-registration.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Admin registration disabled")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterUserRequest>,
) -> AppResult<impl IntoResponse> {
    let user = accounts::register(state.repo.as_ref(), &state.config, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// login
///
/// [Public Route] Exchanges username and password for a bearer token.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let response = accounts::login(state.repo.as_ref(), &state.config, payload).await?;
    Ok(Json(response))
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] Profile of the requesting user.
#[utoipa::path(
    get,
    path = "/auth/me",
    responses((status = 200, description = "Current user", body = UserResponse))
)]
pub async fn get_me(
    actor: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<UserResponse>> {
    Ok(Json(accounts::me(state.repo.as_ref(), &actor).await?))
}

/// create_record
///
/// [Authenticated Route] Submits a new martyr, injured-person or prisoner record.
///
/// *Workflow*: the record always starts as `pending` and is owned by the caller;
/// `status`, `admin_notes` and ownership keys in the body are ignored.
#[utoipa::path(
    post,
    path = "/{kind}",
    params(("kind" = String, Path, description = "martyrs, injured or prisoners")),
    request_body(content = Object, description = "Entity fields of the record kind"),
    responses(
        (status = 201, description = "Record created", body = Record),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Unknown record collection")
    )
)]
pub async fn create_record(
    actor: AuthUser,
    State(state): State<AppState>,
    AppPath(kind): AppPath<String>,
    AppJson(body): AppJson<Value>,
) -> AppResult<impl IntoResponse> {
    let kind = resolve_kind(&kind)?;
    let draft = validation::parse_draft(kind, body)?;
    let record = workflow::create_record(state.repo.as_ref(), &actor, draft).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// list_records
///
/// [Authenticated Route] Lists records of one kind in insertion order.
///
/// *Visibility*: admins see every record; other users only the records they created.
#[utoipa::path(
    get,
    path = "/{kind}",
    params(
        ("kind" = String, Path, description = "martyrs, injured or prisoners"),
        ListRecordsQuery
    ),
    responses(
        (status = 200, description = "Visible records", body = [Record]),
        (status = 400, description = "Invalid paging or status filter")
    )
)]
pub async fn list_records(
    actor: AuthUser,
    State(state): State<AppState>,
    AppPath(kind): AppPath<String>,
    AppQuery(query): AppQuery<ListRecordsQuery>,
) -> AppResult<Json<Vec<Record>>> {
    let kind = resolve_kind(&kind)?;
    let records = workflow::list_records(state.repo.as_ref(), &actor, kind, query).await?;
    Ok(Json(records))
}

/// get_record
///
/// [Authenticated Route] Fetches one record. Non-admins may only read their own.
#[utoipa::path(
    get,
    path = "/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "martyrs, injured or prisoners"),
        ("id" = i64, Path, description = "Record id")
    ),
    responses(
        (status = 200, description = "Record", body = Record),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Not found")
    )
)]
pub async fn get_record(
    actor: AuthUser,
    State(state): State<AppState>,
    AppPath((kind, id)): AppPath<(String, i64)>,
) -> AppResult<Json<Record>> {
    let kind = resolve_kind(&kind)?;
    let record = workflow::get_record(state.repo.as_ref(), &actor, kind, id).await?;
    Ok(Json(record))
}

/// update_record_status
///
/// [Admin Route] Approves, rejects or reopens a record and optionally replaces its
/// admin notes.
#[utoipa::path(
    put,
    path = "/{kind}/{id}/status",
    params(
        ("kind" = String, Path, description = "martyrs, injured or prisoners"),
        ("id" = i64, Path, description = "Record id")
    ),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated", body = Record),
        (status = 400, description = "Unknown status"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Not found")
    )
)]
pub async fn update_record_status(
    actor: AuthUser,
    State(state): State<AppState>,
    AppPath((kind, id)): AppPath<(String, i64)>,
    AppJson(body): AppJson<Value>,
) -> AppResult<Json<Record>> {
    let kind = resolve_kind(&kind)?;
    // Role before body shape: a non-admin gets 403 whatever they sent.
    policy::authorize(&actor, Capability::ReviewRecords)?;
    let payload: StatusUpdateRequest = validation::status_update(body)?;
    let record = workflow::set_status(state.repo.as_ref(), &actor, kind, id, payload).await?;
    Ok(Json(record))
}

/// upload_photo
///
/// [Authenticated Route] Stores a JPEG, PNG or GIF image from the multipart field
/// `file`. The returned `file_path` goes into a record's `photo_path`.
#[utoipa::path(
    post,
    path = "/upload/photo",
    responses(
        (status = 200, description = "Stored", body = FileUploadResponse),
        (status = 400, description = "Missing file, bad type or too large")
    )
)]
pub async fn upload_photo(
    actor: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<FileUploadResponse>> {
    upload(UploadKind::Photo, actor, state, multipart).await
}

/// upload_document
///
/// [Authenticated Route] Stores a PDF or Word document from the multipart field
/// `file`. The returned `file_path` goes into a record's `cv_file_path`.
#[utoipa::path(
    post,
    path = "/upload/document",
    responses(
        (status = 200, description = "Stored", body = FileUploadResponse),
        (status = 400, description = "Missing file, bad type or too large")
    )
)]
pub async fn upload_document(
    actor: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<FileUploadResponse>> {
    upload(UploadKind::Document, actor, state, multipart).await
}

async fn upload(
    kind: UploadKind,
    actor: AuthUser,
    state: AppState,
    mut multipart: Multipart,
) -> AppResult<Json<FileUploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;

        let stored = storage::store_upload(
            state.storage.as_ref(),
            kind,
            &content_type,
            data.to_vec(),
            state.config.max_upload_bytes,
            actor.id,
            Utc::now(),
        )
        .await?;

        tracing::info!(
            user_id = actor.id,
            path = %stored.file_path,
            content_type = %content_type,
            "file uploaded"
        );
        return Ok(Json(stored));
    }

    Err(AppError::Validation("No file provided".to_string()))
}

/// fetch_file
///
/// [Authenticated Route] Streams back a stored attachment with a content type derived
/// from its extension. Non-admins may only fetch files they uploaded.
#[utoipa::path(
    get,
    path = "/files/{path}",
    params(("path" = String, Path, description = "Stored file path, e.g. photos/<name>.png")),
    responses(
        (status = 200, description = "File contents"),
        (status = 403, description = "Uploaded by another user"),
        (status = 404, description = "No such file")
    )
)]
pub async fn fetch_file(
    actor: AuthUser,
    State(state): State<AppState>,
    AppPath(path): AppPath<String>,
) -> AppResult<impl IntoResponse> {
    let not_found = || AppError::NotFound("File not found".to_string());

    let in_namespace = [UploadKind::Photo, UploadKind::Document]
        .iter()
        .any(|kind| path.starts_with(&format!("{}/", kind.namespace())));
    if !in_namespace || storage::sanitize_key(&path) != path {
        return Err(not_found());
    }
    if !policy::can_fetch_file(&actor, storage::uploader_of(&path)) {
        tracing::warn!(actor = actor.id, %path, "file access denied");
        return Err(AppError::Forbidden(
            "Not enough permissions to view this file".to_string(),
        ));
    }

    let data = state.storage.get(&path).await?.ok_or_else(not_found)?;
    Ok((
        [(header::CONTENT_TYPE, storage::content_type_for_path(&path))],
        data,
    ))
}

// --- Admin Handlers ---

/// get_admin_stats
///
/// [Admin Route] Dashboard counters: per-kind status breakdown and user total.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, description = "Statistics", body = StatsResponse),
        (status = 403, description = "Admin only")
    )
)]
pub async fn get_admin_stats(
    actor: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<StatsResponse>> {
    Ok(Json(workflow::statistics(state.repo.as_ref(), &actor).await?))
}

/// list_users
///
/// [Admin Route] Paged list of all accounts, oldest first.
#[utoipa::path(
    get,
    path = "/admin/users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Users", body = [UserResponse]),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_users(
    actor: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListUsersQuery>,
) -> AppResult<Json<Vec<UserResponse>>> {
    Ok(Json(
        accounts::list_users(state.repo.as_ref(), &actor, query).await?,
    ))
}
