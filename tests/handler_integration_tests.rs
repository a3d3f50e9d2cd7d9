mod common;

use axum::{
    Json,
    body::to_bytes,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use common::{martyr_body, prisoner_body, seed_actor, test_context};
use martyr_registry::{
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    handlers,
    models::{
        EntityKind, ListRecordsQuery, ListUsersQuery, Record, RecordStatus, Role,
    },
    storage::StorageService,
};
use serde_json::json;

// --- Record Handlers ---

#[tokio::test]
async fn test_create_record_returns_201_with_pending_record() {
    let ctx = test_context();
    let alice = seed_actor(ctx.repo.as_ref(), "alice", Role::Regular).await;

    let response = handlers::create_record(
        alice.clone(),
        State(ctx.state.clone()),
        AppPath("martyrs".to_string()),
        AppJson(martyr_body("Khalil Nasser")),
    )
    .await
    .unwrap()
    .into_response();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["full_name"], "Khalil Nasser");
    assert_eq!(json["status"], "pending");
    assert_eq!(json["added_by_user_id"], alice.id);
    assert!(json["updated_at"].is_null());
}

#[tokio::test]
async fn test_unknown_collection_is_not_found() {
    let ctx = test_context();
    let alice = seed_actor(ctx.repo.as_ref(), "alice", Role::Regular).await;

    let result = handlers::create_record(
        alice.clone(),
        State(ctx.state.clone()),
        AppPath("refugees".to_string()),
        AppJson(martyr_body("Khalil Nasser")),
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let result = handlers::list_records(
        alice,
        State(ctx.state.clone()),
        AppPath("refugees".to_string()),
        AppQuery(ListRecordsQuery::default()),
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_create_record_rejects_fields_of_another_kind() {
    let ctx = test_context();
    let alice = seed_actor(ctx.repo.as_ref(), "alice", Role::Regular).await;

    let result = handlers::create_record(
        alice,
        State(ctx.state.clone()),
        AppPath("martyrs".to_string()),
        AppJson(prisoner_body("Omar Saleh")),
    )
    .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_status_handler_applies_review() {
    let ctx = test_context();
    let alice = seed_actor(ctx.repo.as_ref(), "alice", Role::Regular).await;
    let admin = seed_actor(ctx.repo.as_ref(), "root", Role::Admin).await;

    handlers::create_record(
        alice.clone(),
        State(ctx.state.clone()),
        AppPath("prisoners".to_string()),
        AppJson(prisoner_body("Omar Saleh")),
    )
    .await
    .unwrap();

    let Json(updated) = handlers::update_record_status(
        admin,
        State(ctx.state.clone()),
        AppPath(("prisoners".to_string(), 1)),
        AppJson(json!({ "status": "approved", "admin_notes": "confirmed by family" })),
    )
    .await
    .unwrap();
    assert_eq!(updated.status, RecordStatus::Approved);

    let Json(fetched): Json<Record> = handlers::get_record(
        alice,
        State(ctx.state.clone()),
        AppPath(("prisoners".to_string(), 1)),
    )
    .await
    .unwrap();
    assert_eq!(fetched.kind(), EntityKind::Prisoner);
    assert_eq!(fetched.admin_notes.as_deref(), Some("confirmed by family"));
}

#[tokio::test]
async fn test_status_handler_refuses_regular_user() {
    let ctx = test_context();
    let alice = seed_actor(ctx.repo.as_ref(), "alice", Role::Regular).await;

    handlers::create_record(
        alice.clone(),
        State(ctx.state.clone()),
        AppPath("martyrs".to_string()),
        AppJson(martyr_body("Khalil Nasser")),
    )
    .await
    .unwrap();

    let result = handlers::update_record_status(
        alice,
        State(ctx.state.clone()),
        AppPath(("martyrs".to_string(), 1)),
        AppJson(json!({ "status": "approved" })),
    )
    .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert_eq!(
        ctx.repo.raw_record(EntityKind::Martyr, 1).unwrap().status,
        RecordStatus::Pending
    );
}

#[tokio::test]
async fn test_status_handler_checks_role_before_body_shape() {
    let ctx = test_context();
    let alice = seed_actor(ctx.repo.as_ref(), "alice", Role::Regular).await;
    let admin = seed_actor(ctx.repo.as_ref(), "root", Role::Admin).await;

    handlers::create_record(
        alice.clone(),
        State(ctx.state.clone()),
        AppPath("martyrs".to_string()),
        AppJson(martyr_body("Khalil Nasser")),
    )
    .await
    .unwrap();

    let result = handlers::update_record_status(
        alice,
        State(ctx.state.clone()),
        AppPath(("martyrs".to_string(), 1)),
        AppJson(json!({ "admin_notes": "x" })),
    )
    .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    for body in [json!({ "status": 5 }), json!({ "admin_notes": "x" }), json!([])] {
        let result = handlers::update_record_status(
            admin.clone(),
            State(ctx.state.clone()),
            AppPath(("martyrs".to_string(), 1)),
            AppJson(body.clone()),
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation(_))), "{body}");
    }
    assert_eq!(
        ctx.repo.raw_record(EntityKind::Martyr, 1).unwrap().status,
        RecordStatus::Pending
    );
}

// --- Admin Handlers ---

#[tokio::test]
async fn test_admin_handlers_enforce_role() {
    let ctx = test_context();
    let alice = seed_actor(ctx.repo.as_ref(), "alice", Role::Regular).await;
    let admin = seed_actor(ctx.repo.as_ref(), "root", Role::Admin).await;

    assert!(matches!(
        handlers::get_admin_stats(alice.clone(), State(ctx.state.clone())).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        handlers::list_users(
            alice,
            State(ctx.state.clone()),
            AppQuery(ListUsersQuery::default())
        )
        .await,
        Err(AppError::Forbidden(_))
    ));

    let Json(stats) = handlers::get_admin_stats(admin.clone(), State(ctx.state.clone()))
        .await
        .unwrap();
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.by_kind.len(), 3);

    let Json(users) = handlers::list_users(
        admin,
        State(ctx.state.clone()),
        AppQuery(ListUsersQuery::default()),
    )
    .await
    .unwrap();
    let names: Vec<&str> = users.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["alice", "root"]);
}

// --- Files ---

#[tokio::test]
async fn test_fetch_file_serves_stored_bytes_with_content_type() {
    let ctx = test_context();
    let alice = seed_actor(ctx.repo.as_ref(), "alice", Role::Regular).await;
    ctx.storage
        .put("photos/20240301_120000_1_ab12cd34.png", "image/png", vec![137, 80, 78, 71])
        .await
        .unwrap();

    let response = handlers::fetch_file(
        alice,
        State(ctx.state.clone()),
        AppPath("photos/20240301_120000_1_ab12cd34.png".to_string()),
    )
    .await
    .unwrap()
    .into_response();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(body.as_ref(), &[137, 80, 78, 71]);
}

#[tokio::test]
async fn test_fetch_file_outside_namespaces_is_not_found() {
    let ctx = test_context();
    let alice = seed_actor(ctx.repo.as_ref(), "alice", Role::Regular).await;

    for path in [
        "photos/20240301_120000_1_00000000.png",
        "photos/../secrets.txt",
        "etc/passwd",
        "documents//cv.pdf",
    ] {
        let result = handlers::fetch_file(
            alice.clone(),
            State(ctx.state.clone()),
            AppPath(path.to_string()),
        )
        .await;
        assert!(
            matches!(result, Err(AppError::NotFound(_))),
            "expected 404 for {path}"
        );
    }
}

#[tokio::test]
async fn test_fetch_file_of_another_user_is_forbidden() {
    let ctx = test_context();
    let alice = seed_actor(ctx.repo.as_ref(), "alice", Role::Regular).await;
    let bob = seed_actor(ctx.repo.as_ref(), "bob", Role::Regular).await;
    let admin = seed_actor(ctx.repo.as_ref(), "root", Role::Admin).await;
    let path = format!("documents/20240301_120000_{}_ab12cd34.pdf", alice.id);
    ctx.storage
        .put(&path, "application/pdf", b"%PDF-1.7".to_vec())
        .await
        .unwrap();

    let result = handlers::fetch_file(bob, State(ctx.state.clone()), AppPath(path.clone())).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    // Files without an uploader segment are admin-only.
    let result = handlers::fetch_file(
        alice,
        State(ctx.state.clone()),
        AppPath("photos/legacy.png".to_string()),
    )
    .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let response = handlers::fetch_file(admin, State(ctx.state.clone()), AppPath(path))
        .await
        .unwrap()
        .into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
}

// --- Public Handlers ---

#[tokio::test]
async fn test_health_and_root() {
    let Json(health) = handlers::health().await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));

    let Json(root) = handlers::root().await;
    assert_eq!(root["docs"], json!("/swagger-ui"));
}
