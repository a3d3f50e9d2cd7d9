#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use martyr_registry::{
    AppState,
    auth::AuthUser,
    config::AppConfig,
    error::{AppError, AppResult},
    models::{
        EntityKind, NewRecord, NewUser, Page, Record, RecordFilter, Role, StatusChange,
        StatusCounts, User,
    },
    password,
    repository::{Repository, RepositoryState},
    storage::{MockStorageService, StorageState},
};
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

// --- IN-MEMORY REPOSITORY ---

// Mirrors the Postgres semantics the workflow relies on: sequential ids per table,
// unique usernames, id-ordered listing and COALESCE on admin notes.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    users: Vec<User>,
    records: HashMap<EntityKind, Vec<Record>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct read that bypasses the access policy, for assertions.
    pub fn raw_record(&self, kind: EntityKind, id: i64) -> Option<Record> {
        let store = self.store.lock().unwrap();
        store
            .records
            .get(&kind)
            .and_then(|rows| rows.iter().find(|r| r.id == id).cloned())
    }
}

fn window<T: Clone>(items: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    items
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect()
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        let store = self.store.lock().unwrap();
        Ok(store.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let store = self.store.lock().unwrap();
        Ok(store.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        let mut store = self.store.lock().unwrap();
        if store.users.iter().any(|u| u.username == user.username) {
            return Err(AppError::Validation("Username already exists".to_string()));
        }
        let created = User {
            id: store.users.len() as i64 + 1,
            username: user.username,
            password_hash: user.password_hash,
            full_name: user.full_name,
            role: user.role,
            phone_number: user.phone_number,
            created_at: user.created_at,
            last_login: None,
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> AppResult<Option<User>> {
        let mut store = self.store.lock().unwrap();
        Ok(store.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.last_login = Some(at);
            u.clone()
        }))
    }

    async fn list_users(&self, page: Page) -> AppResult<Vec<User>> {
        let store = self.store.lock().unwrap();
        Ok(window(store.users.iter().cloned(), page))
    }

    async fn count_users(&self) -> AppResult<i64> {
        Ok(self.store.lock().unwrap().users.len() as i64)
    }

    async fn insert_record(&self, record: NewRecord) -> AppResult<Record> {
        let mut store = self.store.lock().unwrap();
        let kind = record.draft.fields.kind();
        let rows = store.records.entry(kind).or_default();
        let created = Record {
            id: rows.len() as i64 + 1,
            fields: record.draft.fields,
            photo_path: record.draft.photo_path,
            cv_file_path: record.draft.cv_file_path,
            status: record.status,
            admin_notes: None,
            added_by_user_id: record.added_by_user_id,
            created_at: record.created_at,
            updated_at: None,
        };
        rows.push(created.clone());
        Ok(created)
    }

    async fn get_record(&self, kind: EntityKind, id: i64) -> AppResult<Option<Record>> {
        Ok(self.raw_record(kind, id))
    }

    async fn list_records(
        &self,
        kind: EntityKind,
        filter: RecordFilter,
        page: Page,
    ) -> AppResult<Vec<Record>> {
        let store = self.store.lock().unwrap();
        let rows = store.records.get(&kind).map(Vec::as_slice).unwrap_or(&[]);
        Ok(window(
            rows.iter().filter(|r| filter.matches(r)).cloned(),
            page,
        ))
    }

    async fn update_status(
        &self,
        kind: EntityKind,
        id: i64,
        change: StatusChange,
    ) -> AppResult<Option<Record>> {
        let mut store = self.store.lock().unwrap();
        let Some(record) = store
            .records
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
        else {
            return Ok(None);
        };
        record.status = change.status;
        if let Some(notes) = change.admin_notes {
            record.admin_notes = Some(notes);
        }
        record.updated_at = Some(change.updated_at);
        Ok(Some(record.clone()))
    }

    async fn status_counts(&self, kind: EntityKind) -> AppResult<StatusCounts> {
        let store = self.store.lock().unwrap();
        let mut counts = StatusCounts::default();
        for record in store.records.get(&kind).into_iter().flatten() {
            counts.add(record.status, 1);
        }
        Ok(counts)
    }
}

// --- STATE & SEED HELPERS ---

pub struct TestContext {
    pub repo: Arc<InMemoryRepository>,
    pub storage: MockStorageService,
    pub state: AppState,
}

pub fn test_context() -> TestContext {
    test_context_with(AppConfig::default())
}

pub fn test_context_with(config: AppConfig) -> TestContext {
    let repo = Arc::new(InMemoryRepository::new());
    let storage = MockStorageService::new();
    let state = AppState {
        repo: repo.clone() as RepositoryState,
        storage: Arc::new(storage.clone()) as StorageState,
        config,
    };
    TestContext {
        repo,
        storage,
        state,
    }
}

pub async fn seed_user(repo: &dyn Repository, username: &str, plain: &str, role: Role) -> User {
    repo.create_user(NewUser {
        username: username.to_string(),
        password_hash: password::hash_password(plain).unwrap(),
        full_name: format!("{username} full name"),
        role,
        phone_number: None,
        created_at: Utc::now(),
    })
    .await
    .unwrap()
}

pub async fn seed_actor(repo: &dyn Repository, username: &str, role: Role) -> AuthUser {
    AuthUser::from(&seed_user(repo, username, "secret123", role).await)
}

// --- REQUEST BODIES ---

pub fn martyr_body(name: &str) -> Value {
    json!({
        "full_name": name,
        "nickname": "Abu Khalil",
        "tribe": "Nasser",
        "birth_date": "1990-06-01T00:00:00Z",
        "death_date": "2024-03-01T00:00:00Z",
        "death_place": "Khan Younis",
        "cause_of_death": "Airstrike",
        "num_children": 3,
        "contact_family": "+970 59 000 0000"
    })
}

pub fn injured_body(name: &str) -> Value {
    json!({
        "full_name": name,
        "tribe": "Saleh",
        "injury_date": "2024-02-11T00:00:00Z",
        "injury_place": "Rafah",
        "injury_type": "Shrapnel",
        "injury_description": "Shrapnel wounds to the left leg",
        "injury_degree": "moderate",
        "current_status": "Recovering",
        "hospital_name": "Al-Najjar Hospital",
        "contact_family": "+970 59 222 2222"
    })
}

pub fn prisoner_body(name: &str) -> Value {
    json!({
        "full_name": name,
        "tribe": "Haddad",
        "capture_date": "2023-10-10T00:00:00Z",
        "capture_place": "Jenin",
        "captured_by": "Border unit",
        "current_status": "Detained",
        "family_contact": "+970 59 111 1111",
        "detention_place": "Ofer"
    })
}
