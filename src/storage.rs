use async_trait::async_trait;
use aws_sdk_s3 as s3;
use chrono::{DateTime, Utc};
use s3::primitives::ByteStream;
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::FileUploadResponse,
};

// 1. Upload Kinds & Allow-Lists

/// UploadKind
///
/// The two attachment categories. Each has its own storage namespace and its own
/// content-type allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Photo,
    Document,
}

const PHOTO_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
];

const DOCUMENT_TYPES: &[(&str, &str)] = &[
    ("application/pdf", "pdf"),
    ("application/msword", "doc"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
];

impl UploadKind {
    /// First path segment of every object stored for this kind.
    pub fn namespace(&self) -> &'static str {
        match self {
            UploadKind::Photo => "photos",
            UploadKind::Document => "documents",
        }
    }

    fn allowed(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            UploadKind::Photo => PHOTO_TYPES,
            UploadKind::Document => DOCUMENT_TYPES,
        }
    }

    /// The file extension used for an accepted content type, or `None` if the type is
    /// not on this kind's allow-list.
    pub fn extension_for(&self, content_type: &str) -> Option<&'static str> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        self.allowed()
            .iter()
            .find(|(mime, _)| *mime == essence)
            .map(|(_, ext)| *ext)
    }

    fn rejection(&self) -> &'static str {
        match self {
            UploadKind::Photo => "File must be a JPEG, PNG or GIF image",
            UploadKind::Document => "File must be a PDF or Word document",
        }
    }
}

/// Content type served for a stored path, derived from its extension.
pub fn content_type_for_path(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    PHOTO_TYPES
        .iter()
        .chain(DOCUMENT_TYPES)
        .find(|(_, known)| *known == ext)
        .map(|(mime, _)| *mime)
        .unwrap_or("application/octet-stream")
}

/// store_upload
///
/// Validates an uploaded blob against the allow-list and size limit, derives its
/// namespaced object key and hands it to the storage backend.
pub async fn store_upload(
    storage: &dyn StorageService,
    kind: UploadKind,
    content_type: &str,
    data: Vec<u8>,
    max_bytes: usize,
    user_id: i64,
    now: DateTime<Utc>,
) -> AppResult<FileUploadResponse> {
    let ext = kind
        .extension_for(content_type)
        .ok_or_else(|| AppError::Validation(kind.rejection().to_string()))?;

    if data.is_empty() {
        return Err(AppError::Validation("File is empty".to_string()));
    }
    if data.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "File exceeds the maximum size of {max_bytes} bytes"
        )));
    }

    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    let filename = format!("{}_{}_{}.{}", now.format("%Y%m%d_%H%M%S"), user_id, suffix, ext);
    let key = format!("{}/{}", kind.namespace(), filename);

    storage.put(&key, content_type, data).await?;

    Ok(FileUploadResponse {
        file_path: key,
        filename,
        upload_time: now,
    })
}

/// The uploading user encoded in a key issued by [`store_upload`]
/// (`<namespace>/<date>_<time>_<user id>_<suffix>.<ext>`).
pub fn uploader_of(key: &str) -> Option<i64> {
    let filename = key.rsplit('/').next()?;
    filename.split('_').nth(2)?.parse().ok()
}

// 2. StorageService Contract

/// StorageService
///
/// Abstract contract for the file storage collaborator. Lets the handlers work
/// against local disk, an S3-compatible bucket or the in-memory mock unchanged.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Prepares the backend (directories, bucket). Safe to call on every startup.
    async fn ensure_ready(&self) -> AppResult<()>;

    /// Persists `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, content_type: &str, data: Vec<u8>) -> AppResult<()>;

    /// Reads the object stored under `key`. `Ok(None)` if it does not exist.
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

/// sanitize_key
///
/// Removes directory navigation components (`..`, `.`) and empty segments from a
/// caller-provided key to prevent path traversal.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

// 3. Local Disk Implementation

/// LocalStorage
///
/// Stores objects as files below a root directory (`<root>/photos/...`,
/// `<root>/documents/...`).
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Option<PathBuf> {
        let clean = sanitize_key(key);
        // Keys that needed cleaning were never issued by `store_upload`.
        if clean.is_empty() || clean != key {
            return None;
        }
        Some(self.root.join(clean))
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    async fn ensure_ready(&self) -> AppResult<()> {
        for kind in [UploadKind::Photo, UploadKind::Document] {
            tokio::fs::create_dir_all(self.root.join(kind.namespace()))
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
        }
        Ok(())
    }

    async fn put(&self, key: &str, _content_type: &str, data: Vec<u8>) -> AppResult<()> {
        let path = self
            .resolve(key)
            .ok_or_else(|| AppError::Validation("Invalid storage key".to_string()))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(e.to_string()))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::Storage(e.to_string()))
    }

    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let Some(path) = self.resolve(key) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(e.to_string())),
        }
    }
}

// 4. S3-Compatible Implementation (AWS / MinIO)

/// S3StorageClient
///
/// Stores objects in an S3-compatible bucket. `force_path_style(true)` is required
/// for MinIO gateways.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    /// Creates the bucket if needed. A bucket we already own is fine; any other
    /// create failure is only accepted if the bucket is reachable with our credentials.
    async fn ensure_ready(&self) -> AppResult<()> {
        let create_err = match self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            Ok(_) => {
                tracing::info!(bucket = %self.bucket_name, "bucket created");
                return Ok(());
            }
            Err(e)
                if e
                    .as_service_error()
                    .is_some_and(|se| se.is_bucket_already_owned_by_you()) =>
            {
                return Ok(());
            }
            Err(e) => e,
        };

        // Create may be denied on a pre-provisioned bucket.
        self.client
            .head_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
            .map(|_| ())
            .map_err(|head_err| {
                AppError::Storage(format!(
                    "bucket '{}' is not usable: create failed ({}), head failed ({})",
                    self.bucket_name,
                    s3::error::DisplayErrorContext(&create_err),
                    s3::error::DisplayErrorContext(&head_err),
                ))
            })
    }

    async fn put(&self, key: &str, content_type: &str, data: Vec<u8>) -> AppResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    return Ok(None);
                }
                return Err(AppError::Storage(e.to_string()));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(Some(data.into_bytes().to_vec()))
    }
}

// 5. The Mock Implementation (For Tests)

/// MockStorageService
///
/// In-memory `StorageService` used by unit and integration tests so upload and
/// download handlers can be exercised without disk or network access.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Keys currently held, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = match self.objects.lock() {
            Ok(objects) => objects.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        keys.sort();
        keys
    }

    fn fail_if_requested(&self) -> AppResult<()> {
        if self.should_fail {
            return Err(AppError::Storage(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_ready(&self) -> AppResult<()> {
        self.fail_if_requested()
    }

    async fn put(&self, key: &str, _content_type: &str, data: Vec<u8>) -> AppResult<()> {
        self.fail_if_requested()?;
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| AppError::Storage("mock storage lock poisoned".to_string()))?;
        objects.insert(sanitize_key(key), data);
        Ok(())
    }

    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        self.fail_if_requested()?;
        let objects = self
            .objects
            .lock()
            .map_err(|_| AppError::Storage("mock storage lock poisoned".to_string()))?;
        Ok(objects.get(&sanitize_key(key)).cloned())
    }
}
