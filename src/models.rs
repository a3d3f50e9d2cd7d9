use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};

use crate::error::AppError;

// --- Closed Enumerations ---

/// Role
///
/// The closed set of actor roles. Stored in the `users.user_type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    Regular,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Regular => "regular",
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "admin" => Ok(Role::Admin),
            "regular" => Ok(Role::Regular),
            _ => Err(AppError::Validation(
                "user_type must be either admin or regular".to_string(),
            )),
        }
    }
}

/// RecordStatus
///
/// Review state of a record. Every record starts as `Pending`; only an admin moves it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RecordStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RecordStatus {
    pub const ALL: [RecordStatus; 3] = [
        RecordStatus::Pending,
        RecordStatus::Approved,
        RecordStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Approved => "approved",
            RecordStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(RecordStatus::Pending),
            "approved" => Ok(RecordStatus::Approved),
            "rejected" => Ok(RecordStatus::Rejected),
            _ => Err(AppError::Validation(
                "status must be pending, approved, or rejected".to_string(),
            )),
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// EntityKind
///
/// The three record kinds. They differ in their entity fields but share one
/// status/ownership workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum EntityKind {
    Martyr,
    Injured,
    Prisoner,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Martyr, EntityKind::Injured, EntityKind::Prisoner];

    /// Resolves the collection segment used in URLs (`/martyrs`, `/injured`, `/prisoners`).
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "martyrs" => Some(EntityKind::Martyr),
            "injured" => Some(EntityKind::Injured),
            "prisoners" => Some(EntityKind::Prisoner),
            _ => None,
        }
    }

    pub fn segment(&self) -> &'static str {
        match self {
            EntityKind::Martyr => "martyrs",
            EntityKind::Injured => "injured",
            EntityKind::Prisoner => "prisoners",
        }
    }

    /// Backing table. Static, so it is safe to splice into SQL text.
    pub fn table(&self) -> &'static str {
        self.segment()
    }

    /// Human-readable name used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Martyr => "Martyr",
            EntityKind::Injured => "Injured person",
            EntityKind::Prisoner => "Prisoner",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

// --- Users ---

/// User
///
/// Canonical user row from the `users` table. Carries the password hash, so it is
/// never serialized; responses use [`UserResponse`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let user_type: String = row.try_get("user_type")?;
        let role = user_type.parse::<Role>().map_err(|e| sqlx::Error::ColumnDecode {
            index: "user_type".to_string(),
            source: Box::new(e),
        })?;

        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password")?,
            full_name: row.try_get("full_name")?,
            role,
            phone_number: row.try_get("phone_number")?,
            created_at: row.try_get("created_at")?,
            last_login: row.try_get("last_login")?,
        })
    }
}

/// NewUser
///
/// Insert payload for the repository. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub full_name: String,
    pub role: Role,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// UserResponse
///
/// Public representation of a user (GET /auth/me, GET /admin/users).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, PartialEq)]
#[ts(export)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub user_type: Role,
    pub phone_number: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub last_login: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            full_name: user.full_name,
            user_type: user.role,
            phone_number: user.phone_number,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

/// RegisterUserRequest
///
/// Input payload for POST /auth/register. `user_type` is kept as a string so an
/// unknown role surfaces as a validation error rather than a decoding failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    #[schema(example = "regular")]
    pub user_type: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// LoginResponse
///
/// Bearer token plus the authenticated user's profile.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

// --- Record Entity Fields ---

/// MartyrFields
///
/// Biographical and incident fields specific to a martyr record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, TS, ToSchema)]
#[ts(export)]
pub struct MartyrFields {
    pub full_name: String,
    #[serde(default)]
    pub nickname: Option<String>,
    pub tribe: String,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub birth_date: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub death_date: DateTime<Utc>,
    pub death_place: String,
    pub cause_of_death: String,
    #[serde(default)]
    pub rank_or_position: Option<String>,
    #[serde(default)]
    pub participation_fronts: Option<String>,
    #[serde(default)]
    pub family_status: Option<String>,
    #[serde(default)]
    pub num_children: Option<i32>,
    pub contact_family: String,
}

/// InjuredFields
///
/// Incident fields specific to an injured-person record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, TS, ToSchema)]
#[ts(export)]
pub struct InjuredFields {
    pub full_name: String,
    pub tribe: String,
    #[ts(type = "string")]
    pub injury_date: DateTime<Utc>,
    pub injury_place: String,
    pub injury_type: String,
    pub injury_description: String,
    pub injury_degree: String,
    pub current_status: String,
    #[serde(default)]
    pub hospital_name: Option<String>,
    pub contact_family: String,
}

/// PrisonerFields
///
/// Capture and detention fields specific to a prisoner record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, TS, ToSchema)]
#[ts(export)]
pub struct PrisonerFields {
    pub full_name: String,
    pub tribe: String,
    #[ts(type = "string")]
    pub capture_date: DateTime<Utc>,
    pub capture_place: String,
    pub captured_by: String,
    pub current_status: String,
    #[serde(default)]
    #[ts(type = "string | null")]
    pub release_date: Option<DateTime<Utc>>,
    pub family_contact: String,
    #[serde(default)]
    pub detention_place: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// RecordFields
///
/// The entity-specific part of a record. Serialized without a tag so that a record
/// renders as one flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(untagged)]
pub enum RecordFields {
    Martyr(MartyrFields),
    Injured(InjuredFields),
    Prisoner(PrisonerFields),
}

impl RecordFields {
    pub fn kind(&self) -> EntityKind {
        match self {
            RecordFields::Martyr(_) => EntityKind::Martyr,
            RecordFields::Injured(_) => EntityKind::Injured,
            RecordFields::Prisoner(_) => EntityKind::Prisoner,
        }
    }

    pub fn full_name(&self) -> &str {
        match self {
            RecordFields::Martyr(f) => &f.full_name,
            RecordFields::Injured(f) => &f.full_name,
            RecordFields::Prisoner(f) => &f.full_name,
        }
    }

    fn from_row(kind: EntityKind, row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(match kind {
            EntityKind::Martyr => RecordFields::Martyr(MartyrFields::from_row(row)?),
            EntityKind::Injured => RecordFields::Injured(InjuredFields::from_row(row)?),
            EntityKind::Prisoner => RecordFields::Prisoner(PrisonerFields::from_row(row)?),
        })
    }
}

// --- Records ---

/// RecordDraft
///
/// A validated creation request: entity fields plus attachment references. It carries
/// no status, owner or timestamps; those are assigned by the workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub fields: RecordFields,
    pub photo_path: Option<String>,
    pub cv_file_path: Option<String>,
}

/// NewRecord
///
/// Insert payload handed to the repository by the creation workflow.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub draft: RecordDraft,
    pub status: RecordStatus,
    pub added_by_user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Record
///
/// The stored representation of a martyr, injured-person or prisoner record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Record {
    pub id: i64,
    #[serde(flatten)]
    pub fields: RecordFields,
    pub photo_path: Option<String>,
    pub cv_file_path: Option<String>,
    pub status: RecordStatus,
    pub admin_notes: Option<String>,
    pub added_by_user_id: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        self.fields.kind()
    }

    /// Decodes a full row of the table belonging to `kind`.
    pub fn from_row(kind: EntityKind, row: &PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<RecordStatus>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "status".to_string(),
                source: Box::new(e),
            })?;

        Ok(Record {
            id: row.try_get("id")?,
            fields: RecordFields::from_row(kind, row)?,
            photo_path: row.try_get("photo_path")?,
            cv_file_path: row.try_get("cv_file_path")?,
            status,
            admin_notes: row.try_get("admin_notes")?,
            added_by_user_id: row.try_get("added_by_user_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// StatusUpdateRequest
///
/// Input payload for PUT /{kind}/{id}/status. `status` is parsed by the workflow so
/// that unknown values become validation errors.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StatusUpdateRequest {
    #[schema(example = "approved")]
    pub status: String,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

/// StatusChange
///
/// A single validated transition as written by the repository.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: RecordStatus,
    /// `None` keeps the existing notes.
    pub admin_notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// --- Query Shapes ---

/// RecordFilter
///
/// The effective predicate produced by the access policy for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordFilter {
    /// Restricts to records created by this user. `None` means no ownership restriction.
    pub owner: Option<i64>,
    pub status: Option<RecordStatus>,
}

impl RecordFilter {
    pub fn matches(&self, record: &Record) -> bool {
        self.owner.is_none_or(|owner| record.added_by_user_id == owner)
            && self.status.is_none_or(|status| record.status == status)
    }
}

/// Page
///
/// Offset/limit window, already validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

/// ListRecordsQuery
///
/// Query parameters accepted by GET /{kind}.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListRecordsQuery {
    /// Number of matching records to skip (default 0).
    pub skip: Option<i64>,
    /// Maximum number of records to return (default 100, at most 1000).
    pub limit: Option<i64>,
    /// Optional status filter: pending, approved or rejected.
    pub status: Option<String>,
}

/// ListUsersQuery
///
/// Query parameters accepted by GET /admin/users.
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

// --- Dashboard & Utility Schemas (Output) ---

/// StatusCounts
///
/// Number of records of one kind in each review state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StatusCounts {
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.approved + self.rejected
    }

    pub fn add(&mut self, status: RecordStatus, count: i64) {
        match status {
            RecordStatus::Pending => self.pending += count,
            RecordStatus::Approved => self.approved += count,
            RecordStatus::Rejected => self.rejected += count,
        }
    }
}

/// KindStatistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct KindStatistics {
    pub kind: EntityKind,
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub total: i64,
}

/// StatsResponse
///
/// Output schema for the administrative statistics dashboard (GET /admin/stats).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct StatsResponse {
    pub total_martyrs: i64,
    pub total_injured: i64,
    pub total_prisoners: i64,
    pub pending_martyrs: i64,
    pub pending_injured: i64,
    pub pending_prisoners: i64,
    pub total_users: i64,
    /// Per-kind breakdown by status.
    pub by_kind: Vec<KindStatistics>,
}

/// FileUploadResponse
///
/// Returned by the upload endpoints. `file_path` is the value to store in
/// `photo_path` / `cv_file_path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct FileUploadResponse {
    pub file_path: String,
    pub filename: String,
    #[ts(type = "string")]
    pub upload_time: DateTime<Utc>,
}

/// ErrorResponse
///
/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    pub detail: String,
    pub error_code: Option<String>,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
}

/// HealthResponse
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct HealthResponse {
    pub status: String,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
    pub version: String,
}
