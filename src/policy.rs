//! Access policy: which records and attachments an actor may see, and which
//! operations need the admin role.

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{Record, RecordFilter, RecordStatus, Role},
};

/// Capability
///
/// Operations that are restricted by role rather than by ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Change a record's status and admin notes.
    ReviewRecords,
    ViewStatistics,
    ListUsers,
}

impl Capability {
    fn required_role(&self) -> Role {
        match self {
            Capability::ReviewRecords | Capability::ViewStatistics | Capability::ListUsers => {
                Role::Admin
            }
        }
    }
}

/// The single capability check. Runs before any store access.
pub fn authorize(actor: &AuthUser, capability: Capability) -> AppResult<()> {
    match capability.required_role() {
        Role::Admin if !actor.is_admin() => {
            tracing::warn!(actor = actor.id, ?capability, "capability denied");
            Err(AppError::Forbidden("Admin access required".to_string()))
        }
        _ => Ok(()),
    }
}

/// The effective listing predicate for `actor`: admins see every record of a kind,
/// everyone else only the records they created.
pub fn visibility(actor: &AuthUser, status: Option<RecordStatus>) -> RecordFilter {
    RecordFilter {
        owner: if actor.is_admin() { None } else { Some(actor.id) },
        status,
    }
}

pub fn can_view(actor: &AuthUser, record: &Record) -> bool {
    visibility(actor, None).matches(record)
}

/// Attachments follow the record rule: admins read any file, everyone else only
/// files they uploaded themselves.
pub fn can_fetch_file(actor: &AuthUser, uploader: Option<i64>) -> bool {
    actor.is_admin() || uploader == Some(actor.id)
}
