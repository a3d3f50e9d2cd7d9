//! Field-level validation for record drafts, account input and pagination.
//!
//! Every failure is reported as [`AppError::Validation`] naming the offending field.

use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::{AppError, AppResult},
    models::{
        EntityKind, InjuredFields, MartyrFields, Page, PrisonerFields, RecordDraft, RecordFields,
        StatusUpdateRequest,
    },
    storage::UploadKind,
};

pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 1000;
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Attachment references accepted alongside the entity fields of any kind.
#[derive(Deserialize)]
struct Attachments {
    #[serde(default)]
    photo_path: Option<String>,
    #[serde(default)]
    cv_file_path: Option<String>,
}

/// Decodes and validates a creation body for `kind`.
///
/// Keys the workflow owns (`status`, `admin_notes`, `added_by_user_id`, timestamps)
/// are ignored if present.
pub fn parse_draft(kind: EntityKind, body: Value) -> AppResult<RecordDraft> {
    if !body.is_object() {
        return Err(AppError::Validation("request body must be a JSON object".into()));
    }

    let attachments: Attachments = serde_json::from_value(body.clone()).map_err(invalid_body)?;
    let fields = match kind {
        EntityKind::Martyr => {
            RecordFields::Martyr(serde_json::from_value::<MartyrFields>(body).map_err(invalid_body)?)
        }
        EntityKind::Injured => RecordFields::Injured(
            serde_json::from_value::<InjuredFields>(body).map_err(invalid_body)?,
        ),
        EntityKind::Prisoner => RecordFields::Prisoner(
            serde_json::from_value::<PrisonerFields>(body).map_err(invalid_body)?,
        ),
    };

    let draft = RecordDraft {
        fields,
        photo_path: normalize_optional(attachments.photo_path),
        cv_file_path: normalize_optional(attachments.cv_file_path),
    };
    validate_draft(&draft)?;
    Ok(draft)
}

/// Decodes a review body. The status value itself is checked by the workflow.
pub fn status_update(body: Value) -> AppResult<StatusUpdateRequest> {
    serde_json::from_value(body).map_err(invalid_body)
}

fn invalid_body(err: serde_json::Error) -> AppError {
    AppError::Validation(format!("invalid request body: {err}"))
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Checks the constraints of a draft that serde cannot express.
pub fn validate_draft(draft: &RecordDraft) -> AppResult<()> {
    match &draft.fields {
        RecordFields::Martyr(f) => validate_martyr(f)?,
        RecordFields::Injured(f) => validate_injured(f)?,
        RecordFields::Prisoner(f) => validate_prisoner(f)?,
    }
    if let Some(path) = &draft.photo_path {
        attachment_path("photo_path", path, UploadKind::Photo)?;
    }
    if let Some(path) = &draft.cv_file_path {
        attachment_path("cv_file_path", path, UploadKind::Document)?;
    }
    Ok(())
}

fn validate_martyr(f: &MartyrFields) -> AppResult<()> {
    required("full_name", &f.full_name, 100)?;
    optional("nickname", f.nickname.as_deref(), 50)?;
    required("tribe", &f.tribe, 100)?;
    required("death_place", &f.death_place, 100)?;
    required("cause_of_death", &f.cause_of_death, 200)?;
    optional("rank_or_position", f.rank_or_position.as_deref(), 100)?;
    optional("family_status", f.family_status.as_deref(), 50)?;
    required("contact_family", &f.contact_family, 100)?;
    if f.num_children.is_some_and(|n| n < 0) {
        return Err(AppError::Validation("num_children must not be negative".into()));
    }
    if f.birth_date.is_some_and(|birth| birth > f.death_date) {
        return Err(AppError::Validation("birth_date must not be after death_date".into()));
    }
    Ok(())
}

fn validate_injured(f: &InjuredFields) -> AppResult<()> {
    required("full_name", &f.full_name, 100)?;
    required("tribe", &f.tribe, 100)?;
    required("injury_place", &f.injury_place, 100)?;
    required("injury_type", &f.injury_type, 100)?;
    required("injury_description", &f.injury_description, usize::MAX)?;
    required("injury_degree", &f.injury_degree, 50)?;
    required("current_status", &f.current_status, 100)?;
    optional("hospital_name", f.hospital_name.as_deref(), 100)?;
    required("contact_family", &f.contact_family, 100)
}

fn validate_prisoner(f: &PrisonerFields) -> AppResult<()> {
    required("full_name", &f.full_name, 100)?;
    required("tribe", &f.tribe, 100)?;
    required("capture_place", &f.capture_place, 100)?;
    required("captured_by", &f.captured_by, 100)?;
    required("current_status", &f.current_status, 100)?;
    required("family_contact", &f.family_contact, 100)?;
    optional("detention_place", f.detention_place.as_deref(), 100)?;
    if f.release_date.is_some_and(|release| release < f.capture_date) {
        return Err(AppError::Validation(
            "release_date must not be before capture_date".into(),
        ));
    }
    Ok(())
}

/// A non-blank string of at most `max` characters.
pub fn required(field: &str, value: &str, max: usize) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    max_length(field, value, max)
}

/// An optional string of at most `max` characters.
pub fn optional(field: &str, value: Option<&str>, max: usize) -> AppResult<()> {
    match value {
        Some(v) => max_length(field, v, max),
        None => Ok(()),
    }
}

fn max_length(field: &str, value: &str, max: usize) -> AppResult<()> {
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// An attachment reference must point into the namespace of its upload kind and
/// must not contain relative segments.
fn attachment_path(field: &str, path: &str, kind: UploadKind) -> AppResult<()> {
    max_length(field, path, 255)?;
    let mut segments = path.split('/');
    let in_namespace = segments.next() == Some(kind.namespace());
    let rest: Vec<&str> = segments.collect();
    let clean = !rest.is_empty()
        && rest
            .iter()
            .all(|segment| !segment.is_empty() && *segment != "." && *segment != "..");
    if !in_namespace || !clean {
        return Err(AppError::Validation(format!(
            "{field} must be a stored file path under {}/",
            kind.namespace()
        )));
    }
    Ok(())
}

/// Resolves optional skip/limit parameters into a bounded [`Page`].
pub fn page(skip: Option<i64>, limit: Option<i64>) -> AppResult<Page> {
    let offset = skip.unwrap_or(0);
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if offset < 0 {
        return Err(AppError::Validation("skip must not be negative".into()));
    }
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}"
        )));
    }
    Ok(Page { offset, limit })
}

/// 3 to 50 characters of ASCII letters, digits, `_`, `-` or `.`.
pub fn username(value: &str) -> AppResult<()> {
    let len = value.chars().count();
    if !(3..=50).contains(&len) {
        return Err(AppError::Validation(
            "username must be between 3 and 50 characters".into(),
        ));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(AppError::Validation(
            "username may only contain letters, digits, '_', '-' and '.'".into(),
        ));
    }
    Ok(())
}

pub fn password(value: &str) -> AppResult<()> {
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
