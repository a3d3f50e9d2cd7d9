//! Record workflow shared by all three kinds: creation, listing, fetch, review and
//! statistics. Every operation takes the authenticated actor and goes through the
//! access policy before touching the store.

use chrono::{DateTime, Duration, Utc};

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{
        EntityKind, KindStatistics, ListRecordsQuery, NewRecord, Record, RecordDraft,
        RecordStatus, StatsResponse, StatusChange, StatusUpdateRequest,
    },
    policy::{self, Capability},
    repository::Repository,
    validation,
};

/// create_record
///
/// Persists a validated draft. Status is always `Pending`, the owner is always the
/// actor and `updated_at` stays unset, whatever the client sent.
pub async fn create_record(
    repo: &dyn Repository,
    actor: &AuthUser,
    draft: RecordDraft,
) -> AppResult<Record> {
    let kind = draft.fields.kind();
    let record = repo
        .insert_record(NewRecord {
            draft,
            status: RecordStatus::Pending,
            added_by_user_id: actor.id,
            created_at: Utc::now(),
        })
        .await?;

    tracing::info!(%kind, id = record.id, owner = actor.id, "record created");
    Ok(record)
}

/// list_records
///
/// Access predicate intersected with the optional status filter, in insertion order.
pub async fn list_records(
    repo: &dyn Repository,
    actor: &AuthUser,
    kind: EntityKind,
    query: ListRecordsQuery,
) -> AppResult<Vec<Record>> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<RecordStatus>)
        .transpose()?;
    let page = validation::page(query.skip, query.limit)?;

    repo.list_records(kind, policy::visibility(actor, status), page)
        .await
}

pub async fn get_record(
    repo: &dyn Repository,
    actor: &AuthUser,
    kind: EntityKind,
    id: i64,
) -> AppResult<Record> {
    let record = repo
        .get_record(kind, id)
        .await?
        .ok_or_else(|| not_found(kind))?;

    if !policy::can_view(actor, &record) {
        return Err(AppError::Forbidden(
            "Not enough permissions to view this record".to_string(),
        ));
    }
    Ok(record)
}

/// set_status
///
/// Applies one review transition. Any state may move to any state. Notes replace
/// the stored notes only when supplied.
pub async fn set_status(
    repo: &dyn Repository,
    actor: &AuthUser,
    kind: EntityKind,
    id: i64,
    request: StatusUpdateRequest,
) -> AppResult<Record> {
    policy::authorize(actor, Capability::ReviewRecords)?;
    let status = request.status.parse::<RecordStatus>()?;

    let current = repo
        .get_record(kind, id)
        .await?
        .ok_or_else(|| not_found(kind))?;

    let change = StatusChange {
        status,
        admin_notes: request.admin_notes,
        updated_at: next_update_stamp(current.updated_at, Utc::now()),
    };
    let updated = repo
        .update_status(kind, id, change)
        .await?
        .ok_or_else(|| not_found(kind))?;

    tracing::info!(
        %kind,
        id,
        from = %current.status,
        to = %updated.status,
        reviewer = actor.id,
        "record status changed"
    );
    Ok(updated)
}

/// The stamp for a transition happening at `now`: strictly later than `previous`.
pub fn next_update_stamp(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + Duration::microseconds(1),
        _ => now,
    }
}

/// statistics
///
/// Per-kind status counts plus the flat totals of the dashboard.
pub async fn statistics(repo: &dyn Repository, actor: &AuthUser) -> AppResult<StatsResponse> {
    policy::authorize(actor, Capability::ViewStatistics)?;

    let mut stats = StatsResponse {
        total_users: repo.count_users().await?,
        ..StatsResponse::default()
    };

    for kind in EntityKind::ALL {
        let counts = repo.status_counts(kind).await?;
        let (total, pending) = match kind {
            EntityKind::Martyr => (&mut stats.total_martyrs, &mut stats.pending_martyrs),
            EntityKind::Injured => (&mut stats.total_injured, &mut stats.pending_injured),
            EntityKind::Prisoner => (&mut stats.total_prisoners, &mut stats.pending_prisoners),
        };
        *total = counts.total();
        *pending = counts.pending;
        stats.by_kind.push(KindStatistics {
            kind,
            counts,
            total: counts.total(),
        });
    }

    Ok(stats)
}

fn not_found(kind: EntityKind) -> AppError {
    AppError::NotFound(format!("{} not found", kind.label()))
}
