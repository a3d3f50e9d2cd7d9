use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow, query_builder::QueryBuilder};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult, is_unique_violation},
    models::{
        EntityKind, NewRecord, NewUser, Page, Record, RecordFields, RecordFilter, RecordStatus,
        StatusChange, StatusCounts, User,
    },
};

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers and the workflow talk
/// to `Arc<dyn Repository>` and never see the concrete store.
///
/// Record operations take the [`EntityKind`] they act on; the same method set serves
/// martyrs, injured persons and prisoners. Each call touches at most one row for writes.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> AppResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;
    /// Fails with `Validation` if the username is already taken.
    async fn create_user(&self, user: NewUser) -> AppResult<User>;
    /// Stamps `last_login` and returns the updated user.
    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> AppResult<Option<User>>;
    async fn list_users(&self, page: Page) -> AppResult<Vec<User>>;
    async fn count_users(&self) -> AppResult<i64>;

    // --- Records ---
    async fn insert_record(&self, record: NewRecord) -> AppResult<Record>;
    async fn get_record(&self, kind: EntityKind, id: i64) -> AppResult<Option<Record>>;
    /// Records matching `filter`, ordered by id (insertion order), sliced by `page`.
    async fn list_records(
        &self,
        kind: EntityKind,
        filter: RecordFilter,
        page: Page,
    ) -> AppResult<Vec<Record>>;
    /// Applies one status transition. `None` if the record does not exist.
    async fn update_status(
        &self,
        kind: EntityKind,
        id: i64,
        change: StatusChange,
    ) -> AppResult<Option<Record>>;
    async fn status_counts(&self, kind: EntityKind) -> AppResult<StatusCounts>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    fn decode_all(kind: EntityKind, rows: &[PgRow]) -> AppResult<Vec<Record>> {
        rows.iter()
            .map(|row| Record::from_row(kind, row))
            .collect::<Result<Vec<_>, _>>()
            .map_err(AppError::from)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// create_user
    ///
    /// Inserts a user. The `uq_users_username` constraint is the final arbiter of
    /// uniqueness; a violation is reported as a validation failure.
    async fn create_user(&self, user: NewUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password, full_name, user_type, phone_number, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.full_name)
        .bind(user.role.as_str())
        .bind(user.phone_number)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Validation("Username already exists".to_string())
            } else {
                AppError::Database(e)
            }
        })
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET last_login = $1 WHERE id = $2 RETURNING *",
        )
        .bind(at)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self, page: Page) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY id ASC OFFSET $1 LIMIT $2",
        )
        .bind(page.offset)
        .bind(page.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn count_users(&self) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// insert_record
    ///
    /// One INSERT per kind, since the entity columns differ. The workflow columns
    /// (status, owner, created_at) are bound from the `NewRecord` the workflow built.
    async fn insert_record(&self, record: NewRecord) -> AppResult<Record> {
        let NewRecord {
            draft,
            status,
            added_by_user_id,
            created_at,
        } = record;
        let kind = draft.fields.kind();

        let row = match draft.fields {
            RecordFields::Martyr(f) => {
                sqlx::query(
                    r#"
                    INSERT INTO martyrs (
                        full_name, nickname, tribe, birth_date, death_date, death_place,
                        cause_of_death, rank_or_position, participation_fronts, family_status,
                        num_children, contact_family, photo_path, cv_file_path,
                        status, added_by_user_id, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                    RETURNING *
                    "#,
                )
                .bind(f.full_name)
                .bind(f.nickname)
                .bind(f.tribe)
                .bind(f.birth_date)
                .bind(f.death_date)
                .bind(f.death_place)
                .bind(f.cause_of_death)
                .bind(f.rank_or_position)
                .bind(f.participation_fronts)
                .bind(f.family_status)
                .bind(f.num_children)
                .bind(f.contact_family)
                .bind(draft.photo_path)
                .bind(draft.cv_file_path)
                .bind(status.as_str())
                .bind(added_by_user_id)
                .bind(created_at)
                .fetch_one(&self.pool)
                .await?
            }
            RecordFields::Injured(f) => {
                sqlx::query(
                    r#"
                    INSERT INTO injured (
                        full_name, tribe, injury_date, injury_place, injury_type,
                        injury_description, injury_degree, current_status, hospital_name,
                        contact_family, photo_path, cv_file_path,
                        status, added_by_user_id, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                    RETURNING *
                    "#,
                )
                .bind(f.full_name)
                .bind(f.tribe)
                .bind(f.injury_date)
                .bind(f.injury_place)
                .bind(f.injury_type)
                .bind(f.injury_description)
                .bind(f.injury_degree)
                .bind(f.current_status)
                .bind(f.hospital_name)
                .bind(f.contact_family)
                .bind(draft.photo_path)
                .bind(draft.cv_file_path)
                .bind(status.as_str())
                .bind(added_by_user_id)
                .bind(created_at)
                .fetch_one(&self.pool)
                .await?
            }
            RecordFields::Prisoner(f) => {
                sqlx::query(
                    r#"
                    INSERT INTO prisoners (
                        full_name, tribe, capture_date, capture_place, captured_by,
                        current_status, release_date, family_contact, detention_place, notes,
                        photo_path, cv_file_path,
                        status, added_by_user_id, created_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                    RETURNING *
                    "#,
                )
                .bind(f.full_name)
                .bind(f.tribe)
                .bind(f.capture_date)
                .bind(f.capture_place)
                .bind(f.captured_by)
                .bind(f.current_status)
                .bind(f.release_date)
                .bind(f.family_contact)
                .bind(f.detention_place)
                .bind(f.notes)
                .bind(draft.photo_path)
                .bind(draft.cv_file_path)
                .bind(status.as_str())
                .bind(added_by_user_id)
                .bind(created_at)
                .fetch_one(&self.pool)
                .await?
            }
        };

        Ok(Record::from_row(kind, &row)?)
    }

    async fn get_record(&self, kind: EntityKind, id: i64) -> AppResult<Option<Record>> {
        let sql = format!("SELECT * FROM {} WHERE id = $1", kind.table());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| Record::from_row(kind, &row))
            .transpose()
            .map_err(AppError::from)
    }

    /// list_records
    ///
    /// Builds the access-policy predicate with QueryBuilder so every value is bound,
    /// never interpolated.
    async fn list_records(
        &self,
        kind: EntityKind,
        filter: RecordFilter,
        page: Page,
    ) -> AppResult<Vec<Record>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT * FROM {} WHERE TRUE", kind.table()));

        if let Some(owner) = filter.owner {
            builder.push(" AND added_by_user_id = ").push_bind(owner);
        }
        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }

        builder
            .push(" ORDER BY id ASC OFFSET ")
            .push_bind(page.offset)
            .push(" LIMIT ")
            .push_bind(page.limit);

        let rows = builder.build().fetch_all(&self.pool).await?;
        Self::decode_all(kind, &rows)
    }

    /// update_status
    ///
    /// `COALESCE` keeps the current notes when the transition carries none.
    async fn update_status(
        &self,
        kind: EntityKind,
        id: i64,
        change: StatusChange,
    ) -> AppResult<Option<Record>> {
        let sql = format!(
            "UPDATE {} SET status = $1, admin_notes = COALESCE($2, admin_notes), updated_at = $3 \
             WHERE id = $4 RETURNING *",
            kind.table()
        );
        let row = sqlx::query(&sql)
            .bind(change.status.as_str())
            .bind(change.admin_notes)
            .bind(change.updated_at)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| Record::from_row(kind, &row))
            .transpose()
            .map_err(AppError::from)
    }

    async fn status_counts(&self, kind: EntityKind) -> AppResult<StatusCounts> {
        let sql = format!(
            "SELECT status, COUNT(*) AS count FROM {} GROUP BY status",
            kind.table()
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            counts.add(status.parse::<RecordStatus>()?, count);
        }
        Ok(counts)
    }
}
