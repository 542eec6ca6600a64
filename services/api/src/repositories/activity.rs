//! Activity log repository for database operations
//!
//! The journal is append-only: this module knows how to insert and read
//! entries, and nothing in the crate updates or deletes them.

use serde_json::Value;
use sqlx::{PgExecutor, PgPool, Row, postgres::PgRow};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::activity::{ActivityLog, EntityKind, EntityRef};

const ENTRY_COLUMNS: &str =
    "id, actor_id, subject_kind, subject_id, timestamp, action_type, data";

/// Activity log repository
#[derive(Clone)]
pub struct ActivityLogRepository {
    pool: PgPool,
}

impl ActivityLogRepository {
    /// Create a new activity log repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one entry about `subject`.
    ///
    /// The subject reference is resolved against the table its kind maps
    /// to before anything is written; an unresolvable reference fails
    /// with [`ApiError::Reference`] and no row is created.
    pub async fn record(
        &self,
        actor: Option<Uuid>,
        subject: EntityRef,
        action_type: &str,
        payload: Option<&Value>,
    ) -> ApiResult<ActivityLog> {
        if !self.subject_exists(subject).await? {
            return Err(ApiError::Reference(format!(
                "{} {} does not exist",
                subject.kind, subject.id
            )));
        }

        let data = payload.map(|p| p.to_string());
        insert_entry(&self.pool, actor, subject, action_type, data.as_deref()).await
    }

    /// All entries made about `subject`, regardless of actor, newest
    /// first.
    pub async fn entries_about(&self, subject: EntityRef) -> ApiResult<Vec<ActivityLog>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM activity_log \
             WHERE subject_kind = $1 AND subject_id = $2 \
             ORDER BY timestamp DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(subject.kind.as_str())
            .bind(subject.id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(entry_from_row).collect()
    }

    /// All entries recorded with `actor` as the acting user, regardless
    /// of subject, newest first.
    pub async fn entries_by(&self, actor: Uuid) -> ApiResult<Vec<ActivityLog>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM activity_log \
             WHERE actor_id = $1 \
             ORDER BY timestamp DESC"
        );
        let rows = sqlx::query(&sql).bind(actor).fetch_all(&self.pool).await?;

        rows.iter().map(entry_from_row).collect()
    }

    /// Number of entries where `actor` is the acting user. Used to
    /// decide whether an account delete would orphan audit history.
    pub async fn count_by_actor(&self, actor: Uuid) -> ApiResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM activity_log WHERE actor_id = $1")
                .bind(actor)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Resolve a subject reference against the table its kind maps to.
    async fn subject_exists(&self, subject: EntityRef) -> ApiResult<bool> {
        let sql = match subject.kind {
            EntityKind::User => "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)",
            EntityKind::Post => "SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1)",
            EntityKind::Reaction => "SELECT EXISTS(SELECT 1 FROM reactions WHERE id = $1)",
            EntityKind::Score => "SELECT EXISTS(SELECT 1 FROM scores WHERE id = $1)",
        };
        let exists: bool = sqlx::query_scalar(sql)
            .bind(subject.id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }
}

/// Insert one entry through the given executor, so callers can make the
/// append part of their own transaction.
pub(crate) async fn insert_entry<'e>(
    executor: impl PgExecutor<'e>,
    actor: Option<Uuid>,
    subject: EntityRef,
    action_type: &str,
    data: Option<&str>,
) -> ApiResult<ActivityLog> {
    let sql = format!(
        "INSERT INTO activity_log (actor_id, subject_kind, subject_id, action_type, data) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {ENTRY_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(actor)
        .bind(subject.kind.as_str())
        .bind(subject.id)
        .bind(action_type)
        .bind(data)
        .fetch_one(executor)
        .await?;

    entry_from_row(&row)
}

fn entry_from_row(row: &PgRow) -> ApiResult<ActivityLog> {
    let kind: String = row.get("subject_kind");

    Ok(ActivityLog {
        id: row.get("id"),
        actor_id: row.get("actor_id"),
        subject_kind: kind.parse().map_err(ApiError::Internal)?,
        subject_id: row.get("subject_id"),
        timestamp: row.get("timestamp"),
        action_type: row.get("action_type"),
        data: row.get("data"),
        payload_cache: OnceLock::new(),
    })
}
