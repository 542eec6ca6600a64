//! Score repository for database operations

use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::score::{NewScore, Score};

const SCORE_COLUMNS: &str = "id, score, date, user_id, created_at";

/// Score repository
#[derive(Clone)]
pub struct ScoreRepository {
    pool: PgPool,
}

impl ScoreRepository {
    /// Create a new score repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a daily point value. Negative scores are rejected.
    /// Duplicate dates insert freely; there is no merge policy.
    pub async fn create(&self, new_score: &NewScore) -> ApiResult<Score> {
        if new_score.score < 0 {
            return Err(ApiError::Validation(
                "Scores cannot be negative".to_string(),
            ));
        }

        let sql = format!(
            "INSERT INTO scores (score, date, user_id) \
             VALUES ($1, $2, $3) \
             RETURNING {SCORE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(new_score.score)
            .bind(new_score.date)
            .bind(new_score.user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(score_from_row(&row))
    }

    /// All scores for one user, most recent date first.
    pub async fn list_by_user(&self, user_id: Uuid) -> ApiResult<Vec<Score>> {
        let sql = format!(
            "SELECT {SCORE_COLUMNS} FROM scores WHERE user_id = $1 ORDER BY date DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(score_from_row).collect())
    }
}

fn score_from_row(row: &PgRow) -> Score {
    Score {
        id: row.get("id"),
        score: row.get("score"),
        date: row.get("date"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}
