//! Post and reaction repository for database operations

use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::OnceLock;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::post::{NewPost, Post, Reaction, ReactionKind, validate_payload};

const POST_COLUMNS: &str = "id, user_id, timestamp, post_kind, achievement, content_date, \
     content_time_range, data, comment";

const REACTION_COLUMNS: &str = "id, reaction_kind, user_id, post_id, created_at";

/// Post repository
#[derive(Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    /// Create a new post repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Publish a post. The payload must carry the keys its kind
    /// requires; the achievement flag is taken as given, detection is
    /// the caller's business.
    pub async fn create(&self, new_post: &NewPost) -> ApiResult<Post> {
        validate_payload(new_post.post_kind, &new_post.data).map_err(ApiError::Validation)?;

        let time_range = new_post.content_time_range.unwrap_or(1);
        if time_range < 1 {
            return Err(ApiError::Validation(
                "Content time range must be at least one day".to_string(),
            ));
        }

        let sql = format!(
            "INSERT INTO posts (user_id, post_kind, achievement, content_date, \
             content_time_range, data, comment) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {POST_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(new_post.user_id)
            .bind(new_post.post_kind.as_str())
            .bind(new_post.achievement)
            .bind(new_post.content_date)
            .bind(time_range)
            .bind(&new_post.data)
            .bind(&new_post.comment)
            .fetch_one(&self.pool)
            .await
            .map_err(foreign_key_to_reference)?;

        info!("User {} published a {} post", new_post.user_id, new_post.post_kind);
        post_from_row(&row)
    }

    /// Get a post by ID
    pub async fn get_by_id(&self, id: Uuid) -> ApiResult<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        row.as_ref().map(post_from_row).transpose()
    }

    /// All posts by one user, newest first.
    pub async fn list_by_user(&self, user_id: Uuid) -> ApiResult<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE user_id = $1 ORDER BY timestamp DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(post_from_row).collect()
    }

    /// Delete a post. Its reactions go with it.
    pub async fn delete(&self, id: Uuid) -> ApiResult<()> {
        sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// React to a post. Inserts unconditionally; a user may react to the
    /// same post more than once.
    pub async fn react(
        &self,
        user_id: Uuid,
        post_id: Uuid,
        kind: Option<ReactionKind>,
    ) -> ApiResult<Reaction> {
        let kind = kind.unwrap_or_default();

        let sql = format!(
            "INSERT INTO reactions (reaction_kind, user_id, post_id) \
             VALUES ($1, $2, $3) \
             RETURNING {REACTION_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(kind.as_str())
            .bind(user_id)
            .bind(post_id)
            .fetch_one(&self.pool)
            .await
            .map_err(foreign_key_to_reference)?;

        reaction_from_row(&row)
    }

    /// All reactions to a post.
    pub async fn reactions_for(&self, post_id: Uuid) -> ApiResult<Vec<Reaction>> {
        let sql = format!(
            "SELECT {REACTION_COLUMNS} FROM reactions WHERE post_id = $1 \
             ORDER BY created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(post_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(reaction_from_row).collect()
    }
}

/// A dangling user or post foreign key surfaces as a reference error
/// rather than a bare database error.
fn foreign_key_to_reference(e: sqlx::Error) -> ApiError {
    match &e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            ApiError::Reference("Referenced user or post does not exist".to_string())
        }
        _ => ApiError::from(e),
    }
}

fn post_from_row(row: &PgRow) -> ApiResult<Post> {
    let kind: String = row.get("post_kind");

    Ok(Post {
        id: row.get("id"),
        user_id: row.get("user_id"),
        timestamp: row.get("timestamp"),
        post_kind: kind.parse().map_err(ApiError::Internal)?,
        achievement: row.get("achievement"),
        content_date: row.get("content_date"),
        content_time_range: row.get("content_time_range"),
        data: row.get("data"),
        comment: row.get("comment"),
        main_text_cache: OnceLock::new(),
    })
}

fn reaction_from_row(row: &PgRow) -> ApiResult<Reaction> {
    let kind: String = row.get("reaction_kind");

    Ok(Reaction {
        id: row.get("id"),
        reaction_kind: kind.parse().map_err(ApiError::Internal)?,
        user_id: row.get("user_id"),
        post_id: row.get("post_id"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::PostKind;
    use crate::models::user::NewUser;
    use crate::repositories::user::UserRepository;
    use chrono::NaiveDate;
    use serde_json::json;

    async fn pool() -> PgPool {
        let config = common::database::DatabaseConfig::from_env().unwrap();
        common::database::init_pool(&config).await.unwrap()
    }

    async fn author(pool: &PgPool) -> Uuid {
        let users = UserRepository::new(pool.clone());
        users
            .create(&NewUser {
                name: "Author".to_string(),
                email: format!("{}@example.com", Uuid::new_v4().simple()),
                password: "correct horse battery".to_string(),
                locale: None,
                timezone: None,
            })
            .await
            .unwrap()
            .id
    }

    fn day_summary(user_id: Uuid, data: serde_json::Value) -> NewPost {
        NewPost {
            user_id,
            post_kind: PostKind::DaySummary,
            achievement: false,
            content_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            content_time_range: None,
            data,
            comment: None,
        }
    }

    #[tokio::test]
    #[ignore = "requires a running postgres instance"]
    async fn test_day_summary_payload_is_validated_on_publish() {
        let pool = pool().await;
        let repo = PostRepository::new(pool.clone());
        let user_id = author(&pool).await;

        let incomplete = repo.create(&day_summary(user_id, json!({"cards": 10}))).await;
        assert!(matches!(incomplete, Err(ApiError::Validation(_))));

        let post = repo
            .create(&day_summary(user_id, json!({"cards": 10, "duration": 25.5})))
            .await
            .unwrap();
        assert_eq!(post.content_time_range, 1);
    }

    #[tokio::test]
    #[ignore = "requires a running postgres instance"]
    async fn test_duplicate_reactions_are_allowed() {
        let pool = pool().await;
        let repo = PostRepository::new(pool.clone());
        let user_id = author(&pool).await;
        let post = repo
            .create(&day_summary(user_id, json!({"cards": 1, "duration": 2.0})))
            .await
            .unwrap();

        let first = repo.react(user_id, post.id, None).await.unwrap();
        assert_eq!(first.reaction_kind, ReactionKind::Whee);
        repo.react(user_id, post.id, Some(ReactionKind::Party))
            .await
            .unwrap();

        assert_eq!(repo.reactions_for(post.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    #[ignore = "requires a running postgres instance"]
    async fn test_reacting_to_a_missing_post_is_a_reference_error() {
        let pool = pool().await;
        let repo = PostRepository::new(pool.clone());
        let user_id = author(&pool).await;

        let result = repo.react(user_id, Uuid::new_v4(), None).await;
        assert!(matches!(result, Err(ApiError::Reference(_))));
    }
}
