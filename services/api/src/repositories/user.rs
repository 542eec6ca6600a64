//! User repository and account operations
//!
//! Owns identity, credentials, and the two rotate-able secrets (app API
//! token, password-reset token). Security-sensitive operations append to
//! the activity log.

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use chrono::Utc;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::mailer::{Mailer, password_reset_mail};
use crate::models::activity::{ACTION_PASSWORD_RESET, ACTION_TOKEN_RESET, Subject};
use crate::models::user::{NewUser, UpdateUser, User};
use crate::repositories::activity::{ActivityLogRepository, insert_entry};
use crate::storage::{FileStorage, avatar_path, delete_owned_files};
use crate::tokens::{SECRET_TOKEN_LENGTH, random_string};
use crate::validation::{normalize_email, validate_email, validate_name, validate_password};

const USER_COLUMNS: &str = "id, name, email, password_hash, is_active, is_staff, \
     is_superuser, locale, timezone, avatar, pw_reset_token, pw_reset_time, locked, \
     app_token, created_at, updated_at";

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
    activity: ActivityLogRepository,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        let activity = ActivityLogRepository::new(pool.clone());
        Self { pool, activity }
    }

    /// Create a new account. The password is hashed before anything is
    /// persisted and the account starts out active.
    pub async fn create(&self, new_user: &NewUser) -> ApiResult<User> {
        self.insert(new_user, false).await
    }

    /// Create a new account with staff and superuser flags set.
    pub async fn create_superuser(&self, new_user: &NewUser) -> ApiResult<User> {
        self.insert(new_user, true).await
    }

    async fn insert(&self, new_user: &NewUser, superuser: bool) -> ApiResult<User> {
        validate_name(&new_user.name).map_err(ApiError::Validation)?;
        let email = normalize_email(&new_user.email);
        validate_email(&email).map_err(ApiError::Validation)?;
        validate_password(&new_user.password).map_err(ApiError::Validation)?;

        info!("Creating new user: {}", email);

        let password_hash = hash_password(&new_user.password)?;
        let locale = new_user.locale.clone().unwrap_or_else(|| "en".to_string());
        let timezone = new_user
            .timezone
            .clone()
            .unwrap_or_else(|| "UTC".to_string());

        let sql = format!(
            "INSERT INTO users (name, email, password_hash, is_staff, is_superuser, locale, timezone) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&new_user.name)
            .bind(&email)
            .bind(&password_hash)
            .bind(superuser)
            .bind(superuser)
            .bind(&locale)
            .bind(&timezone)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    ApiError::Validation(format!("Email {} is already registered", email))
                }
                _ => ApiError::from(e),
            })?;

        Ok(user_from_row(&row))
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: Uuid) -> ApiResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Find a user by email. The argument is normalized first, so lookups
    /// behave like the stored value.
    pub async fn find_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Resolve an app API token to its owner. Rotated-out tokens no
    /// longer resolve.
    pub async fn find_by_app_token(&self, token: &str) -> ApiResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE app_token = $1");
        let row = sqlx::query(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Apply a partial profile update. The email, if changed, goes
    /// through the same normalization as on create.
    pub async fn update(&self, id: Uuid, update: &UpdateUser) -> ApiResult<User> {
        let Some(mut user) = self.find_by_id(id).await? else {
            return Err(ApiError::NotFound);
        };

        if let Some(name) = &update.name {
            validate_name(name).map_err(ApiError::Validation)?;
            user.name = name.clone();
        }
        if let Some(email) = &update.email {
            let email = normalize_email(email);
            validate_email(&email).map_err(ApiError::Validation)?;
            user.email = email;
        }
        if let Some(locale) = &update.locale {
            user.locale = locale.clone();
        }
        if let Some(timezone) = &update.timezone {
            user.timezone = timezone.clone();
        }
        if let Some(locked) = update.locked {
            user.locked = locked;
        }

        let sql = format!(
            "UPDATE users \
             SET name = $1, email = $2, locale = $3, timezone = $4, locked = $5, updated_at = NOW() \
             WHERE id = $6 \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&user.name)
            .bind(normalize_email(&user.email))
            .bind(&user.locale)
            .bind(&user.timezone)
            .bind(user.locked)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    ApiError::Validation(format!("Email {} is already registered", user.email))
                }
                _ => ApiError::from(e),
            })?;

        Ok(user_from_row(&row))
    }

    /// Verify a user's password
    pub async fn verify_password(&self, user: &User, password: &str) -> ApiResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password_hash)
            .map_err(|e| ApiError::Internal(format!("Failed to parse password hash: {}", e)))?;

        let argon2 = Argon2::default();
        Ok(argon2
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Generate a new app API token, invalidating the old one.
    ///
    /// The previous token stops authenticating the moment the new value
    /// is written; there is no overlap window. The rotation is journaled
    /// with the user as both actor and subject.
    pub async fn regenerate_app_token(&self, user: &User) -> ApiResult<String> {
        let token = random_string(SECRET_TOKEN_LENGTH);

        sqlx::query("UPDATE users SET app_token = $1, updated_at = NOW() WHERE id = $2")
            .bind(&token)
            .bind(user.id)
            .execute(&self.pool)
            .await?;

        info!("App token reset for user {}", user.id);
        self.activity
            .record(Some(user.id), user.entity_ref(), ACTION_TOKEN_RESET, None)
            .await?;

        Ok(token)
    }

    /// Issue a new password-reset token and send out the recovery mail.
    ///
    /// Token, issuance timestamp and the audit entry commit as one
    /// transaction, so the pair can never be observed half-set. Mail
    /// dispatch happens after the commit and must not undo the issued
    /// token; its failures are logged and swallowed. Returns the
    /// recovery URL.
    pub async fn request_password_reset(
        &self,
        user: &User,
        base_url: &str,
        mailer: &Mailer,
    ) -> ApiResult<String> {
        let token = random_string(SECRET_TOKEN_LENGTH);
        let issued_at = Utc::now();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE users SET pw_reset_token = $1, pw_reset_time = $2, updated_at = NOW() \
             WHERE id = $3",
        )
        .bind(&token)
        .bind(issued_at)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
        insert_entry(
            &mut *tx,
            Some(user.id),
            user.entity_ref(),
            ACTION_PASSWORD_RESET,
            None,
        )
        .await?;
        tx.commit().await?;

        let url = recovery_url(base_url, &token);
        info!("Password reset requested for user {}", user.id);

        let mail = password_reset_mail(user, &url);
        if let Err(e) = mailer.send(&mail).await {
            warn!(
                "Could not dispatch password recovery mail to {}: {}",
                user.email, e
            );
        }

        Ok(url)
    }

    /// Store a new profile picture and replace the previous one.
    pub async fn set_avatar(
        &self,
        user: &User,
        filename: &str,
        bytes: Vec<u8>,
        storage: &FileStorage,
    ) -> ApiResult<User> {
        let key = storage.store(&avatar_path(filename), bytes).await?;

        if let Some(old) = &user.avatar {
            if let Err(e) = storage.delete(old).await {
                warn!("Could not delete replaced avatar {}: {}", old, e);
            }
        }

        let sql = format!(
            "UPDATE users SET avatar = $1, updated_at = NOW() WHERE id = $2 \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&key)
            .bind(user.id)
            .fetch_one(&self.pool)
            .await?;

        Ok(user_from_row(&row))
    }

    /// Delete the account together with its posts, reactions and scores.
    ///
    /// Refused while any activity-log entry names this user as actor:
    /// audit history outlives the audited account. Uploaded files are
    /// removed best-effort first; a storage fault never blocks the row
    /// delete. Log entries that are merely *about* the user stay behind.
    pub async fn delete(&self, user: &User, storage: &FileStorage) -> ApiResult<()> {
        let entries = self.activity.count_by_actor(user.id).await?;
        if entries > 0 {
            return Err(ApiError::ProtectedReference(format!(
                "User {} is the actor of {} activity log entries and cannot be deleted",
                user.id, entries
            )));
        }

        delete_owned_files(storage, user).await;

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user.id)
            .execute(&self.pool)
            .await?;

        info!("Deleted user {}", user.id);
        Ok(())
    }
}

/// Recovery link embedding a freshly issued reset token.
fn recovery_url(base_url: &str, token: &str) -> String {
    format!("{}/auth/recover/{}", base_url.trim_end_matches('/'), token)
}

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Failed to hash password: {}", e)))
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        is_staff: row.get("is_staff"),
        is_superuser: row.get("is_superuser"),
        locale: row.get("locale"),
        timezone: row.get("timezone"),
        avatar: row.get("avatar"),
        pw_reset_token: row.get("pw_reset_token"),
        pw_reset_time: row.get("pw_reset_time"),
        locked: row.get("locked"),
        app_token: row.get("app_token"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::post::{NewPost, PostKind};
    use crate::repositories::post::PostRepository;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_recovery_url() {
        assert_eq!(
            recovery_url("https://ankisocial.example/", "abc123"),
            "https://ankisocial.example/auth/recover/abc123"
        );
        assert_eq!(
            recovery_url("https://ankisocial.example", "abc123"),
            "https://ankisocial.example/auth/recover/abc123"
        );
    }

    #[test]
    fn test_hash_password_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(
            Argon2::default()
                .verify_password(b"correct horse", &parsed)
                .is_ok()
        );
        assert!(
            Argon2::default()
                .verify_password(b"wrong horse", &parsed)
                .is_err()
        );
    }

    async fn pool() -> PgPool {
        let config = common::database::DatabaseConfig::from_env().unwrap();
        common::database::init_pool(&config).await.unwrap()
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Test User".to_string(),
            email: email.to_string(),
            password: "correct horse battery".to_string(),
            locale: None,
            timezone: None,
        }
    }

    fn unique_email() -> String {
        format!("{}@example.com", Uuid::new_v4().simple())
    }

    #[tokio::test]
    #[ignore = "requires a running postgres instance"]
    async fn test_case_variant_emails_collide() {
        let repo = UserRepository::new(pool().await);
        let email = unique_email();

        repo.create(&new_user(&format!(" {} ", email.to_uppercase())))
            .await
            .unwrap();
        let duplicate = repo.create(&new_user(&email)).await;
        assert!(matches!(duplicate, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    #[ignore = "requires a running postgres instance"]
    async fn test_regenerated_token_invalidates_the_previous_one() {
        let repo = UserRepository::new(pool().await);
        let user = repo.create(&new_user(&unique_email())).await.unwrap();

        let first = repo.regenerate_app_token(&user).await.unwrap();
        assert_eq!(first.len(), SECRET_TOKEN_LENGTH);
        assert!(repo.find_by_app_token(&first).await.unwrap().is_some());

        let second = repo.regenerate_app_token(&user).await.unwrap();
        assert_ne!(first, second);
        assert!(repo.find_by_app_token(&first).await.unwrap().is_none());
        assert!(repo.find_by_app_token(&second).await.unwrap().is_some());
    }

    #[tokio::test]
    #[ignore = "requires a running postgres instance"]
    async fn test_password_reset_sets_token_and_time_together() {
        let repo = UserRepository::new(pool().await);
        let user = repo.create(&new_user(&unique_email())).await.unwrap();
        assert!(user.pw_reset_token.is_none() && user.pw_reset_time.is_none());

        let url = repo
            .request_password_reset(&user, "https://ankisocial.example", &Mailer::new())
            .await
            .unwrap();

        let user = repo.find_by_id(user.id).await.unwrap().unwrap();
        let token = user.pw_reset_token.expect("reset token must be set");
        assert!(user.pw_reset_time.is_some(), "reset time must be set");
        assert_eq!(url, format!("https://ankisocial.example/auth/recover/{token}"));
    }

    #[tokio::test]
    #[ignore = "requires a running postgres instance"]
    async fn test_token_reset_is_journaled_newest_first() {
        let repo = UserRepository::new(pool().await);
        let activity = ActivityLogRepository::new(pool().await);
        let user = repo.create(&new_user(&unique_email())).await.unwrap();

        repo.request_password_reset(&user, "https://ankisocial.example", &Mailer::new())
            .await
            .unwrap();
        repo.regenerate_app_token(&user).await.unwrap();

        let entries = activity.entries_by(user.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action_type, ACTION_TOKEN_RESET);
        assert_eq!(entries[0].actor_id, Some(user.id));
        assert_eq!(entries[1].action_type, ACTION_PASSWORD_RESET);

        let about = activity.entries_about(user.entity_ref()).await.unwrap();
        assert_eq!(about.len(), 2);
    }

    #[tokio::test]
    #[ignore = "requires a running postgres instance"]
    async fn test_delete_is_refused_for_log_actors_and_cascades_otherwise() {
        let pool = pool().await;
        let repo = UserRepository::new(pool.clone());
        let posts = PostRepository::new(pool.clone());
        let storage = FileStorage::from_env("ankisocial-test".to_string()).await;

        // a user who acted: protected
        let actor = repo.create(&new_user(&unique_email())).await.unwrap();
        repo.regenerate_app_token(&actor).await.unwrap();
        assert!(matches!(
            repo.delete(&actor, &storage).await,
            Err(ApiError::ProtectedReference(_))
        ));

        // a user who only authored content: delete cascades
        let author = repo.create(&new_user(&unique_email())).await.unwrap();
        let post = posts
            .create(&NewPost {
                user_id: author.id,
                post_kind: PostKind::Streak,
                achievement: false,
                content_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                content_time_range: None,
                data: json!({"days": 3}),
                comment: None,
            })
            .await
            .unwrap();
        posts.react(actor.id, post.id, None).await.unwrap();

        repo.delete(&author, &storage).await.unwrap();
        assert!(repo.find_by_id(author.id).await.unwrap().is_none());
        assert!(posts.get_by_id(post.id).await.unwrap().is_none());
    }
}
