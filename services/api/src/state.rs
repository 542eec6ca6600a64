//! Application state shared across handlers

use sqlx::PgPool;

use crate::config::ServiceConfig;
use crate::mailer::Mailer;
use crate::repositories::{
    ActivityLogRepository, PostRepository, ScoreRepository, UserRepository,
};
use crate::storage::FileStorage;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub user_repository: UserRepository,
    pub post_repository: PostRepository,
    pub score_repository: ScoreRepository,
    pub activity_repository: ActivityLogRepository,
    pub storage: FileStorage,
    pub mailer: Mailer,
    pub config: ServiceConfig,
}
