use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use api::config::ServiceConfig;
use api::mailer::Mailer;
use api::repositories::{
    ActivityLogRepository, PostRepository, ScoreRepository, UserRepository,
};
use api::routes;
use api::state::AppState;
use api::storage::FileStorage;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_max_level(Level::INFO)
        .init();

    info!("Starting Ankisocial API service");

    // Initialize database connection pool
    let db_config = common::database::DatabaseConfig::from_env()?;
    let pool = common::database::init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let config = ServiceConfig::from_env()?;
    let storage = FileStorage::from_env(config.avatar_bucket.clone()).await;

    let app_state = AppState {
        db_pool: pool.clone(),
        user_repository: UserRepository::new(pool.clone()),
        post_repository: PostRepository::new(pool.clone()),
        score_repository: ScoreRepository::new(pool.clone()),
        activity_repository: ActivityLogRepository::new(pool),
        storage,
        mailer: Mailer::new(),
        config: config.clone(),
    };

    info!("Ankisocial API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Ankisocial API listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
