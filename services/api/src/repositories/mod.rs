//! API service repositories

pub mod activity;
pub mod post;
pub mod score;
pub mod user;

// Re-export for convenience
pub use activity::ActivityLogRepository;
pub use post::PostRepository;
pub use score::ScoreRepository;
pub use user::UserRepository;
