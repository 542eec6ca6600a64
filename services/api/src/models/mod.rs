//! API service models

pub mod activity;
pub mod post;
pub mod score;
pub mod user;

// Re-export for convenience
pub use activity::{ActivityLog, EntityKind, EntityRef, Subject};
pub use post::{NewPost, Post, PostKind, Reaction, ReactionKind};
pub use score::{NewScore, Score};
pub use user::{NewUser, UpdateUser, User};
