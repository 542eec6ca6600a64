//! Ankisocial API service
//!
//! The social backend for sharing flashcard-study statistics: user
//! accounts and their rotate-able secrets, the timeline content
//! (posts, reactions, daily scores), and the append-only activity log
//! that journals security-sensitive account actions.

pub mod config;
pub mod error;
pub mod mailer;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod state;
pub mod storage;
pub mod tokens;
pub mod validation;
