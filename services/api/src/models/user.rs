//! User model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::activity::{EntityKind, Subject};
use crate::storage::HasFileFields;

/// Shown wherever a user without a name has to be rendered as text.
pub const UNNAMED_USER: &str = "Unnamed user";

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Publicly displayed name.
    pub name: String,
    /// Login identifier; always stored lower-cased and trimmed.
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub locale: String,
    pub timezone: String,
    /// Object key of the uploaded profile picture, if any.
    pub avatar: Option<String>,
    /// Set together with `pw_reset_time`, never one without the other.
    #[serde(skip_serializing)]
    pub pw_reset_token: Option<String>,
    pub pw_reset_time: Option<DateTime<Utc>>,
    /// Posts by locked accounts are only visible to their followers.
    pub locked: bool,
    /// Bearer secret for scripts and apps. Regenerating it invalidates
    /// the previous value immediately.
    #[serde(skip_serializing)]
    pub app_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Returns the user's name, or the "Unnamed user" sentinel.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            UNNAMED_USER.to_string()
        } else {
            self.name.clone()
        }
    }
}

impl Subject for User {
    fn entity_kind() -> EntityKind {
        EntityKind::User
    }

    fn entity_id(&self) -> Uuid {
        self.id
    }
}

impl HasFileFields for User {
    fn file_fields(&self) -> Vec<Option<&str>> {
        vec![self.avatar.as_deref()]
    }
}

/// New user creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub locale: Option<String>,
    pub timezone: Option<String>,
}

/// User profile update payload
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub locked: Option<bool>,
}
