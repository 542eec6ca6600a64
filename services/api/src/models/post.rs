//! Timeline posts and reactions
//!
//! A post's structured payload depends on its kind; the shape is only
//! enforced here, not by the storage schema.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::activity::{EntityKind, Subject};
use crate::models::user::User;

/// Discriminator selecting the payload shape and display template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostKind {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "streak")]
    Streak,
    #[serde(rename = "day")]
    DaySummary,
    #[serde(rename = "day_cards")]
    DayCards,
    #[serde(rename = "day_duration")]
    DayDuration,
}

impl PostKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostKind::Text => "text",
            PostKind::Streak => "streak",
            PostKind::DaySummary => "day",
            PostKind::DayCards => "day_cards",
            PostKind::DayDuration => "day_duration",
        }
    }
}

impl fmt::Display for PostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(PostKind::Text),
            "streak" => Ok(PostKind::Streak),
            "day" => Ok(PostKind::DaySummary),
            "day_cards" => Ok(PostKind::DayCards),
            "day_duration" => Ok(PostKind::DayDuration),
            other => Err(format!("Unknown post kind: {other}")),
        }
    }
}

/// Check that `data` carries the keys required by `kind`.
///
/// - text: "text"
/// - streak: "days"
/// - day: "cards", "duration" (minutes); "cards_unique" optional
/// - day_cards: "cards" and/or "cards_unique"
/// - day_duration: "duration" (minutes)
pub fn validate_payload(kind: PostKind, data: &Value) -> Result<(), String> {
    let Some(map) = data.as_object() else {
        return Err("Post payload must be a JSON object".to_string());
    };

    let required: &[&str] = match kind {
        PostKind::Text => &["text"],
        PostKind::Streak => &["days"],
        PostKind::DaySummary => &["cards", "duration"],
        PostKind::DayCards => {
            if !map.contains_key("cards") && !map.contains_key("cards_unique") {
                return Err(format!(
                    "{kind} posts require \"cards\" or \"cards_unique\" in their payload"
                ));
            }
            &[]
        }
        PostKind::DayDuration => &["duration"],
    };

    for key in required {
        if !map.contains_key(*key) {
            return Err(format!("{kind} posts require \"{key}\" in their payload"));
        }
    }

    Ok(())
}

/// A post as it appears on the timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Uuid,
    /// When the post was published, as opposed to `content_date`.
    pub timestamp: DateTime<Utc>,
    pub post_kind: PostKind,
    /// "The most I ever got" marker; set by the caller, never derived
    /// here.
    pub achievement: bool,
    /// Which date the post is about.
    pub content_date: NaiveDate,
    /// In days; 1 is a single day, 7/14/30/365 are the usual windows.
    pub content_time_range: i32,
    /// Kind-dependent payload, see [`validate_payload`].
    pub data: Value,
    /// Without a comment the post still shows its stats.
    pub comment: Option<String>,
    #[serde(skip)]
    pub(crate) main_text_cache: OnceLock<Option<String>>,
}

impl Post {
    /// The lead text of the post, memoized per instance.
    ///
    /// Text posts fall back to an empty string when the payload has no
    /// "text" key; streak posts treat a missing "days" key as an error.
    /// Both behaviors are kept as the timeline has always shown them.
    /// The stat-only kinds have no text template yet and yield None.
    // TODO text variants for day/day_cards/day_duration and for the
    // content_time_range windows
    pub fn main_text(&self, author: &User) -> ApiResult<Option<String>> {
        if let Some(cached) = self.main_text_cache.get() {
            return Ok(cached.clone());
        }

        let text = match self.post_kind {
            PostKind::Text => Some(
                self.data
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
            PostKind::Streak => {
                let days = self.data.get("days").ok_or_else(|| {
                    ApiError::Validation(
                        "Streak post payload has no \"days\" value".to_string(),
                    )
                })?;
                Some(format!(
                    "{} reached a streak of {} days!",
                    author.display_name(),
                    plain_value(days)
                ))
            }
            PostKind::DaySummary | PostKind::DayCards | PostKind::DayDuration => None,
        };

        let _ = self.main_text_cache.set(text.clone());
        Ok(text)
    }
}

impl Subject for Post {
    fn entity_kind() -> EntityKind {
        EntityKind::Post
    }

    fn entity_id(&self) -> Uuid {
        self.id
    }
}

/// Renders a payload value without JSON string quoting.
fn plain_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// New post creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
    pub user_id: Uuid,
    pub post_kind: PostKind,
    pub achievement: bool,
    pub content_date: NaiveDate,
    /// Defaults to a single day.
    pub content_time_range: Option<i32>,
    pub data: Value,
    pub comment: Option<String>,
}

/// A typed acknowledgement of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    #[default]
    Whee,
    Party,
    Cool,
}

impl ReactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Whee => "whee",
            ReactionKind::Party => "party",
            ReactionKind::Cool => "cool",
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whee" => Ok(ReactionKind::Whee),
            "party" => Ok(ReactionKind::Party),
            "cool" => Ok(ReactionKind::Cool),
            other => Err(format!("Unknown reaction kind: {other}")),
        }
    }
}

/// Reaction entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub id: Uuid,
    pub reaction_kind: ReactionKind,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Subject for Reaction {
    fn entity_kind() -> EntityKind {
        EntityKind::Reaction
    }

    fn entity_id(&self) -> Uuid {
        self.id
    }
}
