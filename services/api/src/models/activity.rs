//! Activity log model and rendering
//!
//! Every security-sensitive account action leaves one immutable entry
//! here. Entries point at their subject through a (kind, id) pair so any
//! entity can be journaled without a polymorphic foreign key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::warn;
use uuid::Uuid;

/// Action tag written when a password reset is requested.
pub const ACTION_PASSWORD_RESET: &str = "user.password.reset";

/// Action tag written when the app API token is regenerated.
pub const ACTION_TOKEN_RESET: &str = "user.token.reset";

/// Curated descriptions for the known action tags. The set is
/// open-ended: tags outside this list still render, as themselves.
const ACTIONS: &[(&str, &str)] = &[
    (ACTION_PASSWORD_RESET, "Password reset email was sent."),
    (ACTION_TOKEN_RESET, "API token was reset"),
];

/// The kinds of entities a log entry can be about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Post,
    Reaction,
    Score,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Post => "post",
            EntityKind::Reaction => "reaction",
            EntityKind::Score => "score",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(EntityKind::User),
            "post" => Ok(EntityKind::Post),
            "reaction" => Ok(EntityKind::Reaction),
            "score" => Ok(EntityKind::Score),
            other => Err(format!("Unknown entity kind: {other}")),
        }
    }
}

/// A reference to exactly one entity of any registered kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

/// Implemented by every model that can be the subject of a log entry.
pub trait Subject {
    fn entity_kind() -> EntityKind;
    fn entity_id(&self) -> Uuid;

    fn entity_ref(&self) -> EntityRef {
        EntityRef {
            kind: Self::entity_kind(),
            id: self.entity_id(),
        }
    }
}

/// One immutable audit record. There is deliberately no update path for
/// these rows anywhere in the crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: Uuid,
    /// Acting user; None means the action was system-initiated.
    pub actor_id: Option<Uuid>,
    pub subject_kind: EntityKind,
    pub subject_id: Uuid,
    /// Server-assigned at creation.
    pub timestamp: DateTime<Utc>,
    pub action_type: String,
    /// Serialized structured payload, if any was supplied.
    pub data: Option<String>,
    #[serde(skip)]
    pub(crate) payload_cache: OnceLock<Map<String, Value>>,
}

impl ActivityLog {
    /// The decoded structured payload, or an empty mapping when none was
    /// stored. Parsed on first access and memoized for the lifetime of
    /// this instance. Malformed stored text degrades to an empty mapping
    /// with a warning rather than failing the read.
    pub fn payload(&self) -> &Map<String, Value> {
        self.payload_cache.get_or_init(|| {
            let Some(raw) = &self.data else {
                return Map::new();
            };
            match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    warn!("Activity log {} payload is not a JSON object", self.id);
                    Map::new()
                }
                Err(e) => {
                    warn!("Could not decode activity log {} payload: {}", self.id, e);
                    Map::new()
                }
            }
        })
    }

    /// Human-readable description of the logged action.
    ///
    /// Unmapped tags warn and fall back to the raw tag, so future action
    /// types degrade instead of breaking rendering.
    pub fn display(&self) -> String {
        if let Some((_, text)) = ACTIONS.iter().find(|(tag, _)| *tag == self.action_type) {
            return (*text).to_string();
        }
        warn!("Unknown log action \"{}\"", self.action_type);
        self.action_type.clone()
    }
}

impl fmt::Display for ActivityLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ActivityLog(actor={:?}, subject={}/{}, action_type={})",
            self.actor_id, self.subject_kind, self.subject_id, self.action_type
        )
    }
}
