//! Daily score model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::activity::{EntityKind, Subject};

/// One daily point value. No negativity allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub id: Uuid,
    pub score: i32,
    /// The day the points apply to.
    pub date: NaiveDate,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Subject for Score {
    fn entity_kind() -> EntityKind {
        EntityKind::Score
    }

    fn entity_id(&self) -> Uuid {
        self.id
    }
}

/// New score creation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewScore {
    pub user_id: Uuid,
    pub score: i32,
    pub date: NaiveDate,
}
