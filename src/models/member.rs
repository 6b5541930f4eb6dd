use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered member. The credential hash lives only in the `members` table and is
/// never loaded into this struct, so a `Member` is safe to keep in the session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Member {
    pub id: String,
    pub username: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Member {
    pub fn new(username: String) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.trim().to_string(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
