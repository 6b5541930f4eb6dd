use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub recipe_id: String,
    pub content: String,
    pub published_at: String,
}

impl Comment {
    pub fn new(author_id: String, recipe_id: String, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author_id,
            recipe_id,
            content: content.trim().to_string(),
            published_at: Utc::now().to_rfc3339(),
        }
    }
}

/// One member's score for one recipe, 0 to 5 stars.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rating {
    pub author_id: String,
    pub recipe_id: String,
    pub score: i64,
    pub rated_at: String,
}

pub const MAX_SCORE: i64 = 5;
