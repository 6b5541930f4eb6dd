use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: normalize_tag(name),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

pub fn normalize_tag(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Split a comma separated tag field into distinct normalized names, keeping input order.
pub fn parse_tag_list(input: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in input.split(',').map(normalize_tag).filter(|s| !s.is_empty()) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
