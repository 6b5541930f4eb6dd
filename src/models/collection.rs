use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The three named recipe groupings a member owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum CollectionName {
    #[serde(rename = "album")]
    #[sqlx(rename = "album")]
    Album,
    #[serde(rename = "trials")]
    #[sqlx(rename = "trials")]
    Trials,
    #[serde(rename = "history")]
    #[sqlx(rename = "history")]
    History,
}

impl CollectionName {
    pub const ALL: [CollectionName; 3] = [
        CollectionName::Album,
        CollectionName::Trials,
        CollectionName::History,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::Album => "album",
            CollectionName::Trials => "trials",
            CollectionName::History => "history",
        }
    }

    /// Human title used in pages and notification messages.
    pub fn title(&self) -> &'static str {
        match self {
            CollectionName::Album => "recipe album",
            CollectionName::Trials => "list of recipes to try",
            CollectionName::History => "recipe history",
        }
    }

    /// History rows are dated and may repeat per recipe; the others are plain flags.
    pub fn is_dated(&self) -> bool {
        matches!(self, CollectionName::History)
    }
}

impl std::fmt::Display for CollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CollectionName {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "album" => Ok(CollectionName::Album),
            "trials" => Ok(CollectionName::Trials),
            "history" => Ok(CollectionName::History),
            other => Err(UnknownCollection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown collection '{0}'")]
pub struct UnknownCollection(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CollectionEntry {
    pub id: String,
    pub member_id: String,
    pub recipe_id: String,
    pub collection_name: CollectionName,
    pub event_date: Option<String>,
    pub personal_note: Option<String>,
    pub created_at: String,
}

impl CollectionEntry {
    pub fn new(
        member_id: String,
        recipe_id: String,
        collection_name: CollectionName,
        event_date: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            member_id,
            recipe_id,
            collection_name,
            event_date,
            personal_note: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}
