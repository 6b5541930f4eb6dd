//! Collection membership: whether a recipe sits in one of a member's collections, and the
//! add/remove transitions on that state.
//!
//! `album` and `trials` hold at most one entry per (member, recipe). `history` holds one
//! entry per date the recipe was made. Both rules are unique indexes in the store, and
//! every mutation below is a single statement, so two identical concurrent requests can
//! never both succeed.
//!
//! Expected outcomes (already present, nothing to remove) come back as [`Outcome`]
//! variants. Only bad input and store failures are errors.

use chrono::NaiveDate;
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use crate::models::{CollectionEntry, CollectionName, Recipe, UnknownCollection};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Recipe '{0}' not found")]
    RecipeNotFound(String),
    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
}

impl From<UnknownCollection> for MembershipError {
    fn from(e: UnknownCollection) -> Self {
        MembershipError::InvalidArgument(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Added {
        collection: CollectionName,
        date: Option<NaiveDate>,
    },
    AlreadyExists {
        collection: CollectionName,
        date: Option<NaiveDate>,
    },
    /// `count` is the number of rows deleted; bulk history removal may delete zero.
    Removed {
        collection: CollectionName,
        date: Option<NaiveDate>,
        count: u64,
    },
    NotFound {
        collection: CollectionName,
        date: Option<NaiveDate>,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Added { .. } | Outcome::Removed { .. })
    }

    /// Short notification text shown to the member.
    pub fn message(&self) -> String {
        match self {
            Outcome::Added { collection, date: Some(date) } => {
                format!("The recipe was added to your {} on {date}.", collection.title())
            }
            Outcome::Added { collection, date: None } => {
                format!("The recipe was added to your {}.", collection.title())
            }
            Outcome::AlreadyExists { collection, date: Some(date) } => {
                format!("The recipe is already in your {} on {date}.", collection.title())
            }
            Outcome::AlreadyExists { collection, date: None } => {
                format!("The recipe is already in your {}.", collection.title())
            }
            Outcome::Removed { collection, date: Some(date), .. } => {
                format!("The recipe was removed from your {} for {date}.", collection.title())
            }
            Outcome::Removed { collection, date: None, count: 0 } => {
                format!("The recipe was not in your {}.", collection.title())
            }
            Outcome::Removed { collection, date: None, .. } => {
                format!("The recipe was removed from your {}.", collection.title())
            }
            Outcome::NotFound { collection, date: Some(date) } => {
                format!("The recipe is not in your {} for {date}.", collection.title())
            }
            Outcome::NotFound { collection, date: None } => {
                format!("The recipe is not in your {}.", collection.title())
            }
        }
    }
}

/// Optional narrowing of a collection listing.
#[derive(Debug, Clone, Default)]
pub struct CollectionFilter {
    /// Case-insensitive substring of the title.
    pub title: Option<String>,
    /// Exact (normalized) tag name.
    pub tag: Option<String>,
}

impl CollectionFilter {
    fn title_needle(&self) -> Option<String> {
        self.title
            .as_deref()
            .map(crate::models::recipe::title_key)
            .filter(|s| !s.is_empty())
    }

    fn tag_name(&self) -> Option<String> {
        self.tag
            .as_deref()
            .map(crate::models::tag::normalize_tag)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CollectionItem {
    #[sqlx(flatten)]
    pub recipe: Recipe,
    /// Set for history entries only.
    pub event_date: Option<String>,
    pub added_at: String,
}

pub fn parse_event_date(input: &str) -> Result<NaiveDate, MembershipError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| {
        MembershipError::InvalidArgument(format!(
            "'{}' is not a valid date, expected YYYY-MM-DD",
            input.trim()
        ))
    })
}

/// Validate the date against the collection kind. Blank input counts as absent.
fn checked_date(
    collection: CollectionName,
    date: Option<&str>,
    required: bool,
) -> Result<Option<NaiveDate>, MembershipError> {
    let date = date.map(str::trim).filter(|s| !s.is_empty());
    match (collection.is_dated(), date) {
        (true, Some(raw)) => parse_event_date(raw).map(Some),
        (true, None) if required => Err(MembershipError::InvalidArgument(format!(
            "A date is required for your {}",
            collection.title()
        ))),
        (true, None) => Ok(None),
        (false, Some(_)) => Err(MembershipError::InvalidArgument(format!(
            "Your {} does not take a date",
            collection.title()
        ))),
        (false, None) => Ok(None),
    }
}

async fn recipe_exists(conn: &mut SqliteConnection, recipe_id: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT id FROM recipes WHERE id = ?")
        .bind(recipe_id)
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

pub async fn is_in_collection(
    db: &SqlitePool,
    member_id: &str,
    recipe_id: &str,
    collection: CollectionName,
) -> Result<bool, MembershipError> {
    let (found,): (i64,) = sqlx::query_as(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM collection_entries
            WHERE member_id = ? AND recipe_id = ? AND collection_name = ?
        )
        "#,
    )
    .bind(member_id)
    .bind(recipe_id)
    .bind(collection)
    .fetch_one(db)
    .await?;

    Ok(found != 0)
}

pub async fn add_to_collection(
    db: &SqlitePool,
    member_id: &str,
    recipe_id: &str,
    collection: CollectionName,
    date: Option<&str>,
) -> Result<Outcome, MembershipError> {
    let mut conn = db.acquire().await?;
    add_to_collection_with(&mut conn, member_id, recipe_id, collection, date).await
}

/// Same as [`add_to_collection`] on a caller-held connection, so the entry can join an
/// open transaction.
pub async fn add_to_collection_with(
    conn: &mut SqliteConnection,
    member_id: &str,
    recipe_id: &str,
    collection: CollectionName,
    date: Option<&str>,
) -> Result<Outcome, MembershipError> {
    let date = checked_date(collection, date, true)?;

    if !recipe_exists(&mut *conn, recipe_id).await? {
        return Err(MembershipError::RecipeNotFound(recipe_id.to_string()));
    }

    let entry = CollectionEntry::new(
        member_id.to_string(),
        recipe_id.to_string(),
        collection,
        date.map(|d| d.format(DATE_FORMAT).to_string()),
    );

    let result = sqlx::query(
        r#"
        INSERT INTO collection_entries (id, member_id, recipe_id, collection_name, event_date, personal_note, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.member_id)
    .bind(&entry.recipe_id)
    .bind(entry.collection_name)
    .bind(&entry.event_date)
    .bind(&entry.personal_note)
    .bind(&entry.created_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        tracing::debug!(member_id, recipe_id, %collection, "collection entry already present");
        return Ok(Outcome::AlreadyExists { collection, date });
    }

    tracing::info!(member_id, recipe_id, %collection, "collection entry added");
    Ok(Outcome::Added { collection, date })
}

/// Remove a recipe from a collection. For `history`, a date removes that one entry and
/// no date removes every date (a no-op success when there are none).
pub async fn remove_from_collection(
    db: &SqlitePool,
    member_id: &str,
    recipe_id: &str,
    collection: CollectionName,
    date: Option<&str>,
) -> Result<Outcome, MembershipError> {
    let date = checked_date(collection, date, false)?;

    let result = match date {
        Some(day) => {
            sqlx::query(
                r#"
                DELETE FROM collection_entries
                WHERE member_id = ? AND recipe_id = ? AND collection_name = ? AND event_date = ?
                "#,
            )
            .bind(member_id)
            .bind(recipe_id)
            .bind(collection)
            .bind(day.format(DATE_FORMAT).to_string())
            .execute(db)
            .await?
        }
        None => {
            sqlx::query(
                "DELETE FROM collection_entries WHERE member_id = ? AND recipe_id = ? AND collection_name = ?",
            )
            .bind(member_id)
            .bind(recipe_id)
            .bind(collection)
            .execute(db)
            .await?
        }
    };

    let count = result.rows_affected();
    let bulk = collection.is_dated() && date.is_none();

    if count == 0 && !bulk {
        tracing::debug!(member_id, recipe_id, %collection, "no collection entry to remove");
        return Ok(Outcome::NotFound { collection, date });
    }

    tracing::info!(member_id, recipe_id, %collection, count, "collection entries removed");
    Ok(Outcome::Removed {
        collection,
        date,
        count,
    })
}

/// A member's collection, newest first: by entry creation for `album`/`trials`,
/// by event date then creation for `history`.
pub async fn list_collection(
    db: &SqlitePool,
    member_id: &str,
    collection: CollectionName,
    filter: &CollectionFilter,
) -> Result<Vec<CollectionItem>, MembershipError> {
    let title = filter.title_needle();
    let tag = filter.tag_name();

    let items: Vec<CollectionItem> = sqlx::query_as(
        r#"
        SELECT r.*, ce.event_date AS event_date, ce.created_at AS added_at
        FROM collection_entries ce
        JOIN recipes r ON r.id = ce.recipe_id
        WHERE ce.member_id = ? AND ce.collection_name = ?
          AND (? IS NULL OR instr(r.title_key, ?) > 0)
          AND (? IS NULL OR EXISTS (
              SELECT 1 FROM recipe_tags rt
              JOIN tags t ON t.id = rt.tag_id
              WHERE rt.recipe_id = r.id AND t.name = ?
          ))
        ORDER BY ce.event_date DESC, ce.created_at DESC, ce.rowid DESC
        "#,
    )
    .bind(member_id)
    .bind(collection)
    .bind(&title)
    .bind(&title)
    .bind(&tag)
    .bind(&tag)
    .fetch_all(db)
    .await?;

    Ok(items)
}

/// Dates on which the member recorded making the recipe, newest first.
pub async fn history_dates(
    db: &SqlitePool,
    member_id: &str,
    recipe_id: &str,
) -> Result<Vec<String>, MembershipError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT event_date FROM collection_entries
        WHERE member_id = ? AND recipe_id = ? AND collection_name = 'history'
        ORDER BY event_date DESC
        "#,
    )
    .bind(member_id)
    .bind(recipe_id)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(|(date,)| date).collect())
}
