use serde::Deserialize;
use sqlx::SqlitePool;
use std::fs;

use crate::auth::hash_password;
use crate::models::recipe::{normalize_ingredient, title_format_errors, title_taken, IngredientLine, NewRecipe};
use crate::models::tag::normalize_tag;
use crate::models::{Category, Member};
use crate::routes::auth::{validate_password, validate_username};

#[derive(Deserialize)]
struct ImportedIngredient {
    name: String,
    #[serde(default)]
    quantity: f64,
    #[serde(default)]
    unit: String,
}

#[derive(Deserialize)]
struct ImportedRecipe {
    title: String,
    category: Category,
    source: Option<String>,
    url_link: Option<String>,
    short_description: Option<String>,
    content: Option<String>,
    cooking_time: Option<i64>,
    preparation_time: Option<i64>,
    resting_time: Option<i64>,
    image_ref: Option<String>,
    #[serde(default)]
    ingredients: Vec<ImportedIngredient>,
    #[serde(default)]
    tags: Vec<String>,
}

impl ImportedRecipe {
    fn into_new_recipe(self, author_id: &str) -> NewRecipe {
        let mut tags: Vec<String> = Vec::new();
        for tag in self.tags.iter().map(|t| normalize_tag(t)) {
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        NewRecipe {
            author_id: author_id.to_string(),
            title: self.title,
            category: self.category,
            source: self.source,
            url_link: self.url_link,
            short_description: self.short_description,
            content: self.content,
            cooking_time: self.cooking_time,
            preparation_time: self.preparation_time,
            resting_time: self.resting_time,
            image_ref: self.image_ref,
            ingredients: self
                .ingredients
                .into_iter()
                .map(|i| IngredientLine {
                    name: normalize_ingredient(&i.name),
                    quantity: i.quantity,
                    unit: i.unit,
                })
                .filter(|line| !line.name.is_empty())
                .collect(),
            tags,
        }
    }
}

/// Import recipes from a JSON array, all authored by `author_username`. Recipes whose
/// title is already taken or malformed are skipped; the rest land in one transaction.
pub async fn import_recipes(
    pool: &SqlitePool,
    file_path: &str,
    author_username: &str,
) -> Result<usize, Box<dyn std::error::Error>> {
    let author: Option<(String,)> = sqlx::query_as("SELECT id FROM members WHERE username = ?")
        .bind(author_username)
        .fetch_optional(pool)
        .await?;

    let Some((author_id,)) = author else {
        return Err(format!("Member '{author_username}' not found").into());
    };

    let content = fs::read_to_string(file_path)?;
    let recipes: Vec<ImportedRecipe> = serde_json::from_str(&content)?;

    let mut imported = 0;
    let mut tx = pool.begin().await?;

    for recipe in recipes {
        if recipe.title.trim().is_empty() {
            tracing::warn!("skipping recipe without a title");
            continue;
        }
        if let Some(e) = title_format_errors(&recipe.title).first() {
            tracing::warn!(title = %recipe.title, "skipping recipe: {e}");
            continue;
        }
        if title_taken(&mut tx, &recipe.title).await? {
            tracing::warn!(title = %recipe.title, "skipping recipe: title already used");
            continue;
        }

        recipe.into_new_recipe(&author_id).insert(&mut tx).await?;
        imported += 1;
    }

    tx.commit().await?;
    tracing::info!(imported, author = %author_username, "recipes imported");
    Ok(imported)
}

pub async fn create_member(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<Member, Box<dyn std::error::Error>> {
    if let Some(e) = validate_username(username).or_else(|| validate_password(password)) {
        return Err(e.into());
    }

    let member = Member::new(username.to_string());
    let password_hash = hash_password(password).map_err(|e| e.to_string())?;

    sqlx::query(
        "INSERT INTO members (id, username, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?)"
    )
    .bind(&member.id)
    .bind(&member.username)
    .bind(&password_hash)
    .bind(&member.created_at)
    .bind(&member.updated_at)
    .execute(pool)
    .await?;

    Ok(member)
}
