use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use uuid::Uuid;

use super::tag::Tag;

pub const TITLE_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT")]
pub enum Category {
    #[serde(rename = "starter")]
    #[sqlx(rename = "starter")]
    Starter,
    #[serde(rename = "main")]
    #[sqlx(rename = "main")]
    Main,
    #[serde(rename = "dessert")]
    #[sqlx(rename = "dessert")]
    Dessert,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Starter, Category::Main, Category::Dessert];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Starter => "starter",
            Category::Main => "main",
            Category::Dessert => "dessert",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Starter => "Starter",
            Category::Main => "Main course",
            Category::Dessert => "Dessert",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starter" => Ok(Category::Starter),
            "main" => Ok(Category::Main),
            "dessert" => Ok(Category::Dessert),
            other => Err(format!("Unknown category '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Recipe {
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub title_key: String,
    pub category: Category,
    pub source: Option<String>,
    pub url_link: Option<String>,
    pub short_description: Option<String>,
    pub content: Option<String>,
    pub cooking_time: Option<i64>,
    pub preparation_time: Option<i64>,
    pub resting_time: Option<i64>,
    pub image_ref: Option<String>,
    pub edition_date: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Recipe {
    pub fn total_time(&self) -> Option<i64> {
        let parts = [self.cooking_time, self.preparation_time, self.resting_time];
        if parts.iter().all(Option::is_none) {
            return None;
        }
        Some(parts.iter().flatten().sum())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ingredient {
    pub id: String,
    pub name: String,
}

impl Ingredient {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: normalize_ingredient(name),
        }
    }
}

/// An ingredient line of a recipe joined with its ingredient name.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecipeIngredient {
    pub id: String,
    pub recipe_id: String,
    pub ingredient_id: String,
    pub name: String,
    pub position: i64,
    pub quantity: f64,
    pub unit: String,
}

/// One validated ingredient line of a recipe being created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientLine {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
}

/// A validated recipe ready to be written, with its ingredient lines and tag names.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub author_id: String,
    pub title: String,
    pub category: Category,
    pub source: Option<String>,
    pub url_link: Option<String>,
    pub short_description: Option<String>,
    pub content: Option<String>,
    pub cooking_time: Option<i64>,
    pub preparation_time: Option<i64>,
    pub resting_time: Option<i64>,
    pub image_ref: Option<String>,
    pub ingredients: Vec<IngredientLine>,
    pub tags: Vec<String>,
}

impl NewRecipe {
    /// Write the recipe, its ingredient lines and its tags, creating missing ingredients
    /// and tags on the way. Returns the new recipe id. A title clash surfaces as a
    /// unique violation on `recipes.title_key`.
    pub async fn insert(&self, conn: &mut SqliteConnection) -> Result<String, sqlx::Error> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let created_at = now.to_rfc3339();
        let title = normalize_title(&self.title);

        sqlx::query(
            r#"
            INSERT INTO recipes (id, author_id, title, title_key, category, source, url_link, short_description,
                content, cooking_time, preparation_time, resting_time, image_ref, edition_date, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&self.author_id)
        .bind(&title)
        .bind(title_key(&title))
        .bind(self.category)
        .bind(&self.source)
        .bind(&self.url_link)
        .bind(&self.short_description)
        .bind(&self.content)
        .bind(self.cooking_time)
        .bind(self.preparation_time)
        .bind(self.resting_time)
        .bind(&self.image_ref)
        .bind(now.format("%Y-%m-%d").to_string())
        .bind(&created_at)
        .bind(&created_at)
        .execute(&mut *conn)
        .await?;

        for (position, line) in self.ingredients.iter().enumerate() {
            let ingredient = Ingredient::new(&line.name);
            sqlx::query("INSERT OR IGNORE INTO ingredients (id, name) VALUES (?, ?)")
                .bind(&ingredient.id)
                .bind(&ingredient.name)
                .execute(&mut *conn)
                .await?;

            let (ingredient_id,): (String,) =
                sqlx::query_as("SELECT id FROM ingredients WHERE name = ?")
                    .bind(&ingredient.name)
                    .fetch_one(&mut *conn)
                    .await?;

            sqlx::query(
                "INSERT INTO recipe_ingredients (id, recipe_id, ingredient_id, position, quantity, unit) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(&ingredient_id)
            .bind(position as i64)
            .bind(line.quantity)
            .bind(line.unit.trim())
            .execute(&mut *conn)
            .await?;
        }

        for name in &self.tags {
            let tag = Tag::new(name);
            sqlx::query("INSERT OR IGNORE INTO tags (id, name, created_at) VALUES (?, ?, ?)")
                .bind(&tag.id)
                .bind(&tag.name)
                .bind(&tag.created_at)
                .execute(&mut *conn)
                .await?;

            sqlx::query(
                "INSERT OR IGNORE INTO recipe_tags (recipe_id, tag_id) SELECT ?, id FROM tags WHERE name = ?",
            )
            .bind(&id)
            .bind(&tag.name)
            .execute(&mut *conn)
            .await?;
        }

        Ok(id)
    }
}

pub async fn title_taken(conn: &mut SqliteConnection, title: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT id FROM recipes WHERE title_key = ?")
        .bind(title_key(title))
        .fetch_optional(conn)
        .await?;
    Ok(row.is_some())
}

pub async fn ingredients_of(
    conn: &mut SqliteConnection,
    recipe_id: &str,
) -> Result<Vec<RecipeIngredient>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT ri.id, ri.recipe_id, ri.ingredient_id, i.name, ri.position, ri.quantity, ri.unit
        FROM recipe_ingredients ri
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ?
        ORDER BY ri.position
        "#,
    )
    .bind(recipe_id)
    .fetch_all(conn)
    .await
}

pub async fn tags_of(conn: &mut SqliteConnection, recipe_id: &str) -> Result<Vec<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT t.name FROM tags t JOIN recipe_tags rt ON rt.tag_id = t.id WHERE rt.recipe_id = ? ORDER BY t.name",
    )
    .bind(recipe_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}

pub fn normalize_ingredient(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Canonical display form of a title: trimmed with runs of whitespace collapsed.
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key used for the uniqueness check, so "Apple  Pie" and "apple pie" collide.
pub fn title_key(title: &str) -> String {
    normalize_title(title).to_lowercase()
}

/// Format checks on a title, independent of uniqueness. A blank title yields no
/// message here; forms report the missing field themselves.
pub fn title_format_errors(title: &str) -> Vec<String> {
    let title = normalize_title(title);
    let len = title.chars().count();
    let mut errors = Vec::new();
    if len > TITLE_MAX_CHARS {
        errors.push(format!(
            "Ensure this value has at most {TITLE_MAX_CHARS} characters (it has {len})."
        ));
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_and_displays() {
        for category in Category::ALL {
            let parsed: Category = category.to_string().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert!("soup".parse::<Category>().is_err());
    }

    #[test]
    fn title_key_ignores_case_and_spacing() {
        assert_eq!(title_key("  Apple   Pie "), "apple pie");
        assert_eq!(title_key("apple pie"), title_key("APPLE PIE"));
        assert_eq!(normalize_title(" Tarte\tTatin  "), "Tarte Tatin");
    }

    #[test]
    fn title_format_errors_on_long_title() {
        assert!(title_format_errors("Short").is_empty());
        assert!(title_format_errors("").is_empty());
        let long = "x".repeat(TITLE_MAX_CHARS + 1);
        let errors = title_format_errors(&long);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("at most 100 characters (it has 101)"));
    }

    #[test]
    fn total_time_sums_known_parts() {
        let recipe = Recipe {
            id: "r".into(),
            author_id: "m".into(),
            title: "Soup".into(),
            title_key: "soup".into(),
            category: Category::Main,
            source: None,
            url_link: None,
            short_description: None,
            content: None,
            cooking_time: Some(30),
            preparation_time: None,
            resting_time: Some(10),
            image_ref: None,
            edition_date: "2024-01-01".into(),
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(recipe.total_time(), Some(40));
        let untimed = Recipe {
            cooking_time: None,
            resting_time: None,
            ..recipe
        };
        assert_eq!(untimed.total_time(), None);
    }
}
