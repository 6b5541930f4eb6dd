use askama::Template;
use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Query, Request, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::Utc;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Deserialize;
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashMap;

use crate::auth::{AuthMember, MaybeMember};
use crate::error::AppError;
use crate::media::{self, MediaError};
use crate::membership;
use crate::models::comment::MAX_SCORE;
use crate::models::recipe::{
    ingredients_of, normalize_ingredient, tags_of, title_format_errors, title_key, title_taken,
    IngredientLine, NewRecipe,
};
use crate::models::tag::{normalize_tag, parse_tag_list};
use crate::models::{Category, CollectionName, Comment, Member, Rating, Recipe, RecipeIngredient};
use crate::AppState;

const FEATURED_COUNT: usize = 2;
const THUMBNAIL_COUNT: usize = 12;
const COMMENT_MAX_CHARS: usize = 2000;
const UNIT_MAX_CHARS: usize = 30;

#[derive(Template)]
#[template(path = "welcome.html")]
struct WelcomeTemplate {
    featured: Vec<Recipe>,
    thumbnails: Vec<Recipe>,
    static_hash: &'static str,
    member: Option<Member>,
}

#[derive(Template)]
#[template(path = "recipes/form.html")]
struct RecipeFormTemplate {
    values: RecipeSubmission,
    categories: Vec<Category>,
    errors: HashMap<String, String>,
    static_hash: &'static str,
    member: Option<Member>,
}

#[derive(Template)]
#[template(path = "recipes/confirmation.html")]
struct ConfirmationTemplate {
    recipe: Option<Recipe>,
    static_hash: &'static str,
    member: Option<Member>,
}

#[derive(Template)]
#[template(path = "recipes/show.html")]
struct RecipeShowTemplate {
    recipe: Recipe,
    author_name: String,
    ingredients: Vec<RecipeIngredient>,
    tags: Vec<String>,
    comments: Vec<CommentView>,
    rating: RatingSummary,
    my_rating: Option<i64>,
    scores: Vec<ScoreOption>,
    history_html: String,
    static_hash: &'static str,
    member: Option<Member>,
}

#[derive(Template)]
#[template(path = "recipes/search.html")]
struct SearchTemplate {
    query: SearchQuery,
    categories: Vec<Category>,
    collections: Vec<CollectionName>,
    recipes: Vec<Recipe>,
    entries: Vec<SearchEntry>,
    searched_collection: bool,
    static_hash: &'static str,
    member: Option<Member>,
}

/// History add/remove fragment of the recipe page, also returned by the history API.
#[derive(Template)]
#[template(path = "partials/history_form.html")]
pub(crate) struct HistoryForm {
    pub recipe_id: String,
    pub dates: Vec<String>,
    pub today: String,
}

impl HistoryForm {
    pub(crate) async fn load(
        db: &sqlx::SqlitePool,
        member_id: &str,
        recipe_id: &str,
    ) -> Result<Self, membership::MembershipError> {
        Ok(Self {
            recipe_id: recipe_id.to_string(),
            dates: membership::history_dates(db, member_id, recipe_id).await?,
            today: Utc::now().format("%Y-%m-%d").to_string(),
        })
    }
}

#[derive(FromRow)]
struct CommentView {
    content: String,
    published_at: String,
    author_name: String,
}

impl CommentView {
    fn published_on(&self) -> &str {
        self.published_at.get(..10).unwrap_or(&self.published_at)
    }
}

struct ScoreOption {
    value: i64,
    selected: bool,
}

struct RatingSummary {
    average: Option<String>,
    count: i64,
}

#[derive(FromRow)]
struct SearchEntry {
    #[sqlx(flatten)]
    recipe: Recipe,
    owner_name: String,
    event_date: Option<String>,
}

/// One ingredient input row as typed by the member.
#[derive(Debug, Clone, Default)]
pub struct IngredientRow {
    pub name: String,
    pub quantity: String,
    pub unit: String,
}

impl IngredientRow {
    fn is_blank(&self) -> bool {
        self.name.trim().is_empty() && self.quantity.trim().is_empty() && self.unit.trim().is_empty()
    }
}

/// Raw recipe form values. The form repeats `name`/`quantity`/`unit` once per
/// ingredient row, so it is decoded from the ordered key/value pairs.
#[derive(Debug, Clone, Default)]
pub struct RecipeSubmission {
    pub title: String,
    pub category: String,
    pub source: String,
    pub url_link: String,
    pub short_description: String,
    pub content: String,
    pub cooking_time: String,
    pub preparation_time: String,
    pub resting_time: String,
    pub tags: String,
    pub ingredient_rows: Vec<IngredientRow>,
    pub add_to_album: bool,
    pub add_to_trials: bool,
    pub add_to_history: bool,
}

impl RecipeSubmission {
    fn blank() -> Self {
        Self {
            ingredient_rows: vec![IngredientRow::default()],
            add_to_album: true,
            ..Default::default()
        }
    }

    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut submission = Self::default();
        let mut names = Vec::new();
        let mut quantities = Vec::new();
        let mut units = Vec::new();

        for (key, value) in pairs {
            match key.as_str() {
                "title" => submission.title = value,
                "category" => submission.category = value,
                "source" => submission.source = value,
                "url_link" => submission.url_link = value,
                "short_description" => submission.short_description = value,
                "content" => submission.content = value,
                "cooking_time" => submission.cooking_time = value,
                "preparation_time" => submission.preparation_time = value,
                "resting_time" => submission.resting_time = value,
                "tags" => submission.tags = value,
                "name" => names.push(value),
                "quantity" => quantities.push(value),
                "unit" => units.push(value),
                "add_to_album" => submission.add_to_album = true,
                "add_to_trials" => submission.add_to_trials = true,
                "add_to_history" => submission.add_to_history = true,
                _ => {}
            }
        }

        let rows = names.len().max(quantities.len()).max(units.len());
        let mut names = names.into_iter();
        let mut quantities = quantities.into_iter();
        let mut units = units.into_iter();
        for _ in 0..rows {
            submission.ingredient_rows.push(IngredientRow {
                name: names.next().unwrap_or_default(),
                quantity: quantities.next().unwrap_or_default(),
                unit: units.next().unwrap_or_default(),
            });
        }

        submission
    }

    pub fn selected_collections(&self) -> Vec<CollectionName> {
        let mut selected = Vec::new();
        if self.add_to_album {
            selected.push(CollectionName::Album);
        }
        if self.add_to_trials {
            selected.push(CollectionName::Trials);
        }
        if self.add_to_history {
            selected.push(CollectionName::History);
        }
        selected
    }

    /// Check every field; on success the recipe is ready to insert.
    pub fn validate(&self, author_id: &str) -> Result<NewRecipe, HashMap<String, String>> {
        let mut errors = HashMap::new();

        if self.title.trim().is_empty() {
            errors.insert("title".to_string(), "Title is required".to_string());
        } else if let Some(e) = title_format_errors(&self.title).into_iter().next() {
            errors.insert("title".to_string(), e);
        }

        let category = self.category.parse::<Category>();
        if category.is_err() {
            errors.insert("category".to_string(), "Choose a category".to_string());
        }

        let url_link = optional(&self.url_link);
        if let Some(link) = &url_link {
            let valid = url::Url::parse(link)
                .map(|u| u.scheme() == "http" || u.scheme() == "https")
                .unwrap_or(false);
            if !valid {
                errors.insert("url_link".to_string(), "Enter a valid http(s) URL".to_string());
            }
        }

        let cooking_time = minutes("cooking_time", &self.cooking_time, &mut errors);
        let preparation_time = minutes("preparation_time", &self.preparation_time, &mut errors);
        let resting_time = minutes("resting_time", &self.resting_time, &mut errors);

        let mut ingredients = Vec::new();
        for row in self.ingredient_rows.iter().filter(|r| !r.is_blank()) {
            match ingredient_line(row) {
                Ok(line) => ingredients.push(line),
                Err(e) => {
                    errors.entry("ingredients".to_string()).or_insert(e);
                }
            }
        }

        if self.selected_collections().is_empty() {
            errors.insert(
                "collections".to_string(),
                "Select at least one collection".to_string(),
            );
        }

        match category {
            Ok(category) if errors.is_empty() => Ok(NewRecipe {
                author_id: author_id.to_string(),
                title: self.title.clone(),
                category,
                source: optional(&self.source),
                url_link,
                short_description: optional(&self.short_description),
                content: optional(&self.content),
                cooking_time,
                preparation_time,
                resting_time,
                image_ref: None,
                ingredients,
                tags: parse_tag_list(&self.tags),
            }),
            _ => Err(errors),
        }
    }
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn minutes(field: &str, raw: &str, errors: &mut HashMap<String, String>) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<i64>() {
        Ok(value) if value >= 0 => Some(value),
        _ => {
            errors.insert(field.to_string(), "Enter a whole number of minutes".to_string());
            None
        }
    }
}

fn ingredient_line(row: &IngredientRow) -> Result<IngredientLine, String> {
    let name = normalize_ingredient(&row.name);
    if name.is_empty() {
        return Err("Every ingredient needs a name".to_string());
    }
    let quantity = row
        .quantity
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|q| q.is_finite() && *q >= 0.0)
        .ok_or_else(|| format!("Enter a valid quantity for '{name}'"))?;
    let unit = row.unit.trim().to_string();
    if unit.chars().count() > UNIT_MAX_CHARS {
        return Err(format!("Unit must be under {UNIT_MAX_CHARS} characters"));
    }
    Ok(IngredientLine {
        name,
        quantity,
        unit,
    })
}

/// Shuffle `items` in an order that stays stable for the whole of `day`.
pub(crate) fn daily_shuffle<T>(items: &mut [T], day: i64) {
    let mut rng = StdRng::seed_from_u64(day as u64);
    items.shuffle(&mut rng);
}

fn current_day() -> i64 {
    Utc::now().timestamp().div_euclid(24 * 3600)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(welcome))
        .route("/welcome", get(welcome))
        .route("/recipes/new", get(new_recipe_form))
        .route(
            "/recipes",
            post(create_recipe).layer(DefaultBodyLimit::max(media::MAX_UPLOAD_BYTES)),
        )
        .route("/recipes/confirmation", get(confirmation))
        .route("/recipes/{id}", get(show_recipe))
        .route("/recipes/{id}/comments", post(add_comment))
        .route("/recipes/{id}/rating", post(rate_recipe))
        .route("/search", get(search))
}

async fn welcome(
    State(state): State<AppState>,
    MaybeMember(member): MaybeMember,
) -> Result<impl IntoResponse, AppError> {
    let mut recipes: Vec<Recipe> = sqlx::query_as("SELECT * FROM recipes ORDER BY id")
        .fetch_all(&state.db)
        .await?;

    daily_shuffle(&mut recipes, current_day());
    let mut thumbnails = recipes.split_off(recipes.len().min(FEATURED_COUNT));
    thumbnails.truncate(THUMBNAIL_COUNT);

    let template = WelcomeTemplate {
        featured: recipes,
        thumbnails,
        static_hash: crate::STATIC_HASH,
        member,
    };
    Ok(Html(template.render()?))
}

async fn new_recipe_form(AuthMember(member): AuthMember) -> Result<impl IntoResponse, AppError> {
    let template = RecipeFormTemplate {
        values: RecipeSubmission::blank(),
        categories: Category::ALL.to_vec(),
        errors: HashMap::new(),
        static_hash: crate::STATIC_HASH,
        member: Some(member),
    };
    Ok(Html(template.render()?))
}

/// Recipe form body: the text fields as ordered pairs plus the optional picture.
/// The page posts `multipart/form-data`; a plain urlencoded form is accepted too.
pub struct RecipeUpload {
    pairs: Vec<(String, String)>,
    image: Option<Vec<u8>>,
}

impl<S> FromRequest<S> for RecipeUpload
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Self { pairs, image: None });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let mut pairs = Vec::new();
        let mut image = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(IntoResponse::into_response)?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            if name == "image" {
                let bytes = field.bytes().await.map_err(IntoResponse::into_response)?;
                if !bytes.is_empty() {
                    image = Some(bytes.to_vec());
                }
            } else {
                let value = field.text().await.map_err(IntoResponse::into_response)?;
                pairs.push((name, value));
            }
        }

        Ok(Self { pairs, image })
    }
}

async fn create_recipe(
    State(state): State<AppState>,
    AuthMember(member): AuthMember,
    RecipeUpload { pairs, image }: RecipeUpload,
) -> Result<impl IntoResponse, AppError> {
    let mut values = RecipeSubmission::from_pairs(pairs);
    let picture = match image {
        Some(bytes) => media::compress(bytes).await.map(Some),
        None => Ok(None),
    };

    let errors = match (values.validate(&member.id), picture) {
        (Ok(new_recipe), Ok(picture)) => {
            let collections = values.selected_collections();
            match save_recipe(&state, &member, new_recipe, picture, &collections).await? {
                Ok(recipe_id) => {
                    let target = format!("/recipes/confirmation?id={recipe_id}");
                    return Ok(Redirect::to(&target).into_response());
                }
                Err(errors) => errors,
            }
        }
        (validated, picture) => {
            let mut errors = validated.err().unwrap_or_default();
            match picture {
                Err(MediaError::Decode(e)) => {
                    tracing::debug!("rejected picture upload: {e}");
                    errors.insert("image".to_string(), "Please upload a valid image.".to_string());
                }
                Err(e) => return Err(e.into()),
                Ok(_) => {}
            }
            errors
        }
    };

    if values.ingredient_rows.is_empty() {
        values.ingredient_rows.push(IngredientRow::default());
    }

    let template = RecipeFormTemplate {
        values,
        categories: Category::ALL.to_vec(),
        errors,
        static_hash: crate::STATIC_HASH,
        member: Some(member),
    };
    Ok(Html(template.render()?).into_response())
}

/// Insert the recipe, its picture and the author's initial collection entries in one
/// transaction. A title clash comes back as form errors.
async fn save_recipe(
    state: &AppState,
    member: &Member,
    mut new_recipe: NewRecipe,
    picture: Option<Vec<u8>>,
    collections: &[CollectionName],
) -> Result<Result<String, HashMap<String, String>>, AppError> {
    let mut tx = state.db.begin().await?;

    if title_taken(&mut tx, &new_recipe.title).await? {
        return Ok(Err(title_clash()));
    }

    if let Some(jpeg) = picture {
        new_recipe.image_ref = Some(media::save_jpeg(&state.media_dir, &jpeg).await?);
    }

    let saved = match insert_with_entries(&mut tx, &new_recipe, &member.id, collections).await {
        Ok(recipe_id) => tx.commit().await.map(|()| recipe_id).map_err(AppError::from),
        Err(e) => Err(e),
    };

    match saved {
        Ok(recipe_id) => {
            tracing::info!(member_id = %member.id, %recipe_id, "recipe created");
            Ok(Ok(recipe_id))
        }
        Err(e) => {
            if let Some(file_name) = &new_recipe.image_ref {
                media::discard(&state.media_dir, file_name).await;
            }
            match e {
                AppError::Database(db) if is_unique_violation(&db) => Ok(Err(title_clash())),
                e => Err(e),
            }
        }
    }
}

async fn insert_with_entries(
    conn: &mut SqliteConnection,
    new_recipe: &NewRecipe,
    member_id: &str,
    collections: &[CollectionName],
) -> Result<String, AppError> {
    let recipe_id = new_recipe.insert(&mut *conn).await?;

    let today = Utc::now().format("%Y-%m-%d").to_string();
    for &collection in collections {
        let date = collection.is_dated().then_some(today.as_str());
        membership::add_to_collection_with(&mut *conn, member_id, &recipe_id, collection, date)
            .await?;
    }

    Ok(recipe_id)
}

fn title_clash() -> HashMap<String, String> {
    HashMap::from([("title".to_string(), "Title already used.".to_string())])
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[derive(Deserialize)]
pub struct ConfirmationQuery {
    id: Option<String>,
}

async fn confirmation(
    State(state): State<AppState>,
    AuthMember(member): AuthMember,
    Query(query): Query<ConfirmationQuery>,
) -> Result<impl IntoResponse, AppError> {
    let recipe: Option<Recipe> = match &query.id {
        Some(id) => {
            sqlx::query_as("SELECT * FROM recipes WHERE id = ?")
                .bind(id)
                .fetch_optional(&state.db)
                .await?
        }
        None => None,
    };

    let template = ConfirmationTemplate {
        recipe,
        static_hash: crate::STATIC_HASH,
        member: Some(member),
    };
    Ok(Html(template.render()?))
}

async fn show_recipe(
    State(state): State<AppState>,
    MaybeMember(member): MaybeMember,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let recipe: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.db)
        .await?;

    let Some(recipe) = recipe else {
        return Err(AppError::NotFound);
    };

    let (author_name,): (String,) = sqlx::query_as("SELECT username FROM members WHERE id = ?")
        .bind(&recipe.author_id)
        .fetch_one(&state.db)
        .await?;

    let mut conn = state.db.acquire().await?;
    let ingredients = ingredients_of(&mut conn, &id).await?;
    let tags = tags_of(&mut conn, &id).await?;
    drop(conn);

    let comments: Vec<CommentView> = sqlx::query_as(
        r#"
        SELECT c.content, c.published_at, m.username AS author_name
        FROM comments c
        JOIN members m ON m.id = c.author_id
        WHERE c.recipe_id = ?
        ORDER BY c.published_at
        "#
    )
    .bind(&id)
    .fetch_all(&state.db)
    .await?;

    let (average, count): (Option<f64>, i64) =
        sqlx::query_as("SELECT AVG(score), COUNT(*) FROM ratings WHERE recipe_id = ?")
            .bind(&id)
            .fetch_one(&state.db)
            .await?;

    let (my_rating, history) = match &member {
        Some(m) => {
            let rating: Option<Rating> =
                sqlx::query_as("SELECT * FROM ratings WHERE author_id = ? AND recipe_id = ?")
                    .bind(&m.id)
                    .bind(&id)
                    .fetch_optional(&state.db)
                    .await?;
            (rating.map(|r| r.score), HistoryForm::load(&state.db, &m.id, &id).await?)
        }
        None => (
            None,
            HistoryForm {
                recipe_id: id.clone(),
                dates: Vec::new(),
                today: Utc::now().format("%Y-%m-%d").to_string(),
            },
        ),
    };

    let template = RecipeShowTemplate {
        recipe,
        author_name,
        ingredients,
        tags,
        comments,
        rating: RatingSummary {
            average: average.map(|a| format!("{a:.1}")),
            count,
        },
        my_rating,
        scores: (0..=MAX_SCORE)
            .map(|value| ScoreOption {
                value,
                selected: my_rating == Some(value),
            })
            .collect(),
        history_html: history.render()?,
        static_hash: crate::STATIC_HASH,
        member,
    };
    Ok(Html(template.render()?))
}

#[derive(Deserialize)]
pub struct CommentForm {
    content: String,
}

async fn add_comment(
    State(state): State<AppState>,
    AuthMember(member): AuthMember,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> Result<impl IntoResponse, AppError> {
    let content = form.content.trim();
    let target = format!("/recipes/{id}");

    if content.is_empty() || content.chars().count() > COMMENT_MAX_CHARS {
        return Ok(Redirect::to(&target));
    }

    let comment = Comment::new(member.id, id, content);
    let result = sqlx::query(
        r#"
        INSERT INTO comments (id, author_id, recipe_id, content, published_at)
        SELECT ?, ?, id, ?, ? FROM recipes WHERE id = ?
        "#
    )
    .bind(&comment.id)
    .bind(&comment.author_id)
    .bind(&comment.content)
    .bind(&comment.published_at)
    .bind(&comment.recipe_id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(Redirect::to(&target))
}

#[derive(Deserialize)]
pub struct RatingForm {
    score: String,
}

async fn rate_recipe(
    State(state): State<AppState>,
    AuthMember(member): AuthMember,
    Path(id): Path<String>,
    Form(form): Form<RatingForm>,
) -> Result<impl IntoResponse, AppError> {
    let target = format!("/recipes/{id}");

    let Some(score) = form
        .score
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|s| (0..=MAX_SCORE).contains(s))
    else {
        return Ok(Redirect::to(&target));
    };

    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        r#"
        INSERT INTO ratings (author_id, recipe_id, score, rated_at)
        SELECT ?, id, ?, ? FROM recipes WHERE id = ?
        ON CONFLICT (author_id, recipe_id) DO UPDATE SET score = excluded.score, rated_at = excluded.rated_at
        "#
    )
    .bind(&member.id)
    .bind(score)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    Ok(Redirect::to(&target))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub ingredient: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub scope: String,
}

async fn search(
    State(state): State<AppState>,
    MaybeMember(member): MaybeMember,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let title = Some(title_key(&query.title)).filter(|s| !s.is_empty());
    let category = query.category.parse::<Category>().ok();
    let ingredient = Some(normalize_ingredient(&query.ingredient)).filter(|s| !s.is_empty());
    let tag = Some(normalize_tag(&query.tag)).filter(|s| !s.is_empty());
    let collection = query.collection.parse::<CollectionName>().ok();

    let mut recipes = Vec::new();
    let mut entries = Vec::new();

    match (collection, &member) {
        (Some(collection), Some(m)) => {
            let scope = if query.scope == "friends" { "friends" } else { "mine" };
            entries = sqlx::query_as::<_, SearchEntry>(
                r#"
                SELECT r.*, m.username AS owner_name, ce.event_date AS event_date
                FROM collection_entries ce
                JOIN recipes r ON r.id = ce.recipe_id
                JOIN members m ON m.id = ce.member_id
                WHERE ce.collection_name = ?
                  AND ((? = 'mine' AND ce.member_id = ?)
                    OR (? = 'friends' AND ce.member_id IN (SELECT friend_id FROM friendships WHERE member_id = ?)))
                  AND (? IS NULL OR instr(r.title_key, ?) > 0)
                  AND (? IS NULL OR r.category = ?)
                  AND (? IS NULL OR EXISTS (
                      SELECT 1 FROM recipe_ingredients ri
                      JOIN ingredients i ON i.id = ri.ingredient_id
                      WHERE ri.recipe_id = r.id AND instr(i.name, ?) > 0))
                  AND (? IS NULL OR EXISTS (
                      SELECT 1 FROM recipe_tags rt
                      JOIN tags t ON t.id = rt.tag_id
                      WHERE rt.recipe_id = r.id AND t.name = ?))
                ORDER BY ce.event_date DESC, r.title_key, m.username
                "#
            )
            .bind(collection)
            .bind(scope)
            .bind(&m.id)
            .bind(scope)
            .bind(&m.id)
            .bind(&title)
            .bind(&title)
            .bind(category)
            .bind(category)
            .bind(&ingredient)
            .bind(&ingredient)
            .bind(&tag)
            .bind(&tag)
            .fetch_all(&state.db)
            .await?;
        }
        _ => {
            recipes = sqlx::query_as::<_, Recipe>(
                r#"
                SELECT r.* FROM recipes r
                WHERE (? IS NULL OR instr(r.title_key, ?) > 0)
                  AND (? IS NULL OR r.category = ?)
                  AND (? IS NULL OR EXISTS (
                      SELECT 1 FROM recipe_ingredients ri
                      JOIN ingredients i ON i.id = ri.ingredient_id
                      WHERE ri.recipe_id = r.id AND instr(i.name, ?) > 0))
                  AND (? IS NULL OR EXISTS (
                      SELECT 1 FROM recipe_tags rt
                      JOIN tags t ON t.id = rt.tag_id
                      WHERE rt.recipe_id = r.id AND t.name = ?))
                ORDER BY r.title_key
                "#
            )
            .bind(&title)
            .bind(&title)
            .bind(category)
            .bind(category)
            .bind(&ingredient)
            .bind(&ingredient)
            .bind(&tag)
            .bind(&tag)
            .fetch_all(&state.db)
            .await?;
        }
    }

    let template = SearchTemplate {
        searched_collection: collection.is_some() && member.is_some(),
        query,
        categories: Category::ALL.to_vec(),
        collections: CollectionName::ALL.to_vec(),
        recipes,
        entries,
        static_hash: crate::STATIC_HASH,
        member,
    };
    Ok(Html(template.render()?))
}
