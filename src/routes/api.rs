//! JSON endpoints behind the recipe page controls. Every handler answers with a JSON body;
//! failures go through [`ApiError`] so callers always get `{"message": ...}`.

use askama::Template;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::auth::ApiMember;
use crate::error::{ApiError, MessageBody};
use crate::membership::{self, MembershipError, Outcome};
use crate::models::recipe::{title_format_errors, title_taken};
use crate::models::CollectionName;
use crate::routes::recipes::{HistoryForm, IngredientRow};
use crate::AppState;

#[derive(Template)]
#[template(path = "partials/ingredient_form.html")]
struct IngredientFormTemplate {
    row: IngredientRow,
}

#[derive(Deserialize)]
pub struct CollectionRequest {
    recipe_id: String,
    collection_name: String,
}

#[derive(Serialize)]
struct CollectionStatus {
    is_in_collection: bool,
}

#[derive(Deserialize)]
pub struct HistoryRequest {
    recipe_id: String,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Serialize)]
struct HistoryResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<HashMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    form_html: Option<String>,
}

#[derive(Deserialize)]
pub struct CheckTitleQuery {
    title: Option<String>,
}

#[derive(Serialize)]
struct TitleCheck {
    error_list: Vec<String>,
}

#[derive(Serialize)]
struct FormHtml {
    form_html: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/check-collection-status", post(check_collection_status))
        .route("/add-to-collection", post(add_to_collection))
        .route("/remove-from-collection", post(remove_from_collection))
        .route("/add-recipe-history", post(add_recipe_history))
        .route("/remove-recipe-history", post(remove_recipe_history))
        .route("/check-title", get(check_title))
        .route("/add-ingredient-form", get(add_ingredient_form))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

fn collection_of(name: &str) -> Result<CollectionName, ApiError> {
    name.parse::<CollectionName>()
        .map_err(|e| MembershipError::from(e).into())
}

/// The add/remove toggles only handle flag collections; dated history entries go through
/// the history endpoints.
fn toggle_collection_of(name: &str) -> Result<CollectionName, ApiError> {
    let collection = collection_of(name)?;
    if collection.is_dated() {
        return Err(ApiError::BadRequest(format!(
            "Use /api/add-recipe-history and /api/remove-recipe-history for your {}.",
            collection.title()
        )));
    }
    Ok(collection)
}

fn outcome_response(outcome: Outcome) -> Response {
    let status = match &outcome {
        Outcome::Added { .. } | Outcome::Removed { .. } => StatusCode::OK,
        Outcome::AlreadyExists { .. } => StatusCode::CONFLICT,
        Outcome::NotFound { .. } => StatusCode::NOT_FOUND,
    };
    (status, Json(MessageBody { message: outcome.message() })).into_response()
}

async fn check_collection_status(
    State(state): State<AppState>,
    ApiMember(member): ApiMember,
    payload: Result<Json<CollectionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    let collection = collection_of(&request.collection_name)?;

    let is_in_collection =
        membership::is_in_collection(&state.db, &member.id, &request.recipe_id, collection).await?;

    Ok(Json(CollectionStatus { is_in_collection }))
}

async fn add_to_collection(
    State(state): State<AppState>,
    ApiMember(member): ApiMember,
    payload: Result<Json<CollectionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    let collection = toggle_collection_of(&request.collection_name)?;

    let outcome =
        membership::add_to_collection(&state.db, &member.id, &request.recipe_id, collection, None)
            .await?;

    Ok(outcome_response(outcome))
}

async fn remove_from_collection(
    State(state): State<AppState>,
    ApiMember(member): ApiMember,
    payload: Result<Json<CollectionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;
    let collection = toggle_collection_of(&request.collection_name)?;

    let outcome = membership::remove_from_collection(
        &state.db,
        &member.id,
        &request.recipe_id,
        collection,
        None,
    )
    .await?;

    Ok(outcome_response(outcome))
}

fn date_errors(message: String) -> Option<HashMap<String, Vec<String>>> {
    Some(HashMap::from([("date".to_string(), vec![message])]))
}

async fn add_recipe_history(
    State(state): State<AppState>,
    ApiMember(member): ApiMember,
    payload: Result<Json<HistoryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;

    let outcome = match membership::add_to_collection(
        &state.db,
        &member.id,
        &request.recipe_id,
        CollectionName::History,
        request.date.as_deref(),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(MembershipError::InvalidArgument(message)) => {
            return Ok(Json(HistoryResponse {
                success: false,
                message: message.clone(),
                errors: date_errors(message),
                form_html: None,
            }));
        }
        Err(e) => return Err(e.into()),
    };

    let success = outcome.is_success();
    let form_html = HistoryForm::load(&state.db, &member.id, &request.recipe_id)
        .await?
        .render()?;

    Ok(Json(HistoryResponse {
        success,
        message: outcome.message(),
        errors: (!success).then(|| date_errors(outcome.message())).flatten(),
        form_html: Some(form_html),
    }))
}

async fn remove_recipe_history(
    State(state): State<AppState>,
    ApiMember(member): ApiMember,
    payload: Result<Json<HistoryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body(payload)?;

    let result = membership::remove_from_collection(
        &state.db,
        &member.id,
        &request.recipe_id,
        CollectionName::History,
        request.date.as_deref(),
    )
    .await;

    let form_html = HistoryForm::load(&state.db, &member.id, &request.recipe_id)
        .await?
        .render()?;

    let response = match result {
        Ok(outcome) => {
            let success = outcome.is_success();
            HistoryResponse {
                success,
                message: outcome.message(),
                errors: (!success).then(|| date_errors(outcome.message())).flatten(),
                form_html: Some(form_html),
            }
        }
        Err(MembershipError::InvalidArgument(message)) => HistoryResponse {
            success: false,
            message: message.clone(),
            errors: date_errors(message),
            form_html: Some(form_html),
        },
        Err(e) => return Err(e.into()),
    };

    Ok(Json(response))
}

async fn check_title(
    State(state): State<AppState>,
    Query(query): Query<CheckTitleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(title) = query.title else {
        return Err(ApiError::BadRequest("Missing 'title' parameter.".to_string()));
    };

    if title.trim().is_empty() {
        return Ok(Json(TitleCheck { error_list: Vec::new() }));
    }

    let mut error_list = title_format_errors(&title);
    let mut conn = state.db.acquire().await?;
    if title_taken(&mut conn, &title).await? {
        error_list.push("Title already used.".to_string());
    }

    Ok(Json(TitleCheck { error_list }))
}

async fn add_ingredient_form() -> Result<impl IntoResponse, ApiError> {
    let template = IngredientFormTemplate {
        row: IngredientRow::default(),
    };
    Ok(Json(FormHtml {
        form_html: template.render()?,
    }))
}
