use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect},
    routing::get,
    Router,
};
use serde::Deserialize;

use crate::auth::AuthMember;
use crate::error::AppError;
use crate::membership::{self, CollectionFilter, CollectionItem};
use crate::models::{CollectionName, Member};
use crate::AppState;

#[derive(Template)]
#[template(path = "collections/show.html")]
struct CollectionShowTemplate {
    owner: Member,
    is_own: bool,
    collection: CollectionName,
    collections: Vec<CollectionName>,
    items: Vec<CollectionItem>,
    filter: ListingQuery,
    static_hash: &'static str,
    member: Option<Member>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingQuery {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tag: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/members/{member_id}/collections/{name}", get(show_collection))
}

/// A member's own collections and those of their friends are visible; anyone else's are not.
async fn can_view(db: &sqlx::SqlitePool, viewer: &Member, owner_id: &str) -> Result<bool, sqlx::Error> {
    if viewer.id == owner_id {
        return Ok(true);
    }
    let row: Option<(String,)> =
        sqlx::query_as("SELECT friend_id FROM friendships WHERE member_id = ? AND friend_id = ?")
            .bind(&viewer.id)
            .bind(owner_id)
            .fetch_optional(db)
            .await?;
    Ok(row.is_some())
}

async fn show_collection(
    State(state): State<AppState>,
    AuthMember(member): AuthMember,
    Path((member_id, name)): Path<(String, String)>,
    Query(filter): Query<ListingQuery>,
) -> Result<impl IntoResponse, AppError> {
    let Ok(collection) = name.parse::<CollectionName>() else {
        tracing::debug!(%name, "unknown collection requested");
        return Ok(Redirect::to("/").into_response());
    };

    let owner: Option<Member> = sqlx::query_as(
        "SELECT id, username, created_at, updated_at FROM members WHERE id = ?"
    )
    .bind(&member_id)
    .fetch_optional(&state.db)
    .await?;

    let Some(owner) = owner else {
        return Err(AppError::NotFound);
    };

    if !can_view(&state.db, &member, &owner.id).await? {
        return Err(AppError::NotFound);
    }

    let items = membership::list_collection(
        &state.db,
        &owner.id,
        collection,
        &CollectionFilter {
            title: Some(filter.title.clone()),
            tag: Some(filter.tag.clone()),
        },
    )
    .await?;

    let template = CollectionShowTemplate {
        is_own: owner.id == member.id,
        owner,
        collection,
        collections: CollectionName::ALL.to_vec(),
        items,
        filter,
        static_hash: crate::STATIC_HASH,
        member: Some(member),
    };
    Ok(Html(template.render()?).into_response())
}
