use askama::Template;
use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::{get, post},
    Form, Router,
};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::auth::AuthMember;
use crate::error::AppError;
use crate::models::Member;
use crate::AppState;

#[derive(Template)]
#[template(path = "friends.html")]
struct FriendsTemplate {
    friends: Vec<Member>,
    notice: Option<String>,
    error: Option<String>,
    static_hash: &'static str,
    member: Option<Member>,
}

#[derive(Deserialize)]
pub struct FriendForm {
    username: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/friends", get(list_friends))
        .route("/friends", post(add_friend))
        .route("/friends/remove", post(remove_friend))
}

async fn friends_of(db: &SqlitePool, member_id: &str) -> Result<Vec<Member>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT m.id, m.username, m.created_at, m.updated_at
        FROM friendships f
        JOIN members m ON m.id = f.friend_id
        WHERE f.member_id = ?
        ORDER BY m.username
        "#
    )
    .bind(member_id)
    .fetch_all(db)
    .await
}

async fn render(
    db: &SqlitePool,
    member: Member,
    notice: Option<String>,
    error: Option<String>,
) -> Result<Html<String>, AppError> {
    let template = FriendsTemplate {
        friends: friends_of(db, &member.id).await?,
        notice,
        error,
        static_hash: crate::STATIC_HASH,
        member: Some(member),
    };
    Ok(Html(template.render()?))
}

async fn list_friends(
    State(state): State<AppState>,
    AuthMember(member): AuthMember,
) -> Result<impl IntoResponse, AppError> {
    render(&state.db, member, None, None).await
}

async fn find_member(db: &SqlitePool, username: &str) -> Result<Option<Member>, sqlx::Error> {
    sqlx::query_as("SELECT id, username, created_at, updated_at FROM members WHERE username = ?")
        .bind(username)
        .fetch_optional(db)
        .await
}

async fn add_friend(
    State(state): State<AppState>,
    AuthMember(member): AuthMember,
    Form(form): Form<FriendForm>,
) -> Result<impl IntoResponse, AppError> {
    let username = form.username.trim();

    let Some(friend) = find_member(&state.db, username).await? else {
        let error = format!("No member found with username '{username}'.");
        return render(&state.db, member, None, Some(error)).await;
    };

    if friend.id == member.id {
        return render(&state.db, member, None, Some("You cannot add yourself.".to_string())).await;
    }

    let now = Utc::now().to_rfc3339();
    let mut tx = state.db.begin().await?;

    let result = sqlx::query(
        "INSERT INTO friendships (member_id, friend_id, created_at) VALUES (?, ?, ?) ON CONFLICT DO NOTHING"
    )
    .bind(&member.id)
    .bind(&friend.id)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        tx.rollback().await?;
        let error = format!("'{}' is already one of your friends.", friend.username);
        return render(&state.db, member, None, Some(error)).await;
    }

    sqlx::query(
        "INSERT INTO friendships (member_id, friend_id, created_at) VALUES (?, ?, ?) ON CONFLICT DO NOTHING"
    )
    .bind(&friend.id)
    .bind(&member.id)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(member_id = %member.id, friend_id = %friend.id, "friendship added");

    let notice = format!("We added {} to your friends!", friend.username);
    render(&state.db, member, Some(notice), None).await
}

async fn remove_friend(
    State(state): State<AppState>,
    AuthMember(member): AuthMember,
    Form(form): Form<FriendForm>,
) -> Result<impl IntoResponse, AppError> {
    let username = form.username.trim();

    let result = sqlx::query(
        r#"
        DELETE FROM friendships
        WHERE (member_id = ?1 AND friend_id = (SELECT id FROM members WHERE username = ?2))
           OR (friend_id = ?1 AND member_id = (SELECT id FROM members WHERE username = ?2))
        "#
    )
    .bind(&member.id)
    .bind(username)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        let error = format!("{username} is not one of your friends.");
        return render(&state.db, member, None, Some(error)).await;
    }

    tracing::info!(member_id = %member.id, friend = %username, "friendship removed");
    let notice = format!("{username} was removed from your friends.");
    render(&state.db, member, Some(notice), None).await
}
