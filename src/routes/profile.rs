use askama::Template;
use axum::{
    extract::State,
    response::{Html, IntoResponse},
    routing::get,
    Form, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use tower_sessions::Session;

use crate::auth::{hash_password, login_member, verify_password, AuthMember};
use crate::error::AppError;
use crate::models::Member;
use crate::routes::auth::{validate_password, validate_username, MemberCredentials};
use crate::AppState;

#[derive(Template)]
#[template(path = "profile.html")]
struct ProfileTemplate {
    username: String,
    errors: HashMap<String, String>,
    notice: Option<String>,
    static_hash: &'static str,
    member: Option<Member>,
}

#[derive(Deserialize)]
pub struct ProfileForm {
    username: String,
    current_password: String,
    #[serde(default)]
    new_password: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/profile", get(profile_page).post(update_profile))
}

async fn profile_page(AuthMember(member): AuthMember) -> Result<impl IntoResponse, AppError> {
    let template = ProfileTemplate {
        username: member.username.clone(),
        errors: HashMap::new(),
        notice: None,
        static_hash: crate::STATIC_HASH,
        member: Some(member),
    };
    Ok(Html(template.render()?))
}

async fn update_profile(
    State(state): State<AppState>,
    AuthMember(member): AuthMember,
    session: Session,
    Form(form): Form<ProfileForm>,
) -> Result<impl IntoResponse, AppError> {
    let mut errors = HashMap::new();

    if let Some(e) = validate_username(&form.username) {
        errors.insert("username".to_string(), e);
    }
    if !form.new_password.is_empty() {
        if let Some(e) = validate_password(&form.new_password) {
            errors.insert("new_password".to_string(), e);
        }
    }

    let credentials: MemberCredentials = sqlx::query_as("SELECT * FROM members WHERE id = ?")
        .bind(&member.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or(AppError::NotFound)?;

    if !verify_password(&form.current_password, &credentials.password_hash) {
        errors.insert(
            "current_password".to_string(),
            "Wrong password.".to_string(),
        );
    }

    if !errors.is_empty() {
        let template = ProfileTemplate {
            username: form.username,
            errors,
            notice: None,
            static_hash: crate::STATIC_HASH,
            member: Some(member),
        };
        return Ok(Html(template.render()?));
    }

    let username = form.username.trim().to_string();
    let password_hash = if form.new_password.is_empty() {
        credentials.password_hash
    } else {
        hash_password(&form.new_password)?
    };
    let now = Utc::now().to_rfc3339();

    let result = sqlx::query(
        r#"
        UPDATE OR IGNORE members SET username = ?, password_hash = ?, updated_at = ?
        WHERE id = ?
        "#
    )
    .bind(&username)
    .bind(&password_hash)
    .bind(&now)
    .bind(&member.id)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        errors.insert("username".to_string(), "Username not available.".to_string());
        let template = ProfileTemplate {
            username: form.username,
            errors,
            notice: None,
            static_hash: crate::STATIC_HASH,
            member: Some(member),
        };
        return Ok(Html(template.render()?));
    }

    let updated = Member {
        username,
        updated_at: now,
        ..member
    };
    login_member(&session, updated.clone()).await?;
    tracing::info!(member_id = %updated.id, "profile updated");

    let template = ProfileTemplate {
        username: updated.username.clone(),
        errors,
        notice: Some("Your profile was updated.".to_string()),
        static_hash: crate::STATIC_HASH,
        member: Some(updated),
    };
    Ok(Html(template.render()?))
}
