use askama::Template;
use axum::{
    extract::State,
    response::{Html, IntoResponse, Redirect},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use sqlx::FromRow;
use std::collections::HashMap;
use tower_sessions::Session;

use crate::auth::{hash_password, login_member, logout_member, verify_password, MaybeMember};
use crate::error::AppError;
use crate::models::Member;
use crate::AppState;

pub const USERNAME_MAX_CHARS: usize = 100;
pub const PASSWORD_MIN_CHARS: usize = 8;

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: Option<String>,
    username: String,
    static_hash: &'static str,
    member: Option<Member>,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    errors: HashMap<String, String>,
    username: String,
    static_hash: &'static str,
    member: Option<Member>,
}

/// Member row including the credential hash; never stored in the session.
#[derive(FromRow)]
pub(crate) struct MemberCredentials {
    id: String,
    username: String,
    pub(crate) password_hash: String,
    created_at: String,
    updated_at: String,
}

impl MemberCredentials {
    pub(crate) fn into_member(self) -> Member {
        Member {
            id: self.id,
            username: self.username,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Deserialize)]
pub struct LoginForm {
    username: String,
    password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    username: String,
    password: String,
}

pub(crate) fn validate_username(username: &str) -> Option<String> {
    let username = username.trim();
    if username.is_empty() {
        return Some("Username is required".to_string());
    }
    if username.chars().count() > USERNAME_MAX_CHARS {
        return Some(format!("Username must be under {USERNAME_MAX_CHARS} characters"));
    }
    None
}

pub(crate) fn validate_password(password: &str) -> Option<String> {
    if password.chars().count() < PASSWORD_MIN_CHARS {
        return Some(format!("Password must be at least {PASSWORD_MIN_CHARS} characters"));
    }
    None
}

fn validate_register_form(form: &RegisterForm) -> HashMap<String, String> {
    let mut errors = HashMap::new();

    if let Some(e) = validate_username(&form.username) {
        errors.insert("username".to_string(), e);
    }

    if let Some(e) = validate_password(&form.password) {
        errors.insert("password".to_string(), e);
    }

    errors
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page))
        .route("/login", post(login_submit))
        .route("/logout", post(logout))
        .route("/register", get(register_page))
        .route("/register", post(register_submit))
}

async fn login_page(MaybeMember(member): MaybeMember) -> Result<impl IntoResponse, AppError> {
    let template = LoginTemplate {
        error: None,
        username: String::new(),
        static_hash: crate::STATIC_HASH,
        member,
    };
    Ok(Html(template.render()?))
}

async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, AppError> {
    let credentials: Option<MemberCredentials> = sqlx::query_as(
        "SELECT * FROM members WHERE username = ?"
    )
    .bind(form.username.trim())
    .fetch_optional(&state.db)
    .await?;

    match credentials.filter(|c| verify_password(&form.password, &c.password_hash)) {
        Some(credentials) => {
            let member = credentials.into_member();
            tracing::info!(member_id = %member.id, "member logged in");
            login_member(&session, member).await?;
            Ok(Redirect::to("/").into_response())
        }
        None => {
            let template = LoginTemplate {
                error: Some("Wrong username or password.".to_string()),
                username: form.username,
                static_hash: crate::STATIC_HASH,
                member: None,
            };
            Ok(Html(template.render()?).into_response())
        }
    }
}

async fn logout(session: Session) -> Result<impl IntoResponse, AppError> {
    logout_member(&session).await?;
    Ok(Redirect::to("/"))
}

async fn register_page(MaybeMember(member): MaybeMember) -> Result<impl IntoResponse, AppError> {
    let template = RegisterTemplate {
        errors: HashMap::new(),
        username: String::new(),
        static_hash: crate::STATIC_HASH,
        member,
    };
    Ok(Html(template.render()?))
}

async fn register_submit(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<impl IntoResponse, AppError> {
    let mut errors = validate_register_form(&form);

    if errors.is_empty() {
        let member = Member::new(form.username.trim().to_string());
        let password_hash = hash_password(&form.password)?;

        let result = sqlx::query(
            r#"
            INSERT INTO members (id, username, password_hash, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (username) DO NOTHING
            "#
        )
        .bind(&member.id)
        .bind(&member.username)
        .bind(&password_hash)
        .bind(&member.created_at)
        .bind(&member.updated_at)
        .execute(&state.db)
        .await?;

        if result.rows_affected() == 1 {
            tracing::info!(member_id = %member.id, "member registered");
            return Ok(Redirect::to("/login").into_response());
        }

        errors.insert("username".to_string(), "Username not available.".to_string());
    }

    let template = RegisterTemplate {
        errors,
        username: form.username,
        static_hash: crate::STATIC_HASH,
        member: None,
    };
    Ok(Html(template.render()?).into_response())
}
