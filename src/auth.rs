use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::ApiError;
use crate::models::Member;

const MEMBER_KEY: &str = "member";

/// Logged-in member for HTML pages. Anonymous visitors are sent to `/login`.
pub struct AuthMember(pub Member);

impl<S> FromRequestParts<S> for AuthMember
where
    S: Send + Sync,
{
    type Rejection = AuthRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        current_member(parts, state)
            .await
            .map(AuthMember)
            .ok_or(AuthRedirect)
    }
}

/// Logged-in member for JSON endpoints. Anonymous callers get a 401 body.
pub struct ApiMember(pub Member);

impl<S> FromRequestParts<S> for ApiMember
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        current_member(parts, state)
            .await
            .map(ApiMember)
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Logged-in member if any; pages readable by everyone use this.
pub struct MaybeMember(pub Option<Member>);

impl<S> FromRequestParts<S> for MaybeMember
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeMember(current_member(parts, state).await))
    }
}

async fn current_member<S: Send + Sync>(parts: &mut Parts, state: &S) -> Option<Member> {
    let session = Session::from_request_parts(parts, state).await.ok()?;
    session.get(MEMBER_KEY).await.ok().flatten()
}

pub struct AuthRedirect;

impl IntoResponse for AuthRedirect {
    fn into_response(self) -> Response {
        Redirect::to("/login").into_response()
    }
}

pub async fn login_member(session: &Session, member: Member) -> Result<(), tower_sessions::session::Error> {
    session.insert(MEMBER_KEY, member).await
}

pub async fn logout_member(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// False for a wrong password and for a stored hash that does not parse.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        tracing::warn!("Stored password hash is not a valid PHC string");
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}
