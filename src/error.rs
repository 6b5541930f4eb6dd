use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::media::MediaError;
use crate::membership::MembershipError;

#[derive(Debug)]
pub enum AppError {
    Database(sqlx::Error),
    Template(askama::Error),
    Session(tower_sessions::session::Error),
    PasswordHash(argon2::password_hash::Error),
    Media(MediaError),
    NotFound,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found").into_response(),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            AppError::Template(e) => {
                tracing::error!("Template error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            AppError::Session(e) => {
                tracing::error!("Session error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            AppError::PasswordHash(e) => {
                tracing::error!("Password hash error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            AppError::Media(e) => {
                tracing::error!("Media error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<askama::Error> for AppError {
    fn from(e: askama::Error) -> Self {
        AppError::Template(e)
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(e: tower_sessions::session::Error) -> Self {
        AppError::Session(e)
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(e: argon2::password_hash::Error) -> Self {
        AppError::PasswordHash(e)
    }
}

impl From<MediaError> for AppError {
    fn from(e: MediaError) -> Self {
        AppError::Media(e)
    }
}

impl From<MembershipError> for AppError {
    fn from(e: MembershipError) -> Self {
        match e {
            MembershipError::Store(e) => AppError::Database(e),
            MembershipError::RecipeNotFound(_) | MembershipError::InvalidArgument(_) => {
                AppError::NotFound
            }
        }
    }
}

#[derive(Serialize)]
pub struct MessageBody {
    pub message: String,
}

/// Failure of a JSON endpoint. Always answers with a `{"message": ...}` body.
#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Unauthenticated => "No member logged in.".to_string(),
            ApiError::Internal(detail) => {
                tracing::error!("API failure: {detail}");
                "Something went wrong, please retry.".to_string()
            }
            ApiError::BadRequest(m) | ApiError::NotFound(m) | ApiError::Conflict(m) => m,
        };
        (status, Json(MessageBody { message })).into_response()
    }
}

impl From<MembershipError> for ApiError {
    fn from(e: MembershipError) -> Self {
        match e {
            MembershipError::InvalidArgument(m) => ApiError::BadRequest(m),
            e @ MembershipError::RecipeNotFound(_) => ApiError::NotFound(e.to_string()),
            MembershipError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<askama::Error> for ApiError {
    fn from(e: askama::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_errors_map_to_statuses() {
        let bad: ApiError = MembershipError::InvalidArgument("bad".into()).into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let missing: ApiError = MembershipError::RecipeNotFound("r1".into()).into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let store: ApiError = MembershipError::Store(sqlx::Error::PoolTimedOut).into();
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unauthenticated_is_401() {
        let resp = ApiError::Unauthenticated.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
