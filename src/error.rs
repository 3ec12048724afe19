use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::auth::AuthError;
use crate::lookup::LookupError;
use crate::repo::RepoError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub status: &'static str,
    pub message: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")] Validation(String),
    #[error("Email already exists")] DuplicateEmail,
    #[error("Incorrect email or password")] InvalidCredentials,
    #[error("Authorization required")] MissingToken,
    #[error("Invalid token")] InvalidToken,
    #[error("Token expired")] ExpiredToken,
    #[error("User not found")] UserNotFound,
    #[error("{0}")] UnsupportedLanguage(String),
    #[error("{0}")] WordNotFound(String),
    #[error("Free search limit reached. Upgrade to premium.")] QuotaExceeded,
    #[error("Too many requests, slow down")] RateLimited,
    #[error("Internal server error")] Internal,
}

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        tracing::error!("store error: {e}");
        ApiError::Internal
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Validation(msg) => ApiError::Validation(msg),
            AuthError::DuplicateEmail => ApiError::DuplicateEmail,
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::InvalidToken => ApiError::InvalidToken,
            AuthError::ExpiredToken => ApiError::ExpiredToken,
            other => {
                tracing::error!("auth failure: {other}");
                ApiError::Internal
            }
        }
    }
}

impl From<LookupError> for ApiError {
    fn from(e: LookupError) -> Self {
        match e {
            LookupError::EmptyWord => ApiError::Validation(e.to_string()),
            LookupError::UnsupportedLanguage { .. } => ApiError::UnsupportedLanguage(e.to_string()),
            LookupError::WordNotFound { .. } => ApiError::WordNotFound(e.to_string()),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ApiError::Validation(_) | ApiError::DuplicateEmail => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials
            | ApiError::MissingToken
            | ApiError::InvalidToken
            | ApiError::ExpiredToken
            | ApiError::UserNotFound => StatusCode::UNAUTHORIZED,
            ApiError::QuotaExceeded => StatusCode::FORBIDDEN,
            ApiError::UnsupportedLanguage(_) | ApiError::WordNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiErrorBody { status: "error", message: self.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn taxonomy_maps_to_statuses() {
        assert_eq!(ApiError::DuplicateEmail.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(AuthError::ExpiredToken).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::QuotaExceeded.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(LookupError::UnsupportedLanguage { supported: vec!["tamil".into()] }).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ApiError::from(RepoError::Internal("boom".into())).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn internal_errors_do_not_leak_detail() {
        let e = ApiError::from(RepoError::Internal("connection refused to 10.0.0.5".into()));
        assert_eq!(e.to_string(), "Internal server error");
    }
}
