use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// AppError
///
/// Failures a request cannot recover from. Validation, authorization and
/// not-found outcomes are not errors at this level: handlers answer those with a
/// flash message and a redirect.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hash error: {0}")]
    PasswordHash(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AppError::PasswordHash(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // The detail goes to the log only.
        match &self {
            AppError::Database(e) => tracing::error!("Database error: {}", e),
            AppError::PasswordHash(e) => tracing::error!("Password hash error: {}", e),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
        }

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
            .into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
