//! Error types for the API service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::messages;

/// Failure of a user lifecycle operation
#[derive(Error, Debug)]
pub enum UserError {
    /// Malformed or incomplete input
    #[error("{0}")]
    Validation(String),

    #[error("User already exists")]
    AlreadyExists,

    /// Email change collided with another account
    #[error("Email already exists")]
    EmailTaken,

    /// Login for an email that has no account
    #[error("No account found with this email. Please register.")]
    NoAccount,

    #[error("User not found")]
    NotFound,

    /// Account was swept by the inactivity job, as deactivated or archived
    #[error("User is deactivated, because of inactivity")]
    Deactivated,

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Missing, invalid or expired session
    #[error("User is not authorized")]
    Unauthorized,

    /// Status or type change attempted by a non-admin
    #[error("Only administrators can change account status or type")]
    Forbidden,

    /// The session is valid but carries no stored user
    #[error("User data is not complete")]
    IncompleteIdentity,

    /// Profile update rejected by the store
    #[error("An error occurred during the update.")]
    UpdateFailed(#[source] DatabaseError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UserError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UserError::Validation(_)
            | UserError::AlreadyExists
            | UserError::EmailTaken
            | UserError::NoAccount
            | UserError::NotFound
            | UserError::InvalidCredentials
            | UserError::IncompleteIdentity => StatusCode::BAD_REQUEST,
            UserError::Unauthorized => StatusCode::UNAUTHORIZED,
            UserError::Deactivated | UserError::Forbidden => StatusCode::FORBIDDEN,
            UserError::UpdateFailed(_) | UserError::Database(_) | UserError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            UserError::UpdateFailed(source) => {
                error!(error = %source, "Profile update failed");
                json!({
                    "message": self.to_string(),
                    "error": source.to_string(),
                })
            }
            UserError::Database(_) | UserError::Internal(_) => {
                error!(error = %self, "Request failed");
                json!({ "message": messages::UNEXPECTED })
            }
            _ => json!({ "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result alias for user lifecycle operations
pub type UserResult<T> = Result<T, UserError>;
