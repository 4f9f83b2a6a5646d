use std::error::Error as StdError;

use assign::{AssignError, ParseError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::database::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("{0}")]
    InvalidField(#[from] ParseError),

    #[error("Email already exists")]
    EmailTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Access denied")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Unknown {0}")]
    NotFound(&'static str),

    #[error("No eligible members to assign")]
    NoEligibleCandidates,

    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn StdError + Send + Sync>),
}

impl AppError {
    pub fn internal<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        AppError::InternalError(err.into())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::EmailTaken => AppError::EmailTaken,
            other => AppError::internal(other),
        }
    }
}

impl From<AssignError> for AppError {
    fn from(err: AssignError) -> Self {
        match err {
            AssignError::NoEligibleCandidates => AppError::NoEligibleCandidates,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MalformedPayload { .. } => StatusCode::BAD_REQUEST,
            AppError::InvalidField { .. } => StatusCode::BAD_REQUEST,
            AppError::EmailTaken => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AppError::MissingToken => StatusCode::UNAUTHORIZED,
            AppError::InvalidToken => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::NoEligibleCandidates => StatusCode::CONFLICT,
            AppError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            AppError::InternalError(err) => {
                error!("Request failed: {err}");
                "Internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
