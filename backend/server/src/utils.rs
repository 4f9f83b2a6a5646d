use assign::Priority;
use axum::{
    Json,
    extract::{FromRequest, Request},
};
use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// JSON body whose rejections surface as [`AppError::MalformedPayload`].
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::MalformedPayload(rejection.body_text()))?;

        Ok(Payload(value))
    }
}

/// Form fields arrive as empty strings when left blank.
pub fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn parse_priority(value: Option<String>) -> Result<Option<Priority>, AppError> {
    optional(value)
        .map(|v| v.parse::<Priority>())
        .transpose()
        .map_err(AppError::from)
}

pub fn parse_date(field: &str, value: Option<String>) -> Result<Option<NaiveDate>, AppError> {
    optional(value)
        .map(|v| {
            NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                .map_err(|e| AppError::MalformedPayload(format!("{field}: {e}")))
        })
        .transpose()
}

pub fn required(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(AppError::MalformedPayload(format!("{field} is required")));
    }

    Ok(trimmed.to_string())
}
