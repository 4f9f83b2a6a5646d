//! Password hashing, token issuance and the bearer token extractor.
use std::sync::Arc;

use assign::{Role, User, UserId};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tokio::task::spawn_blocking;

use crate::{config::MAX_TOKEN_TTL_DAYS, error::AppError, state::State};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    /// `ttl_days` is clamped to `MAX_TOKEN_TTL_DAYS` in either direction.
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        let ttl_days = ttl_days.clamp(-MAX_TOKEN_TTL_DAYS, MAX_TOKEN_TTL_DAYS);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::days(ttl_days),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AppError::internal)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let validation = Validation::new(Algorithm::HS256);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::InvalidToken)
    }
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(AppError::internal)?
        .map_err(AppError::internal)
}

/// Caller identity taken from `Authorization: Bearer <token>`.
pub struct AuthUser(pub Claims);

impl FromRequestParts<Arc<State>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<State>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim_start_matches("Bearer ").trim())
            .filter(|token| !token.is_empty())
            .ok_or(AppError::MissingToken)?;

        state.keys.verify(token).map(AuthUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "u1".to_string(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            role: Role::Manager,
            skills: Vec::new(),
            avatar: "AL".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_token_round_trip() {
        let keys = JwtKeys::new("secret", 7);
        let token = keys.issue(&user()).unwrap();

        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, "u1");
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.exp - claims.iat, 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_foreign_token_rejected() {
        let token = JwtKeys::new("secret", 7).issue(&user()).unwrap();

        let result = JwtKeys::new("other-secret", 7).verify(&token);
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = JwtKeys::new("secret", -1).issue(&user()).unwrap();

        let result = JwtKeys::new("secret", 7).verify(&token);
        assert!(matches!(result, Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_huge_ttl_is_clamped() {
        let keys = JwtKeys::new("secret", i64::MAX);
        let claims = keys.verify(&keys.issue(&user()).unwrap()).unwrap();

        assert_eq!(claims.exp - claims.iat, MAX_TOKEN_TTL_DAYS * 24 * 60 * 60);
    }

    #[tokio::test]
    async fn test_password_hash_verifies() {
        let hash = hash_password("hunter2".to_string(), 4).await.unwrap();

        assert!(verify_password("hunter2".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("hunter3".to_string(), hash).await.unwrap());
    }
}
