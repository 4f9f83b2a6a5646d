use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

/// Upper bound for `TOKEN_TTL_DAYS`, ten years.
pub const MAX_TOKEN_TTL_DAYS: i64 = 3650;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Secret {0} not found in environment or /run/secrets")]
    MissingSecret(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Redis,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redis" => Ok(StoreKind::Redis),
            "memory" => Ok(StoreKind::Memory),
            other => Err(format!("unknown store {other}, expected redis or memory")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub store: StoreKind,
    pub redis_url: String,
    pub frontend_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub bcrypt_cost: u32,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            port: try_load(&lookup, "RUST_PORT", "5000")?,
            store: try_load(&lookup, "STORE", "redis")?,
            redis_url: try_load(&lookup, "REDIS_URL", "redis://127.0.0.1:6379")?,
            frontend_dir: try_load(&lookup, "FRONTEND_DIR", "frontend")?,
            jwt_secret: read_secret(&lookup, "JWT_SECRET")
                .ok_or_else(|| ConfigError::MissingSecret("JWT_SECRET".to_string()))?,
            token_ttl_days: token_ttl_days(&lookup)?,
            bcrypt_cost: try_load(&lookup, "BCRYPT_COST", "10")?,
            mail_api_url: lookup("MAIL_API_URL").filter(|url| !url.is_empty()),
            mail_api_key: read_secret(&lookup, "MAIL_API_KEY"),
            mail_from: try_load(&lookup, "MAIL_FROM", "noreply@projectflow.local")?,
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse::<T>()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })
}

fn token_ttl_days<F>(lookup: &F) -> Result<i64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let days: i64 = try_load(lookup, "TOKEN_TTL_DAYS", "7")?;

    if !(1..=MAX_TOKEN_TTL_DAYS).contains(&days) {
        warn!("Invalid TOKEN_TTL_DAYS value: {days}");
        return Err(ConfigError::Invalid {
            key: "TOKEN_TTL_DAYS".to_string(),
            reason: format!("expected 1 to {MAX_TOKEN_TTL_DAYS} days, got {days}"),
        });
    }

    Ok(days)
}

fn read_secret<F>(lookup: &F, secret_name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(secret_name) {
        return Some(value);
    }

    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .ok()
}
