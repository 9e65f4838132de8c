use std::env;
use std::path::PathBuf;
use teloxide::types::UserId;
use thiserror::Error;

const DEFAULT_UPDATES_CHANNEL_URL: &str = "https://t.me/AutoAccepter";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),
    #[error("environment variable {key} is malformed: {reason}")]
    Malformed { key: &'static str, reason: String },
}

/// Settings read once at startup. Any missing or malformed required value
/// aborts the process.
#[derive(Debug, Clone)]
pub struct Config {
    /// MTProto application id. Unused by the Bot API client but still
    /// validated so deployments keep a consistent environment.
    pub api_id: i32,
    pub api_hash: String,
    pub bot_token: String,
    pub owner_id: UserId,
    pub database_path: String,
    pub updates_channel_url: String,
}

/// Loads `.env` (if present) into the process environment. Runs before the
/// logger exists, so the outcome is returned for the caller to log.
pub fn load_environment() -> Result<Option<PathBuf>, dotenv::Error> {
    match dotenv::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let api_id = required("API_ID")?
            .parse::<i32>()
            .map_err(|e| ConfigError::Malformed { key: "API_ID", reason: e.to_string() })?;
        let api_hash = required("API_HASH")?;
        let bot_token = required("BOT_TOKEN")?;
        let owner_id = required("OWNER_ID")?
            .parse::<u64>()
            .map(UserId)
            .map_err(|e| ConfigError::Malformed { key: "OWNER_ID", reason: e.to_string() })?;
        let database_path = database_path_from_url(&required("DATABASE_URL")?)?;
        let updates_channel_url = lookup("UPDATES_CHANNEL_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_UPDATES_CHANNEL_URL.to_string());

        Ok(Self {
            api_id,
            api_hash,
            bot_token,
            owner_id,
            database_path,
            updates_channel_url,
        })
    }
}

fn database_path_from_url(url: &str) -> Result<String, ConfigError> {
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .or_else(|| url.strip_prefix("file:"))
        .unwrap_or(url);

    if path.is_empty() {
        return Err(ConfigError::Malformed {
            key: "DATABASE_URL",
            reason: "no database path".to_string(),
        });
    }
    Ok(path.to_string())
}
