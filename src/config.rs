//! Service configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_SUBMISSION_RECORD_PATH: &str = "data/submitted_sessions.json";
pub const DEFAULT_FULFILLMENT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FULFILLMENT_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_FULFILLMENT_LANGUAGE: &str = "en-us";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("missing env var {var}")]
    Missing { var: String },

    /// An environment variable is set but cannot be parsed.
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: String, value: String },
}

impl crate::services::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing { .. } => "E_CONFIG_MISSING",
            Self::Invalid { .. } => "E_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// Postgres record store when set; JSON file store otherwise.
    pub database_url: Option<String>,
    pub record_path: PathBuf,
    /// Goods id used when the session link doesn't carry one.
    pub default_goods_id: Option<String>,
}

impl AppConfig {
    /// Build service config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `DATABASE_URL`: selects the Postgres record store
    /// - `SUBMISSION_RECORD_PATH`: file record store path, default `data/submitted_sessions.json`
    /// - `FULFILLMENT_GOODS_ID`: fallback goods id
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `PORT` is set but not a port number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match non_empty_var("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid { var: "PORT".into(), value: raw })?,
            None => DEFAULT_PORT,
        };
        let record_path = non_empty_var("SUBMISSION_RECORD_PATH")
            .map_or_else(|| PathBuf::from(DEFAULT_SUBMISSION_RECORD_PATH), PathBuf::from);

        Ok(Self {
            port,
            database_url: non_empty_var("DATABASE_URL"),
            record_path,
            default_goods_id: non_empty_var("FULFILLMENT_GOODS_ID"),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FulfillmentTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentConfig {
    pub api_url: String,
    pub token: String,
    pub language: String,
    pub timeouts: FulfillmentTimeouts,
}

impl FulfillmentConfig {
    /// Build fulfillment API config from environment variables.
    ///
    /// Required:
    /// - `FULFILLMENT_API_URL`
    /// - `FULFILLMENT_TOKEN_ENV` (names the env var containing the API token)
    ///
    /// Optional:
    /// - `FULFILLMENT_LANGUAGE`: default `en-us`
    /// - `FULFILLMENT_REQUEST_TIMEOUT_SECS`: default 10
    /// - `FULFILLMENT_CONNECT_TIMEOUT_SECS`: default 5
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if the URL, the token env name, or
    /// the token itself is absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = required_var("FULFILLMENT_API_URL")?;
        let token_var = required_var("FULFILLMENT_TOKEN_ENV")?;
        let token = required_var(&token_var)?;
        let language = non_empty_var("FULFILLMENT_LANGUAGE").unwrap_or_else(|| DEFAULT_FULFILLMENT_LANGUAGE.to_string());
        let timeouts = FulfillmentTimeouts {
            request_secs: env_parse("FULFILLMENT_REQUEST_TIMEOUT_SECS", DEFAULT_FULFILLMENT_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse("FULFILLMENT_CONNECT_TIMEOUT_SECS", DEFAULT_FULFILLMENT_CONNECT_TIMEOUT_SECS),
        };
        Ok(Self { api_url, token, language, timeouts })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn required_var(key: &str) -> Result<String, ConfigError> {
    non_empty_var(key).ok_or_else(|| ConfigError::Missing { var: key.to_string() })
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    non_empty_var(key).and_then(|v| v.parse::<T>().ok()).unwrap_or(default)
}
