use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::TokenIssuer;
use crate::dictionary::{DEFAULT_FREE_DICTIONARY_BASE, DEFAULT_LOOKUP_TIMEOUT, DEFAULT_WIKTIONARY_BASE};
use crate::rate_limit::RateLimitConfig;

pub const MIN_SECRET_LEN: usize = 32;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("JWT_SECRET must be at least {MIN_SECRET_LEN} characters long")]
    WeakSecret,
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Process configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub wiktionary_base: String,
    pub free_dictionary_base: String,
    pub lookup_timeout: Duration,
    pub data_dir: Option<PathBuf>,
    pub database_url: Option<String>,
    pub enable_hsts: bool,
    pub rate_limit_enabled: bool,
    pub rate_limits: RateLimitConfig,
}

fn parsed_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v.trim().parse().map_err(|_| ConfigError::Invalid { name, value: v }),
        Err(_) => Ok(default),
    }
}

pub(crate) fn flag_env(name: &str) -> bool {
    env::var(name).map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        let token_ttl_days = parsed_env("TOKEN_TTL_DAYS", TokenIssuer::DEFAULT_TTL_DAYS)?;
        if token_ttl_days <= 0 {
            return Err(ConfigError::Invalid { name: "TOKEN_TTL_DAYS", value: token_ttl_days.to_string() });
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parsed_env("PORT", 3000)?,
            jwt_secret,
            token_ttl_days,
            wiktionary_base: env::var("WIKTIONARY_API_BASE").unwrap_or_else(|_| DEFAULT_WIKTIONARY_BASE.into()),
            free_dictionary_base: env::var("FREE_DICTIONARY_API_BASE")
                .unwrap_or_else(|_| DEFAULT_FREE_DICTIONARY_BASE.into()),
            lookup_timeout: Duration::from_secs(parsed_env("LOOKUP_TIMEOUT_SECS", DEFAULT_LOOKUP_TIMEOUT.as_secs())?),
            data_dir: env::var("DIALECT_DATA_DIR").ok().map(PathBuf::from),
            database_url: env::var("DATABASE_URL").ok(),
            enable_hsts: flag_env("ENABLE_HSTS"),
            rate_limit_enabled: flag_env("RL_ENABLED"),
            rate_limits: RateLimitConfig::from_env(),
        })
    }

    pub fn token_issuer(&self) -> TokenIssuer {
        TokenIssuer::new(self.jwt_secret.clone(), chrono::Duration::days(self.token_ttl_days))
    }
}
