use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;
use crate::store::BackendType;

pub const DEFAULT_GOOGLE_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Upper bound for token lifetimes: ten years.
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// Process-wide settings, read once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub storage_backend: BackendType,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub google: GoogleConfig,
    pub page_size: u32,
    pub seed_demo_user: bool,
}

/// Settings of the Google identity-token verifier.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Availability flag; when false every Google login fails as unavailable.
    pub enabled: bool,
    /// The OAuth client id tokens must be issued for.
    pub client_id: Option<String>,
    pub jwks_url: String,
    pub http_timeout: Duration,
    pub jwks_cache_ttl: Duration,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            client_id: None,
            jwks_url: DEFAULT_GOOGLE_JWKS_URL.to_string(),
            http_timeout: Duration::from_secs(10),
            jwks_cache_ttl: Duration::from_secs(3600),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = optional("DATABASE_URL");
        let storage_backend = match optional("STORAGE_BACKEND") {
            Some(name) => BackendType::from_str(&name)?,
            None if database_url.is_some() => BackendType::Postgres,
            None => BackendType::Memory,
        };
        if storage_backend == BackendType::Postgres && database_url.is_none() {
            return Err(AppError::Configuration(
                "DATABASE_URL must be set for the postgres backend".into(),
            ));
        }

        let jwt_secret = optional("JWT_SECRET")
            .ok_or_else(|| AppError::Configuration("JWT_SECRET must be set".into()))?;

        let google = GoogleConfig {
            enabled: parse_or("GOOGLE_AUTH_ENABLED", true)?,
            client_id: optional("GOOGLE_CLIENT_ID"),
            jwks_url: optional("GOOGLE_JWKS_URL")
                .unwrap_or_else(|| DEFAULT_GOOGLE_JWKS_URL.to_string()),
            http_timeout: Duration::from_secs(parse_or("GOOGLE_HTTP_TIMEOUT_SECS", 10)?),
            jwks_cache_ttl: Duration::from_secs(parse_or("GOOGLE_JWKS_CACHE_SECS", 3600)?),
        };

        let page_size: u32 = parse_or("PAGE_SIZE", 10)?;
        if page_size == 0 {
            return Err(AppError::Configuration("PAGE_SIZE must be positive".into()));
        }

        Ok(Self {
            server_host: optional("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port: parse_or("SERVER_PORT", 8080)?,
            storage_backend,
            database_url,
            jwt_secret,
            access_token_ttl: token_ttl("ACCESS_TOKEN_TTL_SECS", 300)?,
            refresh_token_ttl: token_ttl("REFRESH_TOKEN_TTL_SECS", 86_400)?,
            bcrypt_cost: parse_or("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            google,
            page_size,
            seed_demo_user: parse_or("SEED_DEMO_USER", false)?,
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

/// Reads a variable, treating an empty value as unset.
fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match optional(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}

/// A token lifetime in seconds, between 1 and `MAX_TOKEN_TTL_SECS`.
fn token_ttl(key: &str, default: u64) -> Result<Duration, AppError> {
    let secs: u64 = parse_or(key, default)?;
    if secs == 0 || secs > MAX_TOKEN_TTL_SECS {
        return Err(AppError::Configuration(format!(
            "{} must be between 1 and {} seconds",
            key, MAX_TOKEN_TTL_SECS
        )));
    }
    Ok(Duration::from_secs(secs))
}
