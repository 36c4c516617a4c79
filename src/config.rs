/*
 * Responsibility
 * - Load settings from the environment (issuer, JWKS endpoint, scope matching, logging)
 * - Validate values up front (missing or malformed settings abort startup)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderName;
use url::Url;

/// Header the source deployment reads the bearer token from.
/// Deliberately not `Authorization`.
pub const DEFAULT_TOKEN_HEADER: &str = "authentication";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub log_format: LogFormat,

    pub auth_issuer: String,
    pub auth_audience: Option<String>,
    pub auth_jwks_url: Url,
    pub auth_resource_server: Option<String>,
    pub auth_token_header: HeaderName,
    pub access_token_leeway_seconds: u64,

    pub jwks_fetch_timeout: Duration,
    pub jwks_fetch_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port: u16 = match get("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(get("APP_ENV"));

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Json,
            Some(v) if v == "json" => LogFormat::Json,
            Some(v) if v == "pretty" => LogFormat::Pretty,
            Some(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        let auth_issuer = get("AUTH_ISSUER").ok_or(ConfigError::Missing("AUTH_ISSUER"))?;

        let auth_audience = get("AUTH_AUDIENCE");

        // Most providers publish the key set under the issuer's well-known path.
        let jwks_raw = get("AUTH_JWKS_URL").unwrap_or_else(|| {
            format!("{}/.well-known/jwks.json", auth_issuer.trim_end_matches('/'))
        });
        let auth_jwks_url =
            Url::parse(&jwks_raw).map_err(|_| ConfigError::Invalid("AUTH_JWKS_URL"))?;

        let auth_resource_server =
            get("AUTH_RESOURCE_SERVER").map(|v| v.trim_end_matches('/').to_string());

        let auth_token_header = get("AUTH_TOKEN_HEADER")
            .unwrap_or_else(|| DEFAULT_TOKEN_HEADER.to_string());
        let auth_token_header = HeaderName::from_str(&auth_token_header)
            .map_err(|_| ConfigError::Invalid("AUTH_TOKEN_HEADER"))?;

        let access_token_leeway_seconds = parse_or("ACCESS_TOKEN_LEEWAY_SECONDS", &get, 0)?;

        let timeout_secs: u64 = parse_or("JWKS_FETCH_TIMEOUT_SECONDS", &get, 5)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid("JWKS_FETCH_TIMEOUT_SECONDS"));
        }

        let jwks_fetch_retries = parse_or("JWKS_FETCH_RETRIES", &get, 2)?;

        Ok(Self {
            addr,
            app_env,
            log_format,
            auth_issuer,
            auth_audience,
            auth_jwks_url,
            auth_resource_server,
            auth_token_header,
            access_token_leeway_seconds,
            jwks_fetch_timeout: Duration::from_secs(timeout_secs),
            jwks_fetch_retries,
        })
    }
}

fn parse_or<T, G>(key: &'static str, get: &G, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}
