use crate::domain::auth::ReplayPolicy;
use std::env;
use std::time::Duration;

/// Smallest HS256 secret we accept.
const MAX_ACCESS_TTL_MINUTES: i64 = 24 * 60;
const MAX_REFRESH_TTL_DAYS: i64 = 3650;
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub session_store: SessionStoreKind,
    pub redis_url: String,
    pub session_store_prefix: String,
    pub session_store_timeout: Duration,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub replay_policy: ReplayPolicy,
    pub oauth_state_ttl: Duration,
    pub environment: Environment,
    pub log_format: LogFormat,
    // GitHub OAuth
    pub github_client_id: String,
    pub github_client_secret: String,
    pub github_redirect_uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStoreKind {
    Redis,
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T>(name: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        })
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let session_store = match env::var("SESSION_STORE")
            .unwrap_or_else(|_| "redis".to_string())
            .as_str()
        {
            "memory" => SessionStoreKind::Memory,
            "redis" => SessionStoreKind::Redis,
            other => {
                return Err(ConfigError::Invalid {
                    name: "SESSION_STORE",
                    reason: format!("expected 'redis' or 'memory', got '{}'", other),
                })
            }
        };

        let config = Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parsed("PORT", "8080")?,
            database_url: required("DATABASE_URL")?,
            session_store,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            session_store_prefix: env::var("SESSION_STORE_PREFIX")
                .unwrap_or_else(|_| "timber:auth".to_string()),
            session_store_timeout: Duration::from_millis(parsed("SESSION_STORE_TIMEOUT_MS", "500")?),
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl_minutes: parsed("ACCESS_TOKEN_TTL_MINUTES", "15")?,
            refresh_token_ttl_days: parsed("REFRESH_TOKEN_TTL_DAYS", "30")?,
            replay_policy: parsed("REPLAY_POLICY", "revoke_all")?,
            oauth_state_ttl: Duration::from_secs(parsed("OAUTH_STATE_TTL_SECS", "600")?),
            environment: match env::var("ENVIRONMENT").as_deref() {
                Ok("production") => Environment::Production,
                _ => Environment::Development,
            },
            log_format: match env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            github_client_id: required("GITHUB_CLIENT_ID")?,
            github_client_secret: required("GITHUB_CLIENT_SECRET")?,
            github_redirect_uri: required("GITHUB_REDIRECT_URI")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: format!("must be at least {} bytes", MIN_SECRET_LEN),
            });
        }
        if !(1..=MAX_ACCESS_TTL_MINUTES).contains(&self.access_token_ttl_minutes) {
            return Err(ConfigError::Invalid {
                name: "ACCESS_TOKEN_TTL_MINUTES",
                reason: format!("must be between 1 and {}", MAX_ACCESS_TTL_MINUTES),
            });
        }
        if !(1..=MAX_REFRESH_TTL_DAYS).contains(&self.refresh_token_ttl_days) {
            return Err(ConfigError::Invalid {
                name: "REFRESH_TOKEN_TTL_DAYS",
                reason: format!("must be between 1 and {}", MAX_REFRESH_TTL_DAYS),
            });
        }
        if self.session_store_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "SESSION_STORE_TIMEOUT_MS",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_ttl_minutes.clamp(1, MAX_ACCESS_TTL_MINUTES))
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_ttl_days.clamp(1, MAX_REFRESH_TTL_DAYS))
    }
}
