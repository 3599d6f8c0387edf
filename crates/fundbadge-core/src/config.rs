//! Service configuration read from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `APP_ENV` | `development` |
//! | `HOST` / `PORT` | `0.0.0.0` / `3000` |
//! | `LOG_LEVEL` | `info` |
//! | `GITHUB_TOKEN` | required |
//! | `GITHUB_API_TIMEOUT` | `10000` ms |
//! | `GITHUB_OAUTH_CLIENT_ID` / `GITHUB_OAUTH_CLIENT_SECRET` | required |
//! | `GITHUB_OAUTH_CALLBACK_URL` | required, http(s) |
//! | `DATABASE_PATH` | `./data/fundbadge.duckdb` |
//! | `ENCRYPTION_SECRET` | required, 32+ chars |
//! | `CACHE_DEFAULT_TTL` / `CACHE_MAX_TTL` | `300` / `3600` s |
//! | `REDIS_URL` | unset |
//! | `FETCH_TIMEOUT_MS` | unset |
//! | `RATE_LIMIT_MAX` / `RATE_LIMIT_WINDOW` | `100` / `60000` ms |
//! | `ALLOWED_ORIGINS` | `*` |
//! | `PUBLIC_BASE_URL` | unset |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use fundbadge_vault::{VaultConfig, MIN_SECRET_LEN};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::oauth::OAuthAppCredentials;
use crate::service::TtlPolicy;
use crate::AccessToken;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {name}")]
    Missing { name: &'static str },

    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(format!(
                "expected development, production or test, got '{other}'"
            )),
        }
    }
}

/// CORS origin policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed == "*" {
            return Self::Any;
        }
        Self::List(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub allowed_origins: AllowedOrigins,
    pub public_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// Service-level token used for quota checks and diagnostics.
    pub token: AccessToken,
    pub api_timeout_ms: u64,
    pub oauth: OAuthAppCredentials,
}

#[derive(Debug, Clone)]
pub struct VaultSettings {
    pub database_path: PathBuf,
    pub encryption_secret: SecretString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub default_ttl: Duration,
    pub max_ttl: Duration,
    pub redis_url: Option<String>,
    pub fetch_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub github: GithubConfig,
    pub vault: VaultSettings,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
}

const LOG_LEVELS: [&str; 6] = ["fatal", "error", "warn", "info", "debug", "trace"];

impl AppConfig {
    /// Reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let environment = vars.parsed("APP_ENV", Environment::Development)?;

        let log_level = vars
            .optional("LOG_LEVEL")
            .unwrap_or_else(|| String::from("info"))
            .to_ascii_lowercase();
        if !LOG_LEVELS.contains(&log_level.as_str()) {
            return Err(ConfigError::Invalid {
                name: "LOG_LEVEL",
                message: format!("expected one of {}", LOG_LEVELS.join(", ")),
            });
        }

        let server = ServerConfig {
            host: vars
                .optional("HOST")
                .unwrap_or_else(|| String::from("0.0.0.0")),
            port: vars.positive("PORT", 3000_u16)?,
            log_level,
            allowed_origins: AllowedOrigins::parse(
                &vars.optional("ALLOWED_ORIGINS").unwrap_or_else(|| String::from("*")),
            ),
            public_base_url: vars
                .optional("PUBLIC_BASE_URL")
                .map(|url| require_http_url("PUBLIC_BASE_URL", url))
                .transpose()?,
        };

        let github = GithubConfig {
            token: AccessToken::new(vars.required("GITHUB_TOKEN")?),
            api_timeout_ms: vars.positive("GITHUB_API_TIMEOUT", 10_000_u64)?,
            oauth: OAuthAppCredentials {
                client_id: vars.required("GITHUB_OAUTH_CLIENT_ID")?,
                client_secret: SecretString::from(vars.required("GITHUB_OAUTH_CLIENT_SECRET")?),
                callback_url: require_http_url(
                    "GITHUB_OAUTH_CALLBACK_URL",
                    vars.required("GITHUB_OAUTH_CALLBACK_URL")?,
                )?,
            },
        };

        let encryption_secret = SecretString::from(vars.required("ENCRYPTION_SECRET")?);
        if encryption_secret.expose_secret().chars().count() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "ENCRYPTION_SECRET",
                message: format!("must be at least {MIN_SECRET_LEN} characters"),
            });
        }
        let vault = VaultSettings {
            database_path: vars
                .optional("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/fundbadge.duckdb")),
            encryption_secret,
        };

        let default_ttl = Duration::from_secs(vars.positive("CACHE_DEFAULT_TTL", 300_u64)?);
        let max_ttl = Duration::from_secs(vars.positive("CACHE_MAX_TTL", 3600_u64)?);
        if max_ttl < default_ttl {
            return Err(ConfigError::Invalid {
                name: "CACHE_MAX_TTL",
                message: String::from("must not be lower than CACHE_DEFAULT_TTL"),
            });
        }
        let fetch_timeout = match vars.optional("FETCH_TIMEOUT_MS") {
            Some(_) => Some(Duration::from_millis(vars.positive("FETCH_TIMEOUT_MS", 0_u64)?)),
            None => None,
        };
        let cache = CacheConfig {
            default_ttl,
            max_ttl,
            redis_url: vars.optional("REDIS_URL"),
            fetch_timeout,
        };

        let rate_limit = RateLimitConfig {
            max_requests: vars.positive("RATE_LIMIT_MAX", 100_u32)?,
            window: Duration::from_millis(vars.positive("RATE_LIMIT_WINDOW", 60_000_u64)?),
        };

        Ok(Self {
            environment,
            server,
            github,
            vault,
            cache,
            rate_limit,
        })
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy::new(self.cache.default_ttl, self.cache.max_ttl)
    }

    pub fn vault_config(&self) -> VaultConfig {
        VaultConfig::new(
            self.vault.database_path.clone(),
            self.vault.encryption_secret.clone(),
        )
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing { name })
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(raw) => raw.parse().map_err(|error: T::Err| ConfigError::Invalid {
                name,
                message: error.to_string(),
            }),
            None => Ok(default),
        }
    }

    fn positive<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default,
        T::Err: std::fmt::Display,
    {
        let value = self.parsed(name, default)?;
        if value <= T::default() {
            return Err(ConfigError::Invalid {
                name,
                message: String::from("must be a positive number"),
            });
        }
        Ok(value)
    }
}

fn require_http_url(name: &'static str, value: String) -> Result<String, ConfigError> {
    let valid = ["http://", "https://"]
        .iter()
        .any(|scheme| value.len() > scheme.len() && value.starts_with(scheme));
    if !valid {
        return Err(ConfigError::Invalid {
            name,
            message: format!("'{value}' is not an http(s) URL"),
        });
    }
    Ok(value)
}
