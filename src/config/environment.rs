// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Reads ports, database, JWT, upstream and relay limits from environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration, read once at startup

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::defaults;
use crate::errors::{AppError, AppResult};
use crate::llm::GroqConfig;
use crate::services::chat_relay::RelayConfig;

/// Environment type for security and other configurations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development
    #[default]
    Development,
    /// Deployed server
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
            Self::Testing => f.write_str("testing"),
        }
    }
}

/// Type-safe database location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Path of the database file
        path: PathBuf,
    },
    /// In-memory `SQLite` (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse a `sqlite:` URL
    ///
    /// # Errors
    ///
    /// Returns a config error for any other scheme
    pub fn parse_url(s: &str) -> AppResult<Self> {
        let path = s
            .strip_prefix("sqlite://")
            .or_else(|| s.strip_prefix("sqlite:"))
            .ok_or_else(|| AppError::config(format!("Unsupported DATABASE_URL: {s}")))?;

        if path == ":memory:" {
            Ok(Self::Memory)
        } else {
            Ok(Self::SQLite {
                path: PathBuf::from(path),
            })
        }
    }

    /// Connection string understood by sqlx
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".to_owned(),
        }
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/devgpt.db"),
        }
    }
}

/// JWT settings
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 secret; `None` means a random per-process secret
    pub jwt_secret: Option<String>,
    /// Token lifetime
    pub jwt_expiry_hours: i64,
}

/// Complete server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port
    pub http_port: u16,
    /// Bind address
    pub host: String,
    /// Deployment environment
    pub environment: Environment,
    /// Database location
    pub database: DatabaseUrl,
    /// JWT settings
    pub auth: AuthConfig,
    /// Upstream model provider
    pub groq: GroqConfig,
    /// Allowed CORS origins (`*` or comma-separated)
    pub cors_origin: String,
    /// Relay and title inference limits
    pub relay: RelayConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: defaults::HTTP_PORT,
            host: defaults::HOST.to_owned(),
            environment: Environment::Development,
            database: DatabaseUrl::default(),
            auth: AuthConfig {
                jwt_secret: None,
                jwt_expiry_hours: defaults::JWT_EXPIRY_HOURS,
            },
            groq: GroqConfig::default(),
            cors_origin: "*".to_owned(),
            relay: RelayConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a config error for unparsable values, or for a production
    /// environment without `JWT_SECRET`
    pub fn from_env() -> AppResult<Self> {
        info!("Loading configuration from environment variables");

        let http_port = match env::var("HTTP_PORT") {
            Ok(_) => env_parse("HTTP_PORT", defaults::HTTP_PORT)?,
            Err(_) => env_parse("PORT", defaults::HTTP_PORT)?,
        };

        let config = Self {
            http_port,
            host: env_var_or("HOST", defaults::HOST),
            environment: Environment::from_str_or_default(&env_var_or("ENVIRONMENT", "development")),
            database: DatabaseUrl::parse_url(&env_var_or("DATABASE_URL", defaults::DATABASE_URL))?,
            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
                jwt_expiry_hours: env_parse("JWT_EXPIRY_HOURS", defaults::JWT_EXPIRY_HOURS)?,
            },
            groq: GroqConfig::from_env(),
            cors_origin: env_var_or("CORS_ORIGIN", "*"),
            relay: RelayConfig {
                stream_timeout: Duration::from_secs(env_parse(
                    "STREAM_TIMEOUT_SECS",
                    defaults::STREAM_TIMEOUT_SECS,
                )?),
                channel_capacity: env_parse(
                    "RELAY_CHANNEL_CAPACITY",
                    defaults::RELAY_CHANNEL_CAPACITY,
                )?,
                title_timeout: Duration::from_secs(env_parse(
                    "TITLE_TIMEOUT_SECS",
                    defaults::TITLE_TIMEOUT_SECS,
                )?),
                ..RelayConfig::default()
            },
        };

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a config error describing the first invalid setting
    pub fn validate(&self) -> AppResult<()> {
        if self.environment.is_production() && self.auth.jwt_secret.is_none() {
            return Err(AppError::config("JWT_SECRET must be set in production"));
        }
        if self.auth.jwt_expiry_hours <= 0 {
            return Err(AppError::config("JWT_EXPIRY_HOURS must be positive"));
        }
        if self.relay.channel_capacity == 0 {
            return Err(AppError::config("RELAY_CHANNEL_CAPACITY must be at least 1"));
        }
        if self.relay.stream_timeout.is_zero() {
            return Err(AppError::config("STREAM_TIMEOUT_SECS must be positive"));
        }
        if self.groq.api_key.is_none() {
            warn!("GROQ_API_KEY is not set; completions will fail upstream");
        }
        Ok(())
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "DevGPT Server Configuration:\n\
             - Environment: {}\n\
             - Listen: {}:{}\n\
             - Database: {}\n\
             - JWT Secret: {}\n\
             - Token Expiry: {}h\n\
             - Groq API: {} ({})\n\
             - CORS Origin: {}\n\
             - Stream Timeout: {}s\n\
             - Relay Channel Capacity: {}",
            self.environment,
            self.host,
            self.http_port,
            match &self.database {
                DatabaseUrl::SQLite { path } => path.display().to_string(),
                DatabaseUrl::Memory => "in-memory".to_owned(),
            },
            if self.auth.jwt_secret.is_some() {
                "Configured"
            } else {
                "Generated (per process)"
            },
            self.auth.jwt_expiry_hours,
            if self.groq.api_key.is_some() {
                "Enabled"
            } else {
                "Missing key"
            },
            self.groq.base_url,
            self.cors_origin,
            self.relay.stream_timeout.as_secs(),
            self.relay.channel_capacity,
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse an environment variable, falling back to `default` when unset
fn env_parse<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {key} value '{raw}': {e}"))),
        Err(_) => Ok(default),
    }
}
