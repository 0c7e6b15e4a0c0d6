//! Shared configuration types for Fintrack services
//!
//! This crate provides the configuration used by the realtime sync core
//! and the binaries that host it, loaded from environment variables with
//! development defaults.

mod auto_sync;
mod error;
mod reconnect;
mod stream;

pub use auto_sync::AutoSyncConfig;
pub use error::{ConfigError, ConfigResult};
pub use reconnect::{BackoffKind, ReconnectConfig};
pub use stream::StreamConfig;

use std::env;

/// Configuration shared by everything that hosts the sync core
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Stream endpoint configuration
    pub stream: StreamConfig,

    /// Reconnection backoff policy
    pub reconnect: ReconnectConfig,

    /// Auto-sync prompt settings
    pub auto_sync: AutoSyncConfig,

    /// Environment mode (development, staging, production)
    pub environment: Environment,

    /// Log level (from RUST_LOG or LOG_LEVEL)
    pub log_level: String,
}

/// Application environment mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "staging" | "stage" => Self::Staging,
            _ => Self::Development,
        })
    }
}

impl Environment {
    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Staging => write!(f, "staging"),
            Self::Production => write!(f, "production"),
        }
    }
}

impl SyncConfig {
    /// Load the full sync configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let config = Self {
            stream: StreamConfig::from_env()?,
            reconnect: ReconnectConfig::from_env()?,
            auto_sync: AutoSyncConfig::from_env()?,
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse()
                .unwrap_or_default(),
            log_level: env::var("RUST_LOG")
                .or_else(|_| env::var("LOG_LEVEL"))
                .unwrap_or_else(|_| "info".to_string()),
        };

        if config.environment.is_production() && config.stream.token.is_none() {
            return Err(ConfigError::MissingEnvVar("SYNC_STREAM_TOKEN".to_string()));
        }

        Ok(config)
    }
}

/// Helper function to get an optional environment variable with a default
pub fn get_env_or_default(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Helper function to parse an environment variable into a specific type
pub fn parse_env<T>(name: &str, default: T) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val
            .parse()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
