//! Sync stream endpoint configuration

use crate::{get_env_or_default, parse_env, ConfigError, ConfigResult};

const DEFAULT_STREAM_URL: &str = "http://localhost:8080/api/sync/stream";

/// Server-push sync stream configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Stream endpoint URL
    pub url: String,

    /// Optional bearer token sent with the stream request
    pub token: Option<String>,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum length of a single NDJSON frame in bytes
    pub max_frame_bytes: usize,
}

impl StreamConfig {
    /// Load stream configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let config = Self {
            url: get_env_or_default("SYNC_STREAM_URL", DEFAULT_STREAM_URL),
            token: std::env::var("SYNC_STREAM_TOKEN")
                .ok()
                .filter(|s| !s.is_empty()),
            connect_timeout_secs: parse_env("SYNC_CONNECT_TIMEOUT", 10)?,
            max_frame_bytes: parse_env("SYNC_MAX_FRAME_BYTES", 64 * 1024)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration with a custom URL (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Attach a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(
                "SYNC_STREAM_URL".to_string(),
                self.url.clone(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "SYNC_MAX_FRAME_BYTES".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_STREAM_URL.to_string(),
            token: None,
            connect_timeout_secs: 10,
            max_frame_bytes: 64 * 1024,
        }
    }
}
