//! Agent configuration loaded from environment variables

use std::env;

use anyhow::{Context, Result};
use fintrack_shared_config::SyncConfig;
use fintrack_sync::{Credentials, ReconnectPolicy};

/// Sync agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Stream, reconnect and auto-sync settings shared with other services
    pub sync: SyncConfig,

    /// Seconds between aggregate status log lines (0 disables them)
    pub status_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let sync = SyncConfig::from_env().context("Failed to load sync config")?;

        Ok(Self {
            sync,

            status_interval_secs: env::var("AGENT_STATUS_INTERVAL")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid AGENT_STATUS_INTERVAL value")?,
        })
    }

    pub fn stream_url(&self) -> &str {
        &self.sync.stream.url
    }

    pub fn credentials(&self) -> Credentials {
        match &self.sync.stream.token {
            Some(token) => Credentials::bearer(token.clone()),
            None => Credentials::anonymous(),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::from(&self.sync.reconnect)
    }
}
