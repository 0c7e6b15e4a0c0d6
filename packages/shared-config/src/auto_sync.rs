//! Auto-sync prompt configuration

use crate::{parse_env, ConfigResult};

/// Settings for the stale-data auto-sync prompt
#[derive(Debug, Clone)]
pub struct AutoSyncConfig {
    /// Seconds before an unanswered prompt dismisses itself
    pub prompt_timeout_secs: u64,
}

impl AutoSyncConfig {
    /// Load auto-sync configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            prompt_timeout_secs: parse_env("AUTO_SYNC_PROMPT_TIMEOUT_SECS", 10)?,
        })
    }
}

impl Default for AutoSyncConfig {
    fn default() -> Self {
        Self {
            prompt_timeout_secs: 10,
        }
    }
}
