//! Reconnection backoff configuration

use crate::{get_env_or_default, parse_env, ConfigError, ConfigResult};

/// Shape of the delay between reconnection attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffKind {
    /// Same delay before every attempt
    #[default]
    Fixed,
    /// Delay doubles per attempt, capped at the configured maximum
    Exponential,
}

impl std::str::FromStr for BackoffKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "exponential" | "exp" => Ok(Self::Exponential),
            other => Err(format!("unknown backoff kind '{}'", other)),
        }
    }
}

impl std::fmt::Display for BackoffKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Exponential => write!(f, "exponential"),
        }
    }
}

/// Reconnection policy settings for the sync stream
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Attempts before giving up until a manual reset
    pub max_attempts: u32,

    /// Base delay between attempts in milliseconds
    pub delay_ms: u64,

    /// Upper bound for exponential backoff in milliseconds
    pub max_delay_ms: u64,

    /// Fixed or exponential backoff
    pub backoff: BackoffKind,
}

impl ReconnectConfig {
    /// Load reconnect configuration from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let backoff = get_env_or_default("SYNC_RECONNECT_BACKOFF", "fixed")
            .parse()
            .map_err(|e| ConfigError::InvalidValue("SYNC_RECONNECT_BACKOFF".to_string(), e))?;

        let config = Self {
            max_attempts: parse_env("SYNC_RECONNECT_MAX_ATTEMPTS", 3)?,
            delay_ms: parse_env("SYNC_RECONNECT_DELAY_MS", 3000)?,
            max_delay_ms: parse_env("SYNC_RECONNECT_MAX_DELAY_MS", 30_000)?,
            backoff,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "SYNC_RECONNECT_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if !(3..=5).contains(&self.max_attempts) {
            tracing::warn!(
                max_attempts = self.max_attempts,
                "Reconnect bound outside the recommended 3-5 range"
            );
        }
        if self.max_delay_ms < self.delay_ms {
            return Err(ConfigError::ValidationError(
                "SYNC_RECONNECT_MAX_DELAY_MS must not be below SYNC_RECONNECT_DELAY_MS"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 3000,
            max_delay_ms: 30_000,
            backoff: BackoffKind::Fixed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.delay_ms, 3000);
        assert_eq!(config.backoff, BackoffKind::Fixed);
    }

    #[test]
    fn test_backoff_kind_parsing() {
        assert_eq!("fixed".parse::<BackoffKind>().unwrap(), BackoffKind::Fixed);
        assert_eq!(
            "Exponential".parse::<BackoffKind>().unwrap(),
            BackoffKind::Exponential
        );
        assert_eq!("exp".parse::<BackoffKind>().unwrap(), BackoffKind::Exponential);
        assert!("linear".parse::<BackoffKind>().is_err());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        temp_env::with_var("SYNC_RECONNECT_MAX_ATTEMPTS", Some("0"), || {
            assert!(matches!(
                ReconnectConfig::from_env(),
                Err(ConfigError::ValidationError(_))
            ));
        });
    }

    #[test]
    fn test_from_env_overrides() {
        temp_env::with_vars(
            [
                ("SYNC_RECONNECT_MAX_ATTEMPTS", Some("5")),
                ("SYNC_RECONNECT_DELAY_MS", Some("250")),
                ("SYNC_RECONNECT_BACKOFF", Some("exponential")),
            ],
            || {
                let config = ReconnectConfig::from_env().unwrap();
                assert_eq!(config.max_attempts, 5);
                assert_eq!(config.delay_ms, 250);
                assert_eq!(config.backoff, BackoffKind::Exponential);
            },
        );
    }

    #[test]
    fn test_invalid_attempts_value() {
        temp_env::with_var("SYNC_RECONNECT_MAX_ATTEMPTS", Some("many"), || {
            assert!(matches!(
                ReconnectConfig::from_env(),
                Err(ConfigError::InvalidValue(_, _))
            ));
        });
    }
}
