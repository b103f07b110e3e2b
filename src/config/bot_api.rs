//! Internal bot API configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Connection settings for the internal bot API that mutates Discord state.
#[derive(Debug, Clone, Deserialize)]
pub struct BotApiConfig {
    /// Base URL, e.g. `http://bot-api.internal:3001`
    pub base_url: String,

    /// Shared secret sent on every call
    pub secret: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl BotApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.base_url.is_empty() {
            return Err(ValidationError::MissingRequired("BOT_API__BASE_URL"));
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(ValidationError::InvalidUrl("bot_api.base_url"));
        }
        if self.secret.is_empty() {
            return Err(ValidationError::MissingRequired("BOT_API__SECRET"));
        }
        if self.timeout_secs == 0 || self.timeout_secs > 60 {
            return Err(ValidationError::InvalidOutboundTimeout("bot_api"));
        }
        Ok(())
    }
}

fn default_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BotApiConfig {
        BotApiConfig {
            base_url: "http://bot-api:3001".to_string(),
            secret: "s3cret".to_string(),
            timeout_secs: default_timeout(),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
        assert_eq!(config().timeout(), Duration::from_secs(10));
    }

    #[test]
    fn unbounded_timeout_is_rejected() {
        let cfg = BotApiConfig {
            timeout_secs: 0,
            ..config()
        };
        assert_eq!(
            cfg.validate(),
            Err(ValidationError::InvalidOutboundTimeout("bot_api"))
        );
    }

    #[test]
    fn secret_is_required() {
        let cfg = BotApiConfig {
            secret: String::new(),
            ..config()
        };
        assert!(cfg.validate().is_err());
    }
}
