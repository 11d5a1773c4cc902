//! Server configuration read from the environment.
//!
//! | Variable                 | Default          |
//! |--------------------------|------------------|
//! | `CHAT_BIND_ADDR`         | `0.0.0.0:8080`   |
//! | `CHAT_OUTBOUND_CAPACITY` | `256`            |
//! | `CHAT_BACKPRESSURE`      | `disconnect`     |
//! | `CHAT_HISTORY_LIMIT`     | unbounded        |
//! | `CHAT_COMMAND_CAPACITY`  | `1024`           |
//! | `JWT_SECRET`             | required         |
//! | `JWT_ISSUER`             | `event-chat-hub` |

use std::str::FromStr;
use thiserror::Error;

use crate::chat::{BackpressurePolicy, HistoryRetention, HubConfig};
use crate::gateway::{TokenConfig, DEFAULT_ISSUER};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub hub: HubConfig,
    pub tokens: TokenConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = HubConfig::default();

        let hub = HubConfig {
            outbound_capacity: parse_positive(
                "CHAT_OUTBOUND_CAPACITY",
                get("CHAT_OUTBOUND_CAPACITY"),
                defaults.outbound_capacity,
            )?,
            backpressure: parse_backpressure(get("CHAT_BACKPRESSURE"))?,
            retention: parse_retention(get("CHAT_HISTORY_LIMIT"))?,
            command_capacity: parse_positive(
                "CHAT_COMMAND_CAPACITY",
                get("CHAT_COMMAND_CAPACITY"),
                defaults.command_capacity,
            )?,
        };

        let secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let issuer = get("JWT_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string());

        Ok(Self {
            bind_addr: get("CHAT_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            hub,
            tokens: TokenConfig::new(secret, issuer),
        })
    }
}

fn parse_positive(
    key: &'static str,
    value: Option<String>,
    default: usize,
) -> Result<usize, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match usize::from_str(value.trim()) {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            value,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(parsed) => Ok(parsed),
        Err(e) => Err(ConfigError::Invalid {
            key,
            value,
            reason: e.to_string(),
        }),
    }
}

fn parse_backpressure(value: Option<String>) -> Result<BackpressurePolicy, ConfigError> {
    let Some(value) = value else {
        return Ok(BackpressurePolicy::default());
    };
    BackpressurePolicy::from_str(value.trim()).map_err(|_| ConfigError::Invalid {
        key: "CHAT_BACKPRESSURE",
        value,
        reason: "expected disconnect, drop-oldest or drop-newest".to_string(),
    })
}

fn parse_retention(value: Option<String>) -> Result<HistoryRetention, ConfigError> {
    let Some(value) = value else {
        return Ok(HistoryRetention::Unbounded);
    };
    if value.trim().eq_ignore_ascii_case("unbounded") {
        return Ok(HistoryRetention::Unbounded);
    }
    usize::from_str(value.trim())
        .map(HistoryRetention::Latest)
        .map_err(|e| ConfigError::Invalid {
            key: "CHAT_HISTORY_LIMIT",
            value,
            reason: e.to_string(),
        })
}
