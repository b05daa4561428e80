//! Client configuration.
//!
//! `ClientConfig` can be built in code, deserialized from any serde format
//! (missing fields take their defaults), or read from `HTTPCTX_*`
//! environment variables.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_USER_AGENT: &str = "httpctx-rs:0.1";

pub const ENV_USER_AGENT: &str = "HTTPCTX_USER_AGENT";
pub const ENV_TIMEOUT_MS: &str = "HTTPCTX_TIMEOUT_MS";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "HTTPCTX_CONNECT_TIMEOUT_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?} (expected milliseconds as an integer)")]
    InvalidMillis { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Sent as `User-Agent` on every request.
    pub user_agent: String,
    /// Deadline applied to every `do_request` call, including its redirect hops.
    pub timeout_ms: Option<u64>,
    /// TCP connect timeout for the bundled reqwest transport.
    pub connect_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_ms: None,
            connect_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    /// Defaults overridden by whichever `HTTPCTX_*` variables are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(user_agent) = lookup(ENV_USER_AGENT) {
            config.user_agent = user_agent;
        }
        config.timeout_ms = parse_millis(ENV_TIMEOUT_MS, lookup(ENV_TIMEOUT_MS))?;
        config.connect_timeout_ms =
            parse_millis(ENV_CONNECT_TIMEOUT_MS, lookup(ENV_CONNECT_TIMEOUT_MS))?;
        Ok(config)
    }
}

fn parse_millis(name: &'static str, raw: Option<String>) -> Result<Option<u64>, ConfigError> {
    raw.map(|value| {
        value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidMillis { name, value })
    })
    .transpose()
}
