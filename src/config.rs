//! Server and logging configuration.
//!
//! Values come from the environment (`NESTEGG_BIND_ADDR`, `NESTEGG_LOG`,
//! `NESTEGG_LOG_FORMAT`) and can be overridden on the command line.

use std::net::{AddrParseError, SocketAddr};
use std::str::FromStr;

use clap::ValueEnum;
use thiserror::Error;

pub const BIND_ADDR_ENV: &str = "NESTEGG_BIND_ADDR";
pub const LOG_LEVEL_ENV: &str = "NESTEGG_LOG";
pub const LOG_FORMAT_ENV: &str = "NESTEGG_LOG_FORMAT";

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("NESTEGG_BIND_ADDR: '{value}' is not a socket address: {source}")]
    InvalidBindAddr {
        value: String,
        #[source]
        source: AddrParseError,
    },

    #[error("NESTEGG_LOG_FORMAT: unknown log format '{0}', expected 'text' or 'json'")]
    InvalidLogFormat(String),
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidLogFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Log filter directive, e.g. `info` or `nestegg=debug`.
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup, falling back to
    /// defaults for unset or empty variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(value) = get(BIND_ADDR_ENV) {
            config.bind_addr = value
                .trim()
                .parse::<SocketAddr>()
                .map_err(|source| ConfigError::InvalidBindAddr { value, source })?;
        }
        if let Some(value) = get(LOG_LEVEL_ENV) {
            config.log_level = value;
        }
        if let Some(value) = get(LOG_FORMAT_ENV) {
            config.log_format = value.parse()?;
        }

        Ok(config)
    }
}
