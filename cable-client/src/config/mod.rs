//! Configuration management for the cable client
//!
//! Defaults match the cable client's historical behaviour. Values can be
//! loaded from a TOML file or overridden from `CABLE_<SECTION>_<KEY>`
//! environment variables; both paths end in [`Config::validate`].

use crate::core_replication::PolicyTable;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Hop budget for replication requests
pub const DEFAULT_TTL: u8 = 3;

/// Channels requested per channel-list request
pub const DEFAULT_CHANNEL_LIST_LIMIT: usize = 100;

/// How often the channel list is re-requested
pub const CHANNEL_LIST_RENEWAL_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Default page size for timeline views
pub const DEFAULT_PAGE_LIMIT: usize = 500;

/// Main client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timeline and channel defaults
    pub client: ClientConfig,

    /// Replication scheduling
    pub replication: ReplicationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Timeline and channel defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Channel joined when no other channel is
    pub default_channel: String,

    /// Page size used when a page request carries no limit
    pub page_limit: usize,
}

/// Replication scheduling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Request time-to-live in hops
    pub ttl: u8,

    /// Hops for state and moderation requests
    pub hops: u32,

    /// Channels per channel-list request
    pub channel_list_limit: usize,

    /// Interval between channel-list requests
    #[serde(with = "humantime_serde")]
    pub channel_list_renewal_interval: Duration,

    /// Joined / unjoined / dropped policies
    pub policies: PolicyTable,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_channel: "default".to_string(),
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            hops: 1,
            channel_list_limit: DEFAULT_CHANNEL_LIST_LIMIT,
            channel_list_renewal_interval: CHANNEL_LIST_RENEWAL_INTERVAL,
            policies: PolicyTable::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Example: `CABLE_REPLICATION_TTL=5`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `CABLE_*` overrides from any key/value source
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        const DEFAULT_CHANNEL: &str = "CABLE_CLIENT_DEFAULT_CHANNEL";
        const PAGE_LIMIT: &str = "CABLE_CLIENT_PAGE_LIMIT";
        const TTL: &str = "CABLE_REPLICATION_TTL";
        const HOPS: &str = "CABLE_REPLICATION_HOPS";
        const LIST_LIMIT: &str = "CABLE_REPLICATION_CHANNEL_LIST_LIMIT";
        const RENEWAL_SECS: &str = "CABLE_REPLICATION_RENEWAL_SECS";
        const LOG_LEVEL: &str = "CABLE_LOG_LEVEL";
        const LOG_JSON: &str = "CABLE_LOG_JSON";

        if let Some(channel) = lookup(DEFAULT_CHANNEL) {
            self.client.default_channel = channel;
        }
        if let Some(limit) = lookup(PAGE_LIMIT) {
            self.client.page_limit = parse_var(PAGE_LIMIT, &limit)?;
        }
        if let Some(ttl) = lookup(TTL) {
            self.replication.ttl = parse_var(TTL, &ttl)?;
        }
        if let Some(hops) = lookup(HOPS) {
            self.replication.hops = parse_var(HOPS, &hops)?;
        }
        if let Some(limit) = lookup(LIST_LIMIT) {
            self.replication.channel_list_limit = parse_var(LIST_LIMIT, &limit)?;
        }
        if let Some(secs) = lookup(RENEWAL_SECS) {
            let secs: u64 = parse_var(RENEWAL_SECS, &secs)?;
            self.replication.channel_list_renewal_interval = Duration::from_secs(secs);
        }
        if let Some(level) = lookup(LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(json) = lookup(LOG_JSON) {
            self.logging.json_format = parse_var(LOG_JSON, &json)?;
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.default_channel.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "default_channel must not be empty".to_string(),
            ));
        }

        if self.client.page_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "page_limit must be greater than 0".to_string(),
            ));
        }

        if self.replication.channel_list_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "channel_list_limit must be greater than 0".to_string(),
            ));
        }

        if self.replication.channel_list_renewal_interval.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "channel_list_renewal_interval must be greater than 0".to_string(),
            ));
        }

        if self.replication.policies.dropped.replicates() {
            return Err(ConfigError::ValidationFailed(
                "the dropped policy must have a zero window".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }
}
