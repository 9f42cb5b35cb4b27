//! Feed client configuration

use std::time::Duration;

use snafu::prelude::*;

/// env var of the feed base url
pub const ENV_URL: &str = "BUSINESS_FEED_WS_URL";
/// env var of the reconnect interval, in milliseconds
pub const ENV_RECONNECT_INTERVAL_MS: &str = "BUSINESS_FEED_RECONNECT_INTERVAL_MS";
/// env var of the reconnect attempt cap
pub const ENV_MAX_RECONNECT_ATTEMPTS: &str = "BUSINESS_FEED_MAX_RECONNECT_ATTEMPTS";

/// Error when load configuration
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum ConfigError {
    /// required variable is not set
    #[snafu(display("missing required variable {name}"))]
    MissingVar {
        /// variable name
        name: String,
    },

    /// variable is not an unsigned number
    #[snafu(display("variable {name}={value} is not a valid number: {source}"))]
    InvalidNumber {
        /// variable name
        name: String,
        /// variable value
        value: String,
        /// source error
        source: std::num::ParseIntError,
    },
}

/// Feed client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// base websocket url, `ws://` or `wss://`
    pub url: String,
    /// fixed delay between an abnormal close and the next connection attempt
    pub reconnect_interval: Duration,
    /// automatic attempts before giving up, manual reconnect is always possible
    pub max_reconnect_attempts: u32,
    /// run the fallback refresher once when a lost connection opens again
    pub refresh_on_reconnect: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_interval: Duration::from_secs(3),
            max_reconnect_attempts: 10,
            refresh_on_reconnect: true,
        }
    }
}

impl Config {
    /// Create a new configuration with the given url.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the reconnect interval.
    #[must_use]
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set the reconnect attempt cap.
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set whether the fallback refresher runs after a reconnection.
    #[must_use]
    pub fn refresh_on_reconnect(mut self, enable: bool) -> Self {
        self.refresh_on_reconnect = enable;
        self
    }

    /// Load configuration from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(ENV_URL).with_context(|| error::MissingVar { name: ENV_URL })?;

        let mut config = Self::new(url);

        if let Some(ms) = parse_number(&lookup, ENV_RECONNECT_INTERVAL_MS)? {
            config.reconnect_interval = Duration::from_millis(ms);
        }

        if let Some(attempts) = parse_number(&lookup, ENV_MAX_RECONNECT_ATTEMPTS)? {
            config.max_reconnect_attempts = attempts;
        }

        log::debug!("Loaded config: {:?}", config);

        Ok(config)
    }
}

fn parse_number<F, N>(lookup: &F, name: &str) -> Result<Option<N>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    N: std::str::FromStr<Err = std::num::ParseIntError>,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .with_context(|_| error::InvalidNumber { name, value }),
        None => Ok(None),
    }
}
