//! crate error types

use snafu::prelude::*;

use super::config::ConfigError;
use super::ws::ParseEndpointError;

/// crate result type
pub type Result<T> = std::result::Result<T, Error>;

/// crate error type
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum Error {
    /// Load configuration failed
    #[snafu(display("invalid configuration: {source}"))]
    InvalidConfig {
        /// source error
        source: ConfigError,
    },

    /// Configured feed url is not a valid websocket endpoint
    #[snafu(display("invalid feed endpoint url {url}"))]
    InvalidEndpoint {
        /// configured url
        url: String,
        /// source error
        source: ParseEndpointError,
    },

    /// Polling fallback interval must be positive
    #[snafu(display("polling fallback interval must be positive, got {interval:?}"))]
    ZeroPollInterval {
        /// requested interval
        interval: std::time::Duration,
    },
}
