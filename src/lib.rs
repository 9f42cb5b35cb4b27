//! # Business feed
//!
//! Real-time order and reservation feed for business back offices.
//!
//! A [Client] opens one [Connection](ws::Connection) per business. Each
//! connection keeps its websocket alive with a fixed interval reconnect
//! policy, exposes the latest received envelope, and can run a polling
//! fallback while the socket is down.

#![deny(clippy::all)]
#![deny(missing_debug_implementations, missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod refresh;
pub mod ws;

mod client;
mod error;

pub use client::Client;
pub use config::Config;
pub use error::{Error, Result};
