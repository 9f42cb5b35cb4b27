use std::{fmt::Debug, sync::Arc, time::Duration};

use snafu::prelude::*;

use crate::{
    auth::{Anonymous, TokenProvider},
    config::Config,
    dispatch::Dispatcher,
    error,
    refresh::Refresh,
    ws::{
        Connection, Connector, Endpoint, Fallback, ReconnectPolicy, Settings, SubscriptionKey,
        TungsteniteConnector,
    },
    Result,
};

/// Feed client, opens one [Connection] per subscription
pub struct Client<C: Connector = TungsteniteConnector> {
    config: Config,
    endpoint: Endpoint,
    connector: Arc<C>,
    tokens: Arc<dyn TokenProvider>,
    dispatcher: Arc<Dispatcher>,
}

impl<C: Connector> Debug for Client<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("endpoint", &self.endpoint)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl Client {
    /// Create a client connecting with tokio-tungstenite
    pub fn new(config: Config) -> Result<Self> {
        Self::with_connector(config, TungsteniteConnector)
    }

    /// Create a client from `BUSINESS_FEED_*` environment variables
    pub fn from_env() -> Result<Self> {
        let config = Config::from_env().context(error::InvalidConfig)?;
        Self::new(config)
    }
}

impl<C: Connector> Client<C> {
    /// Create a client with a custom connector
    pub fn with_connector(config: Config, connector: C) -> Result<Self> {
        let endpoint = config
            .url
            .parse::<Endpoint>()
            .with_context(|_| error::InvalidEndpoint { url: &config.url })?;

        log::info!("Create feed client for endpoint {}", endpoint);

        Ok(Self {
            config,
            endpoint,
            connector: Arc::new(connector),
            tokens: Arc::new(Anonymous),
            dispatcher: Arc::new(Dispatcher::new()),
        })
    }

    /// Set the token source used on every connection attempt
    #[must_use]
    pub fn token_provider<P: TokenProvider + 'static>(mut self, provider: P) -> Self {
        self.tokens = Arc::new(provider);
        self
    }

    /// Set handlers run for every envelope of every connection
    #[must_use]
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Arc::new(dispatcher);
        self
    }

    fn settings(&self, fallback: Option<Fallback>) -> Settings<C> {
        Settings {
            endpoint: self.endpoint.clone(),
            connector: Arc::clone(&self.connector),
            tokens: Arc::clone(&self.tokens),
            dispatcher: Arc::clone(&self.dispatcher),
            policy: ReconnectPolicy {
                interval: self.config.reconnect_interval,
                max_attempts: self.config.max_reconnect_attempts,
            },
            fallback,
            refresh_on_reconnect: self.config.refresh_on_reconnect,
        }
    }

    /// Subscribe to the feed of one business. Must be called inside a tokio runtime.
    pub fn connect(&self, key: SubscriptionKey) -> Connection<C> {
        log::debug!("Open connection for {}", key);
        Connection::spawn(self.settings(None), key)
    }

    /// Like [connect](Self::connect), and runs `refresher` every `interval`
    /// while the feed is not connected. `interval` must not be zero.
    pub fn connect_with_fallback<R>(
        &self,
        key: SubscriptionKey,
        refresher: R,
        interval: Duration,
    ) -> Result<Connection<C>>
    where
        R: Refresh + 'static,
    {
        ensure!(!interval.is_zero(), error::ZeroPollInterval { interval });

        log::debug!(
            "Open connection for {} with polling fallback every {:?}",
            key,
            interval
        );

        let fallback = Fallback {
            period: interval,
            refresher: Arc::new(refresher),
        };
        Ok(Connection::spawn(self.settings(Some(fallback)), key))
    }
}
