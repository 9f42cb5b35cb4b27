mod closed;
mod connecting;
mod open;
mod polling;
mod reconnect;

use std::{fmt::Debug, sync::Arc, time::Duration};

use futures_util::future::BoxFuture;
use tokio::{
    sync::{mpsc, watch},
    task::{JoinError, JoinHandle, JoinSet},
};

pub(crate) use reconnect::ReconnectPolicy;

use super::{ConnectionState, Snapshot};
use crate::{
    auth::TokenProvider,
    dispatch::Dispatcher,
    refresh::Refresh,
    ws::{
        endpoint::Endpoint,
        message::{Envelope, EnvelopeStreamSink, SubscriptionKey},
        transport::{Connector, WsError},
    },
};
use polling::Poller;
use reconnect::RetryTimer;

/// Upper bound for a graceful socket close on teardown
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub(crate) enum Command {
    Send(Envelope),
    Reconnect,
    Close,
}

type PendingConnect<T> = BoxFuture<'static, Result<T, WsError>>;

pub(crate) enum Phase<T> {
    Connecting(PendingConnect<T>),
    Open(EnvelopeStreamSink<T>),
    Closed(Option<RetryTimer>),
}

/// Polling fallback settings
#[derive(Clone)]
pub(crate) struct Fallback {
    pub period: Duration,
    pub refresher: Arc<dyn Refresh>,
}

/// Everything needed to start a connection manager, shared by all keys of one connection
pub(crate) struct Settings<C> {
    pub endpoint: Endpoint,
    pub connector: Arc<C>,
    pub tokens: Arc<dyn TokenProvider>,
    pub dispatcher: Arc<Dispatcher>,
    pub policy: ReconnectPolicy,
    pub fallback: Option<Fallback>,
    pub refresh_on_reconnect: bool,
}

impl<C> Clone for Settings<C> {
    fn clone(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            connector: Arc::clone(&self.connector),
            tokens: Arc::clone(&self.tokens),
            dispatcher: Arc::clone(&self.dispatcher),
            policy: self.policy,
            fallback: self.fallback.clone(),
            refresh_on_reconnect: self.refresh_on_reconnect,
        }
    }
}

impl<C> Debug for Settings<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("endpoint", &self.endpoint)
            .field("dispatcher", &self.dispatcher)
            .field("policy", &self.policy)
            .field("fallback", &self.fallback.as_ref().map(|f| f.period))
            .field("refresh_on_reconnect", &self.refresh_on_reconnect)
            .finish()
    }
}

impl<C: Connector> Settings<C> {
    pub fn spawn(
        &self,
        key: SubscriptionKey,
    ) -> (
        mpsc::UnboundedSender<Command>,
        watch::Receiver<Snapshot>,
        JoinHandle<()>,
    ) {
        let (command_tx, commands) = mpsc::unbounded_channel();

        let poller = self
            .fallback
            .as_ref()
            .map(|f| Poller::new(f.period, Arc::clone(&f.refresher)));

        let (snapshot, snapshot_rx) = watch::channel(Snapshot::initial(poller.is_some()));

        let manager = Manager {
            key,
            endpoint: self.endpoint.clone(),
            connector: Arc::clone(&self.connector),
            tokens: Arc::clone(&self.tokens),
            dispatcher: Arc::clone(&self.dispatcher),
            policy: self.policy,
            poller,
            refresh_on_reconnect: self.refresh_on_reconnect,
            commands,
            snapshot,
            attempts: 0,
            epochs: 0,
            refreshes: JoinSet::new(),
        };

        let task = tokio::spawn(manager.run());

        (command_tx, snapshot_rx, task)
    }
}

/// Owns the socket, the retry timer and the polling timer of one subscription
pub(crate) struct Manager<C: Connector> {
    key: SubscriptionKey,
    endpoint: Endpoint,
    connector: Arc<C>,
    tokens: Arc<dyn TokenProvider>,
    dispatcher: Arc<Dispatcher>,
    policy: ReconnectPolicy,
    poller: Option<Poller>,
    refresh_on_reconnect: bool,
    commands: mpsc::UnboundedReceiver<Command>,
    snapshot: watch::Sender<Snapshot>,
    attempts: u32,
    /// times the socket reached open
    epochs: u64,
    refreshes: JoinSet<()>,
}

impl<C: Connector> Manager<C> {
    async fn run(mut self) {
        log::debug!("Connection manager of {} start", self.key);

        let mut phase = Some(self.connect());

        while let Some(current) = phase.take() {
            phase = match current {
                Phase::Connecting(pending) => self.connecting(pending).await,
                Phase::Open(stream) => self.open(stream).await,
                Phase::Closed(retry) => self.closed(retry).await,
            };
        }

        self.stop().await;

        log::debug!("Connection manager of {} stop", self.key);
    }

    fn transition(&mut self, state: ConnectionState) {
        log::debug!("{} move to {} state", self.key, state);

        if let Some(ref mut poller) = self.poller {
            if state == ConnectionState::Open {
                poller.stop();
            } else {
                poller.start();
            }
        }

        let polling = self.polling();
        let attempts = self.attempts;
        self.snapshot.send_modify(|s| {
            s.state = state;
            s.polling = polling;
            s.reconnect_attempts = attempts;
            s.exhausted = false;
        });
    }

    fn polling(&self) -> bool {
        self.poller.as_ref().is_some_and(Poller::is_active)
    }

    /// Move to connecting state, starting a new attempt
    fn connect(&mut self) -> Phase<C::Transport> {
        self.transition(ConnectionState::Connecting);

        let url = self.endpoint.url(&self.key, self.tokens.token().as_deref());
        log::info!(
            "Connecting feed {} at {}{}",
            self.key,
            url.origin().ascii_serialization(),
            url.path()
        );

        let connector = Arc::clone(&self.connector);
        Phase::Connecting(Box::pin(async move { connector.connect(&url).await }))
    }

    /// Consumer asked for a fresh connection, the cap does not apply
    fn reconnect(&mut self) -> Phase<C::Transport> {
        log::info!("Manual reconnect of {}, reset attempt counter", self.key);
        // never open -> connecting directly
        self.transition(ConnectionState::Closed);
        self.attempts = 0;
        self.connect()
    }

    /// Socket lost without the consumer asking for it, consult the reconnect policy
    fn lost(&mut self) -> Phase<C::Transport> {
        self.transition(ConnectionState::Closed);

        match self.policy.schedule(self.attempts) {
            Some(timer) => {
                self.attempts += 1;
                log::info!(
                    "Reconnect {} in {:?}, attempt {}/{}",
                    self.key,
                    self.policy.interval,
                    self.attempts,
                    self.policy.max_attempts
                );

                let attempts = self.attempts;
                self.snapshot.send_modify(|s| s.reconnect_attempts = attempts);

                Phase::Closed(Some(timer))
            }
            None => {
                log::warn!(
                    "Feed {} disconnected, giving up automatic retries after {} attempts",
                    self.key,
                    self.attempts
                );
                self.snapshot.send_modify(|s| s.exhausted = true);

                Phase::Closed(None)
            }
        }
    }

    fn deliver(&mut self, envelope: Envelope) {
        log::trace!("Received {} envelope on {}", envelope.kind, self.key);

        let envelope = Arc::new(envelope);
        self.snapshot
            .send_modify(|s| s.last_message = Some(Arc::clone(&envelope)));

        self.dispatcher.dispatch(&envelope);
    }

    fn drop_send(&self, envelope: &Envelope) {
        log::warn!(
            "Feed {} not connected, drop outgoing {} envelope",
            self.key,
            envelope.kind
        );
    }

    fn refresh(&mut self, refresher: Arc<dyn Refresh>) {
        log::debug!("Run fallback refresh of {}", self.key);
        self.refreshes.spawn(async move { refresher.refresh().await });
    }

    /// Cancel timers and wait until every in-flight refresh is gone
    async fn stop(&mut self) {
        if let Some(ref mut poller) = self.poller {
            poller.stop();
        }

        self.refreshes.abort_all();
        while let Some(result) = self.refreshes.join_next().await {
            reaped(result);
        }

        self.snapshot.send_modify(|s| {
            s.state = ConnectionState::Closed;
            s.polling = false;
        });
    }
}

fn reaped(result: Result<(), JoinError>) {
    if let Err(err) = result {
        if err.is_panic() {
            log::warn!("Fallback refresh panicked: {}", err);
        }
    }
}
