mod inner;

#[cfg(test)]
mod tests;

use std::{fmt::Debug, sync::Arc};

use snafu::prelude::*;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

pub(crate) use inner::{Fallback, ReconnectPolicy, Settings};

use super::{
    message::{Envelope, SubscriptionKey},
    transport::{Connector, TungsteniteConnector},
};
use inner::Command;

/// State of the feed socket of one subscription
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// handshake in progress
    Connecting,
    /// socket open and subscribed
    Open,
    /// no socket, a retry may be pending
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

/// Everything a consumer can observe about a subscription, published as one value
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// socket state
    pub state: ConnectionState,
    /// most recent decoded envelope, kept across reconnections
    pub last_message: Option<Arc<Envelope>>,
    /// scheduled automatic retries since the socket was last open
    pub reconnect_attempts: u32,
    /// true while the polling fallback timer runs
    pub polling: bool,
    /// true once automatic retries are given up, until the next attempt
    pub exhausted: bool,
}

impl Snapshot {
    pub(crate) fn initial(polling: bool) -> Self {
        Self {
            state: ConnectionState::Connecting,
            last_message: None,
            reconnect_attempts: 0,
            polling,
            exhausted: false,
        }
    }

    /// true iff state is open
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }
}

/// Error when send an envelope through a connection
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum SendError {
    /// socket of the subscription is not open now
    #[snafu(display("feed is not connected"))]
    NotConnected,

    /// connection manager already stopped
    #[snafu(display("feed connection is shut down"))]
    Shutdown,
}

/// Live subscription to the feed of one business.
///
/// Owns a background connection manager. The manager stops when
/// [close](Self::close) is awaited, or soon after the connection is dropped.
pub struct Connection<C: Connector = TungsteniteConnector> {
    settings: Settings<C>,
    key: SubscriptionKey,
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<Snapshot>,
    task: Option<JoinHandle<()>>,
}

impl<C: Connector> Debug for Connection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("key", &self.key)
            .field("snapshot", &*self.snapshot.borrow())
            .finish()
    }
}

impl<C: Connector> Connection<C> {
    pub(crate) fn spawn(settings: Settings<C>, key: SubscriptionKey) -> Self {
        let (commands, snapshot, task) = settings.spawn(key.clone());
        Self {
            settings,
            key,
            commands,
            snapshot,
            task: Some(task),
        }
    }

    /// subscription key of this connection
    pub fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// true iff the socket is open
    pub fn is_connected(&self) -> bool {
        self.snapshot.borrow().is_connected()
    }

    /// most recent decoded envelope, `None` before the first one
    pub fn last_message(&self) -> Option<Arc<Envelope>> {
        self.snapshot.borrow().last_message.clone()
    }

    /// current state
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver notified on every state change or new message.
    ///
    /// Bound to the current key, [switch](Self::switch) makes it stale.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.clone()
    }

    /// Wait for the next change, false if the manager stopped
    pub async fn changed(&mut self) -> bool {
        self.snapshot.changed().await.is_ok()
    }

    /// Send an envelope. Fails at once unless the socket is open, the
    /// envelope is not queued for later.
    pub fn send(&self, envelope: Envelope) -> Result<(), SendError> {
        ensure!(self.is_connected(), error::NotConnected);

        self.commands
            .send(Command::Send(envelope))
            .map_err(|_| SendError::Shutdown)
    }

    /// Drop the current socket and retry timer, reset the attempt counter and connect again
    pub fn reconnect(&self) {
        if self.commands.send(Command::Reconnect).is_err() {
            log::warn!("Reconnect {} ignored, manager already stopped", self.key);
        }
    }

    /// Move to another subscription key. The old manager is fully stopped
    /// before the new one connects. Same key is a no-op.
    pub async fn switch(&mut self, key: SubscriptionKey) {
        if key == self.key {
            log::debug!("Switch to same key {}, ignored", key);
            return;
        }

        log::info!("Switch subscription {} -> {}", self.key, key);

        self.shutdown().await;

        let (commands, snapshot, task) = self.settings.spawn(key.clone());
        self.key = key;
        self.commands = commands;
        self.snapshot = snapshot;
        self.task = Some(task);
    }

    /// Tear down the subscription. No timer fires and no callback starts
    /// after this returns.
    pub async fn close(mut self) {
        self.shutdown().await
    }

    async fn shutdown(&mut self) {
        let _ = self.commands.send(Command::Close);

        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                log::warn!("Connection manager of {} failed: {}", self.key, err);
            }
        }
    }
}
