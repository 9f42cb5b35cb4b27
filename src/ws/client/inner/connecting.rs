use futures_util::SinkExt;

use super::{polling, reaped, Command, Manager, Phase, PendingConnect};
use crate::ws::{
    client::ConnectionState,
    message::{Envelope, EnvelopeStreamSink},
    transport::Connector,
};

impl<C: Connector> Manager<C> {
    pub(super) async fn connecting(
        &mut self,
        mut pending: PendingConnect<C::Transport>,
    ) -> Option<Phase<C::Transport>> {
        loop {
            tokio::select! {
                result = &mut pending => {
                    return Some(match result {
                        Ok(transport) => self.established(transport).await,
                        Err(err) => {
                            log::warn!("Connect feed {} failed: {}", self.key, err);
                            self.lost()
                        }
                    });
                }

                command = self.commands.recv() => match command {
                    Some(Command::Send(envelope)) => self.drop_send(&envelope),
                    // drops the pending attempt
                    Some(Command::Reconnect) => return Some(self.reconnect()),
                    Some(Command::Close) | None => return None,
                },

                refresher = polling::next_tick(&mut self.poller) => self.refresh(refresher),

                Some(result) = self.refreshes.join_next(), if !self.refreshes.is_empty() => reaped(result),
            }
        }
    }

    /// Handshake done: open state first, then the subscribe envelope before any other traffic
    async fn established(&mut self, transport: C::Transport) -> Phase<C::Transport> {
        let mut stream = EnvelopeStreamSink::new(transport);

        self.attempts = 0;
        self.epochs += 1;
        self.transition(ConnectionState::Open);

        log::info!("Feed {} connected", self.key);

        let subscribe = Envelope::subscribe(&self.key);
        log::debug!("Send subscribe envelope: {:?}", subscribe);

        if let Err(err) = stream.send(subscribe).await {
            log::warn!("Send subscribe envelope of {} failed: {}", self.key, err);
            return self.lost();
        }

        if self.epochs > 1 && self.refresh_on_reconnect {
            if let Some(refresher) = self.poller.as_ref().map(|p| p.refresher()) {
                log::debug!("Reconnected, reconcile missed events of {}", self.key);
                self.refresh(refresher);
            }
        }

        Phase::Open(stream)
    }
}
