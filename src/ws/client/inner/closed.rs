use futures_util::future;

use super::{polling, reaped, reconnect::RetryTimer, Command, Manager, Phase};
use crate::ws::transport::Connector;

impl<C: Connector> Manager<C> {
    /// Wait in closed state, for the retry timer if one is scheduled
    pub(super) async fn closed(&mut self, retry: Option<RetryTimer>) -> Option<Phase<C::Transport>> {
        let retry = async move {
            match retry {
                Some(timer) => timer.await,
                None => future::pending().await,
            }
        };
        tokio::pin!(retry);

        loop {
            tokio::select! {
                _ = &mut retry => {
                    log::debug!("Retry timer of {} fired", self.key);
                    return Some(self.connect());
                }

                command = self.commands.recv() => match command {
                    Some(Command::Send(envelope)) => self.drop_send(&envelope),
                    Some(Command::Reconnect) => return Some(self.reconnect()),
                    Some(Command::Close) | None => return None,
                },

                refresher = polling::next_tick(&mut self.poller) => self.refresh(refresher),

                Some(result) = self.refreshes.join_next(), if !self.refreshes.is_empty() => reaped(result),
            }
        }
    }
}
