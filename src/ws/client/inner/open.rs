use futures_util::{SinkExt, StreamExt};

use super::{reaped, Command, Manager, Phase, CLOSE_TIMEOUT};
use crate::ws::{
    message::{Envelope, EnvelopeStreamSink},
    transport::{Connector, Transport},
};

async fn close_stream<T: Transport>(mut stream: EnvelopeStreamSink<T>) {
    match tokio::time::timeout(CLOSE_TIMEOUT, SinkExt::<Envelope>::close(&mut stream)).await {
        Ok(Ok(())) => log::trace!("Socket closed"),
        Ok(Err(err)) => log::debug!("Close socket failed: {}", err),
        Err(_) => log::debug!("Close socket timeout, drop it"),
    }
}

impl<C: Connector> Manager<C> {
    pub(super) async fn open(
        &mut self,
        mut stream: EnvelopeStreamSink<C::Transport>,
    ) -> Option<Phase<C::Transport>> {
        loop {
            tokio::select! {
                item = stream.next() => match item {
                    Some(Ok(envelope)) => self.deliver(envelope),
                    Some(Err(err)) if !err.is_fatal() => {
                        log::warn!("Envelope stream error happened but ignored: {}", err);
                    }
                    Some(Err(err)) => {
                        log::warn!("Feed {} broken: {}", self.key, err);
                        return Some(self.lost());
                    }
                    None => {
                        log::warn!("Feed {} closed by remote", self.key);
                        return Some(self.lost());
                    }
                },

                command = self.commands.recv() => match command {
                    Some(Command::Send(envelope)) => {
                        log::trace!("Send {} envelope on {}", envelope.kind, self.key);

                        if let Err(err) = stream.send(envelope).await {
                            if err.is_fatal() {
                                log::warn!("Feed {} broken when send envelope: {}", self.key, err);
                                return Some(self.lost());
                            }
                            log::warn!("Send envelope failed but ignored: {}", err);
                        }
                    }
                    Some(Command::Reconnect) => {
                        close_stream(stream).await;
                        return Some(self.reconnect());
                    }
                    Some(Command::Close) | None => {
                        close_stream(stream).await;
                        return None;
                    }
                },

                Some(result) = self.refreshes.join_next(), if !self.refreshes.is_empty() => reaped(result),
            }
        }
    }
}
