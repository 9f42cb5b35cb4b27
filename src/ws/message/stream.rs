use std::task::Poll;

use futures_util::{ready, Sink, SinkExt, Stream, StreamExt};
use snafu::prelude::*;

use super::{Envelope, ParseEnvelopeError};
use crate::ws::transport::{Frame, Transport, WsError};

/// Error when read/write envelope stream/sink
#[derive(Debug, Snafu)]
#[snafu(module(error), context(suffix(false)))]
pub enum EnvelopeStreamSinkError {
    /// underlying websocket stream broken
    #[snafu(display("underlying websocket stream broken: {source}"))]
    Websocket {
        /// source error
        source: WsError,
    },

    /// received a frame that is not utf-8 text
    #[snafu(display("received a non-text frame"))]
    NotTextFrame,

    /// parse text frame data failed
    #[snafu(display("parse frame to envelope failed: {source}"))]
    ParseEnvelopeFailed {
        /// source error
        source: ParseEnvelopeError,
    },

    /// encode outgoing envelope failed
    #[snafu(display("encode envelope failed: {source}"))]
    EncodeFailed {
        /// source error
        source: serde_json::Error,
    },
}

impl EnvelopeStreamSinkError {
    /// Check if this error will make the stream/sink stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Websocket { .. })
    }
}

/// Envelope stream/sink over a websocket transport
#[derive(Debug)]
pub struct EnvelopeStreamSink<T> {
    ws: T,
}

impl<T> EnvelopeStreamSink<T> {
    /// Construct a new stream with underlying websocket connection.
    pub fn new(ws: T) -> Self {
        Self { ws }
    }
}

fn decode_text(text: &str) -> Result<Envelope, EnvelopeStreamSinkError> {
    Envelope::decode(text).map_err(|e| {
        log::trace!("Parse failed frame data: {}", text);
        EnvelopeStreamSinkError::ParseEnvelopeFailed { source: e }
    })
}

impl<T: Transport> Stream for EnvelopeStreamSink<T> {
    type Item = Result<Envelope, EnvelopeStreamSinkError>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        loop {
            let frame = match ready!(self.ws.poll_next_unpin(cx)) {
                Some(frame) => frame.context(error::Websocket)?,
                None => return Poll::Ready(None),
            };

            let result = match frame {
                Frame::Text(text) => decode_text(&text),
                Frame::Binary(data) => match std::str::from_utf8(&data) {
                    Ok(text) => decode_text(text),
                    Err(_) => Err(EnvelopeStreamSinkError::NotTextFrame),
                },
                Frame::Close(frame) => {
                    log::debug!("Received close frame: {:?}", frame);
                    return Poll::Ready(None);
                }
                // ping/pong are answered by the websocket layer
                _ => continue,
            };

            return Poll::Ready(Some(result));
        }
    }
}

impl<T: Transport> Sink<Envelope> for EnvelopeStreamSink<T> {
    type Error = EnvelopeStreamSinkError;

    fn poll_ready(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_ready_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn start_send(mut self: std::pin::Pin<&mut Self>, item: Envelope) -> Result<(), Self::Error> {
        let text = item.encode().context(error::EncodeFailed)?;
        self.ws
            .start_send_unpin(Frame::Text(text))
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_flush_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn poll_close(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_close_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }
}
