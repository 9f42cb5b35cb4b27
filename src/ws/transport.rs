//! The seam between the connection manager and the underlying socket.

use futures_util::{Sink, Stream};
use tokio_tungstenite as websocket;
use url::Url;

/// Websocket frame
pub type Frame = websocket::tungstenite::Message;

/// Websocket protocol error
pub type WsError = websocket::tungstenite::Error;

pub(crate) type WebsocketClient =
    websocket::WebSocketStream<websocket::MaybeTlsStream<tokio::net::TcpStream>>;

/// A connected, bidirectional frame stream.
pub trait Transport:
    Stream<Item = Result<Frame, WsError>> + Sink<Frame, Error = WsError> + Send + Unpin + 'static
{
}

impl<T> Transport for T where
    T: Stream<Item = Result<Frame, WsError>> + Sink<Frame, Error = WsError> + Send + Unpin + 'static
{
}

/// Opens transports. One call is one connection attempt.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    /// connected transport type
    type Transport: Transport;

    /// try to open a connection to url
    async fn connect(&self, url: &Url) -> Result<Self::Transport, WsError>;
}

/// Connector backed by tokio-tungstenite
#[derive(Debug, Default, Copy, Clone)]
pub struct TungsteniteConnector;

#[async_trait::async_trait]
impl Connector for TungsteniteConnector {
    type Transport = WebsocketClient;

    async fn connect(&self, url: &Url) -> Result<Self::Transport, WsError> {
        let (ws, _) = websocket::connect_async(url.as_str()).await?;
        Ok(ws)
    }
}
