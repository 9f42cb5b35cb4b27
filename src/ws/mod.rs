//! Business feed websocket client implement

mod client;
mod endpoint;
pub mod event;
pub mod message;
mod transport;

pub use client::{Connection, ConnectionState, SendError, Snapshot};
pub(crate) use client::{Fallback, ReconnectPolicy, Settings};
pub use endpoint::{Endpoint, ParseEndpointError};
pub use event::Event;
pub use message::{EntityType, Envelope, SubscriptionKey};
pub use transport::{Connector, Frame, Transport, TungsteniteConnector, WsError};
