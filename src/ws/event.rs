//! Business events carried in [Envelope](super::message::Envelope) payloads.

use enum_as_inner::EnumAsInner;

use super::message::Envelope;

/// Known envelope type tags
pub mod kind {
    /// new reservation, lodging feeds
    pub const RESERVATION_CREATED: &str = "reserva:nueva";
    /// reservation changed, lodging feeds
    pub const RESERVATION_UPDATED: &str = "reserva:actualizada";
    /// new order, restaurant feeds
    pub const ORDER_CREATED: &str = "pedido:nuevo";
    /// order changed, restaurant feeds
    pub const ORDER_UPDATED: &str = "pedido:actualizado";
}

/// Payload is kept as raw json, its schema belongs to the business layer
pub type Payload = serde_json::Value;

/// Event type
#[derive(Debug, Clone, PartialEq, EnumAsInner)]
pub enum Event {
    /// `reserva:nueva`
    ReservationCreated(Payload),
    /// `reserva:actualizada`
    ReservationUpdated(Payload),
    /// `pedido:nuevo`
    OrderCreated(Payload),
    /// `pedido:actualizado`
    OrderUpdated(Payload),
}

impl Event {
    /// Recognize a known event, `None` for any other envelope type
    pub fn from_envelope(envelope: &Envelope) -> Option<Self> {
        let payload = envelope.payload.clone();
        let event = match envelope.kind.as_str() {
            kind::RESERVATION_CREATED => Self::ReservationCreated(payload),
            kind::RESERVATION_UPDATED => Self::ReservationUpdated(payload),
            kind::ORDER_CREATED => Self::OrderCreated(payload),
            kind::ORDER_UPDATED => Self::OrderUpdated(payload),
            _ => return None,
        };
        Some(event)
    }

    /// envelope type tag of this event
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReservationCreated(_) => kind::RESERVATION_CREATED,
            Self::ReservationUpdated(_) => kind::RESERVATION_UPDATED,
            Self::OrderCreated(_) => kind::ORDER_CREATED,
            Self::OrderUpdated(_) => kind::ORDER_UPDATED,
        }
    }
}
