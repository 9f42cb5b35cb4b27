//! Feed envelope types.

mod stream;
mod types;

pub use stream::{EnvelopeStreamSink, EnvelopeStreamSinkError};
pub use types::{EntityType, SubscriptionKey};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Type tag of the envelope a client sends right after the socket opens
pub const SUBSCRIBE_TYPE: &str = "subscribe";

/// Error when parse text data as envelope
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)), module(error), context(suffix(false)))]
pub enum ParseEnvelopeError {
    /// data is invalid json
    #[snafu(display("parse json failed: {source}"))]
    ParseJSONFailed {
        /// data for decode
        data: String,
        /// source error
        source: serde_json::Error,
    },

    /// data json is not an object
    #[snafu(display("parsed envelope is not object: {json}"))]
    EnvelopeNotObject {
        /// json string
        json: String,
    },

    /// data json has no type field
    #[snafu(display("envelope has no type field: {json}"))]
    NoEnvelopeType {
        /// json string
        json: String,
    },

    /// data json type field is not a string
    #[snafu(display("envelope has non-string type field: {json}"))]
    EnvelopeTypeNotString {
        /// json string
        json: String,
    },

    /// data json is not valid typed envelope
    #[snafu(display("parse {kind} envelope failed: {source}"))]
    ParseJSONToEnvelopeFailed {
        /// envelope type
        kind: String,
        /// source error
        source: serde_json::Error,
    },
}

/// A typed unit exchanged over the feed socket.
///
/// Inbound envelopes usually carry only `type` and `payload`, the business
/// fields are filled by the subscribe envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// envelope type, e.g. `reserva:nueva`
    #[serde(rename = "type")]
    pub kind: String,
    /// id of the business this envelope belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    /// type of the business this envelope belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_type: Option<EntityType>,
    /// type dependent body, opaque to the connection
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Create an envelope with given type and payload
    pub fn new<S: Into<String>>(kind: S, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            business_id: None,
            business_type: None,
            payload,
        }
    }

    /// Build the subscribe envelope for a subscription key
    pub fn subscribe(key: &SubscriptionKey) -> Self {
        Self {
            kind: SUBSCRIBE_TYPE.to_string(),
            business_id: Some(key.entity_id.clone()),
            business_type: Some(key.entity_type),
            payload: serde_json::Value::Null,
        }
    }

    /// true if this is a subscribe envelope
    pub fn is_subscribe(&self) -> bool {
        self.kind == SUBSCRIBE_TYPE
    }

    /// Decode a text frame to an envelope
    pub fn decode(data: &str) -> Result<Self, ParseEnvelopeError> {
        let value: serde_json::Value =
            serde_json::from_str(data).context(error::ParseJSONFailed { data })?;

        let obj = value
            .as_object()
            .with_context(|| error::EnvelopeNotObject { json: data })?;

        let kind = obj
            .get("type")
            .with_context(|| error::NoEnvelopeType { json: data })?
            .as_str()
            .with_context(|| error::EnvelopeTypeNotString { json: data })?
            .to_string();

        serde_json::from_value(value).context(error::ParseJSONToEnvelopeFailed { kind })
    }

    /// Encode to a json text frame
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
