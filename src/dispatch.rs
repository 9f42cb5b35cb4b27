//! Envelope handlers, routed by envelope type.

use std::{collections::HashMap, fmt::Debug};

use crate::ws::Envelope;

/// Handler can be registered to a dispatcher and process envelopes of one type.
pub trait Handler: Send + Sync {
    /// callback will be executed for every envelope of the registered type
    fn handle(&self, envelope: &Envelope);
}

impl<F> Handler for F
where
    F: Fn(&Envelope) + Send + Sync,
{
    fn handle(&self, envelope: &Envelope) {
        self(envelope)
    }
}

/// Routes envelopes to handlers by exact `type` match.
///
/// Types without handlers are ignored, so the server can add new event types
/// without breaking older clients.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<String, Vec<Box<dyn Handler>>>,
}

impl Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Dispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for envelope type `kind`
    #[must_use]
    pub fn on<S, H>(mut self, kind: S, handler: H) -> Self
    where
        S: Into<String>,
        H: Handler + 'static,
    {
        self.handlers
            .entry(kind.into())
            .or_default()
            .push(Box::new(handler));
        self
    }

    /// Process one envelope, returns false if no handler is registered for its type
    pub fn dispatch(&self, envelope: &Envelope) -> bool {
        match self.handlers.get(&envelope.kind) {
            Some(handlers) => {
                log::trace!(
                    "Dispatch {} envelope to {} handler(s)",
                    envelope.kind,
                    handlers.len()
                );
                for handler in handlers {
                    handler.handle(envelope);
                }
                true
            }
            None => {
                log::trace!("No handler for {} envelope, ignored", envelope.kind);
                false
            }
        }
    }
}
