//! Access token source for the feed handshake.

/// Provides the current session token, if any.
///
/// Session management lives elsewhere, the feed only asks for the token on
/// every connection attempt and sends it as the `token` query parameter.
pub trait TokenProvider: Send + Sync {
    /// current token, `None` for anonymous connections
    fn token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Token provider for anonymous connections
#[derive(Debug, Copy, Clone, Default)]
pub struct Anonymous;

impl TokenProvider for Anonymous {
    fn token(&self) -> Option<String> {
        None
    }
}
