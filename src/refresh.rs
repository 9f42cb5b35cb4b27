//! Refresh callbacks for the polling fallback.

use std::future::Future;

/// Refresh re-fetches business data by other means (usually REST) while the
/// feed is not connected. Its result and errors are its own business.
#[async_trait::async_trait]
pub trait Refresh: Send + Sync {
    /// callback will be executed on every polling tick
    async fn refresh(&self);
}

#[async_trait::async_trait]
impl<F, Fut> Refresh for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn refresh(&self) {
        self().await
    }
}
