use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};

use tokio::time::{Instant, Sleep};

/// Fixed interval retry with an attempt cap
#[derive(Debug, Copy, Clone)]
pub(crate) struct ReconnectPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

/// One-shot timer for the next connection attempt
#[derive(Debug)]
pub(crate) struct RetryTimer {
    sleep: Pin<Box<Sleep>>,
}

impl RetryTimer {
    #[cfg(test)]
    pub fn deadline(&self) -> Instant {
        self.sleep.deadline()
    }
}

impl Future for RetryTimer {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.sleep.as_mut().poll(cx)
    }
}

impl ReconnectPolicy {
    /// `None` once `attempts` reached the cap
    pub fn schedule(&self, attempts: u32) -> Option<RetryTimer> {
        if attempts >= self.max_attempts {
            return None;
        }

        Some(RetryTimer {
            sleep: Box::pin(tokio::time::sleep_until(Instant::now() + self.interval)),
        })
    }
}
