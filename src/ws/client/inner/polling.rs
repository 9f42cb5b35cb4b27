use std::{fmt::Debug, sync::Arc, time::Duration};

use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::refresh::Refresh;

/// Timer driven refresh while the feed is not connected
pub(crate) struct Poller {
    period: Duration,
    refresher: Arc<dyn Refresh>,
    interval: Option<Interval>,
}

impl Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("period", &self.period)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Poller {
    pub fn new(period: Duration, refresher: Arc<dyn Refresh>) -> Self {
        Self {
            period,
            refresher,
            interval: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.interval.is_some()
    }

    pub fn refresher(&self) -> Arc<dyn Refresh> {
        Arc::clone(&self.refresher)
    }

    /// No-op while already active. First tick comes one period after start.
    pub fn start(&mut self) {
        if self.interval.is_some() {
            return;
        }

        log::debug!("Polling fallback start, every {:?}", self.period);

        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.interval = Some(interval);
    }

    /// No-op while inactive
    pub fn stop(&mut self) {
        if self.interval.take().is_some() {
            log::debug!("Polling fallback stop");
        }
    }

    /// Resolves on the next tick, never while inactive
    pub async fn tick(&mut self) {
        match self.interval {
            Some(ref mut interval) => {
                interval.tick().await;
            }
            None => futures_util::future::pending().await,
        }
    }
}

/// Wait for the next tick of an optional poller, returning the refresher to run
pub(crate) async fn next_tick(poller: &mut Option<Poller>) -> Arc<dyn Refresh> {
    match poller {
        Some(poller) => {
            poller.tick().await;
            log::trace!("Polling fallback tick");
            poller.refresher()
        }
        None => futures_util::future::pending().await,
    }
}
