// src/ingest/mod.rs
pub mod feed;
pub mod providers;
pub mod types;

use std::time::Duration;

use metrics::{counter, gauge};
use tokio::task::JoinSet;

use crate::error::FetchError;
use crate::ingest::feed::{fetch_with_timeout, SourceFeed};
use crate::ingest::types::Event;
use crate::metrics::{
    ensure_metrics_described, EVENTS_TOTAL, FEED_ERRORS_TOTAL, FEED_POLLS_TOTAL, LAST_CYCLE_TS,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Owns every [`SourceFeed`] and polls them together once per cycle.
pub struct FeedAggregator {
    feeds: Vec<SourceFeed>,
    interval: Duration,
}

impl Default for FeedAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl FeedAggregator {
    pub fn new(interval: Duration) -> Self {
        Self {
            feeds: Vec::new(),
            interval,
        }
    }

    pub fn with_feed(mut self, feed: SourceFeed) -> Self {
        self.register(feed);
        self
    }

    pub fn register(&mut self, feed: SourceFeed) {
        self.feeds.push(feed);
    }

    pub fn feeds(&self) -> &[SourceFeed] {
        &self.feeds
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one poll cycle.
    ///
    /// Fetches run concurrently; dedup is then applied per feed in
    /// registration order, so the returned events keep that order. A failed,
    /// timed-out or panicked fetch only costs that feed its cycle.
    pub async fn poll_cycle(&mut self) -> Vec<Event> {
        ensure_metrics_described();

        let mut set = JoinSet::new();
        for (idx, feed) in self.feeds.iter().enumerate() {
            let provider = feed.provider();
            let timeout = feed.timeout();
            counter!(FEED_POLLS_TOTAL, "source" => feed.name()).increment(1);
            set.spawn(async move { (idx, fetch_with_timeout(provider, timeout).await) });
        }

        let mut results: Vec<Option<Result<Option<Event>, FetchError>>> =
            (0..self.feeds.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, res)) => results[idx] = Some(res),
                Err(e) => {
                    tracing::error!(target: "ingest", error = %e, "feed task aborted");
                    counter!(FEED_ERRORS_TOTAL, "source" => "unknown").increment(1);
                }
            }
        }

        let mut events = Vec::new();
        let mut failed = 0usize;
        for (feed, res) in self.feeds.iter_mut().zip(results) {
            match res {
                Some(Ok(latest)) => {
                    if let Some(ev) = feed.observe(latest) {
                        counter!(EVENTS_TOTAL, "source" => feed.name()).increment(1);
                        events.push(ev);
                    }
                }
                Some(Err(e)) => {
                    failed += 1;
                    tracing::warn!(target: "ingest", source = feed.name(), error = %e, "feed poll failed");
                    counter!(FEED_ERRORS_TOTAL, "source" => feed.name()).increment(1);
                }
                None => failed += 1,
            }
        }

        if !self.feeds.is_empty() && failed == self.feeds.len() {
            tracing::error!(target: "ingest", feeds = failed, "every feed failed this cycle");
        }

        let now = chrono::Utc::now().timestamp().max(0);
        gauge!(LAST_CYCLE_TS).set(now as f64);

        events
    }
}
