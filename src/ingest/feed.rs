// src/ingest/feed.rs
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::FetchError;
use crate::ingest::types::{Event, SourceId, SourceProvider};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Last fingerprint surfaced by one feed.
///
/// `None` until the first successful poll. Once seeded it never goes back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDedupState {
    last_fingerprint: Option<String>,
}

impl FeedDedupState {
    pub fn is_seeded(&self) -> bool {
        self.last_fingerprint.is_some()
    }

    pub fn last_fingerprint(&self) -> Option<&str> {
        self.last_fingerprint.as_deref()
    }

    /// Record `fingerprint` and report whether it should be surfaced.
    ///
    /// - unseeded, normal mode: seed silently (no replay of history at startup)
    /// - unseeded, test mode: compare against the empty fingerprint
    /// - seeded: surface only on change
    pub fn observe(&mut self, fingerprint: &str, test_mode: bool) -> bool {
        if self.last_fingerprint.is_none() && !test_mode {
            self.last_fingerprint = Some(fingerprint.to_string());
            return false;
        }

        let previous = self.last_fingerprint.as_deref().unwrap_or_default();
        if previous == fingerprint {
            self.last_fingerprint = Some(fingerprint.to_string());
            return false;
        }

        self.last_fingerprint = Some(fingerprint.to_string());
        true
    }
}

/// One upstream feed plus the dedup state that only it touches.
pub struct SourceFeed {
    provider: Arc<dyn SourceProvider>,
    state: FeedDedupState,
    test_mode: bool,
    timeout: Duration,
}

impl SourceFeed {
    pub fn new(provider: Arc<dyn SourceProvider>, test_mode: bool) -> Self {
        Self {
            provider,
            state: FeedDedupState::default(),
            test_mode,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn source_id(&self) -> SourceId {
        self.provider.source_id()
    }

    pub fn name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn state(&self) -> &FeedDedupState {
        &self.state
    }

    pub(crate) fn provider(&self) -> Arc<dyn SourceProvider> {
        Arc::clone(&self.provider)
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch the latest report and run it through dedup.
    pub async fn poll(&mut self) -> Result<Option<Event>, FetchError> {
        let latest = fetch_with_timeout(self.provider(), self.timeout).await?;
        Ok(self.observe(latest))
    }

    /// Dedup step on its own; the aggregator fetches concurrently and then
    /// feeds results back through here in registration order.
    pub fn observe(&mut self, latest: Option<Event>) -> Option<Event> {
        let event = latest?;
        let was_seeded = self.state.is_seeded();

        if self.state.observe(&event.fingerprint, self.test_mode) {
            info!(
                target: "ingest",
                source = self.name(),
                fingerprint = %event.fingerprint,
                magnitude = event.magnitude,
                location = %event.location_name,
                "new event"
            );
            Some(event)
        } else {
            if was_seeded {
                debug!(target: "ingest", source = self.name(), "no new data");
            } else {
                info!(
                    target: "ingest",
                    source = self.name(),
                    fingerprint = %event.fingerprint,
                    "seeded feed state"
                );
            }
            None
        }
    }
}

/// Run one provider fetch under the per-request deadline.
pub(crate) async fn fetch_with_timeout(
    provider: Arc<dyn SourceProvider>,
    timeout: Duration,
) -> Result<Option<Event>, FetchError> {
    match tokio::time::timeout(timeout, provider.fetch_latest()).await {
        Ok(res) => res,
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_seeds_without_surfacing() {
        let mut st = FeedDedupState::default();
        assert!(!st.is_seeded());
        assert!(!st.observe("a", false));
        assert_eq!(st.last_fingerprint(), Some("a"));
        assert!(!st.observe("a", false));
        assert!(st.observe("b", false));
        assert_eq!(st.last_fingerprint(), Some("b"));
    }

    #[test]
    fn test_mode_surfaces_first_observation() {
        let mut st = FeedDedupState::default();
        assert!(st.observe("a", true));
        assert!(!st.observe("a", true));
        assert!(st.observe("b", true));
    }

    #[test]
    fn test_mode_empty_fingerprint_matches_unset_state() {
        let mut st = FeedDedupState::default();
        assert!(!st.observe("", true));
        assert!(st.is_seeded());
    }

    #[test]
    fn flip_back_to_older_fingerprint_is_new() {
        let mut st = FeedDedupState::default();
        st.observe("a", false);
        assert!(st.observe("b", false));
        assert!(st.observe("a", false));
    }
}
