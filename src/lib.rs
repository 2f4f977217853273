// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod format;
pub mod geo;
pub mod ingest;
pub mod metrics;
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::engine::{AlertEngine, CycleReport};
pub use crate::error::{DeliveryError, EvaluateError, FetchError, FormatError};
pub use crate::evaluate::{Subscriber, SubscriberEvaluator};
pub use crate::geo::{ImpactEstimate, Location};
pub use crate::ingest::types::{Depth, Event, ReportKind, SourceId, SourceProvider};
pub use crate::notify::{ChannelKind, ChannelRegistry, FormattedAlert, NotificationRouter, Notifier};

use std::time::Duration;

/// Shared HTTP client for feeds and push/chat/SMS delivery. Every request is
/// bounded by `timeout`.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}
