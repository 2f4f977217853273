//! # Alert Engine
//! The single driver: poll every feed, evaluate each new event against every
//! subscriber, render, and route. Nothing here is fatal; failures are logged
//! and the loop carries on with the next cycle.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use reqwest::Client;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::evaluate::SubscriberEvaluator;
use crate::format::format_notification;
use crate::ingest::feed::SourceFeed;
use crate::ingest::providers::{
    cenc::{CencProvider, CENC_URL},
    chinaeew::ChinaEewProvider,
    eew::ProvincialEewProvider,
};
use crate::ingest::types::{Event, SourceProvider};
use crate::ingest::FeedAggregator;
use crate::metrics::FORMAT_ERRORS_TOTAL;
use crate::notify::{ChannelRegistry, NotificationRouter};

/// What happened during one cycle (or one event).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub events: usize,
    pub notifications: usize,
    pub format_failures: usize,
    pub deliveries: usize,
    pub delivery_failures: usize,
}

impl CycleReport {
    fn absorb(&mut self, other: CycleReport) {
        self.events += other.events;
        self.notifications += other.notifications;
        self.format_failures += other.format_failures;
        self.deliveries += other.deliveries;
        self.delivery_failures += other.delivery_failures;
    }
}

pub struct AlertEngine {
    aggregator: FeedAggregator,
    evaluator: SubscriberEvaluator,
    router: NotificationRouter,
}

impl AlertEngine {
    pub fn new(aggregator: FeedAggregator, evaluator: SubscriberEvaluator, router: NotificationRouter) -> Self {
        Self {
            aggregator,
            evaluator,
            router,
        }
    }

    /// Wire feeds, subscribers and channel adapters from configuration.
    pub fn from_config(cfg: &AppConfig, client: Client) -> Self {
        let timeout = cfg.request_timeout();

        let mut aggregator = FeedAggregator::new(cfg.poll_interval());
        for provider in providers_from_config(cfg, &client) {
            aggregator.register(SourceFeed::new(provider, cfg.test).with_timeout(timeout));
        }

        let evaluator = SubscriberEvaluator::new(cfg.subscribers(), cfg.test);
        let registry = ChannelRegistry::from_config(&cfg.notify, client, timeout);
        let router = NotificationRouter::new(registry).with_timeout(timeout);

        Self::new(aggregator, evaluator, router)
    }

    pub fn aggregator(&self) -> &FeedAggregator {
        &self.aggregator
    }

    pub fn evaluator(&self) -> &SubscriberEvaluator {
        &self.evaluator
    }

    pub fn router(&self) -> &NotificationRouter {
        &self.router
    }

    /// Evaluate, render and route one event for every subscriber.
    pub async fn handle_event(&self, event: &Event) -> CycleReport {
        let mut report = CycleReport {
            events: 1,
            ..Default::default()
        };

        for n in self.evaluator.evaluate(event) {
            report.notifications += 1;

            let alert = match format_notification(&n) {
                Ok(a) => a,
                Err(e) => {
                    error!(target: "engine", subscriber = %n.subscriber.name, error = %e, "failed to format alert");
                    counter!(FORMAT_ERRORS_TOTAL).increment(1);
                    report.format_failures += 1;
                    continue;
                }
            };

            if n.subscriber.active_channels().next().is_none() {
                warn!(target: "engine", subscriber = %n.subscriber.name, "subscriber has no channels configured");
                continue;
            }

            let outcomes = self.router.dispatch(n.subscriber, &alert).await;
            report.deliveries += outcomes.len();
            report.delivery_failures += outcomes.iter().filter(|o| !o.is_success()).count();
        }

        report
    }

    /// One poll → evaluate → route pass.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let events = self.aggregator.poll_cycle().await;
        let mut report = CycleReport::default();
        for ev in &events {
            report.absorb(self.handle_event(ev).await);
        }
        report
    }

    /// Poll forever. Ticks missed while a long cycle is still running are
    /// skipped, so cycles never overlap.
    pub async fn run(mut self) {
        let interval = self.aggregator.interval().max(Duration::from_millis(1));
        info!(
            target: "engine",
            feeds = self.aggregator.len(),
            subscribers = self.evaluator.subscribers().len(),
            channels = ?self.router.registry().configured_kinds(),
            test_mode = self.evaluator.test_mode(),
            ?interval,
            "alert engine started"
        );

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let report = self.run_cycle().await;
            if report.events > 0 {
                info!(
                    target: "engine",
                    events = report.events,
                    notifications = report.notifications,
                    deliveries = report.deliveries,
                    delivery_failures = report.delivery_failures,
                    "cycle finished"
                );
            }
        }
    }
}

/// Build the enabled upstream feeds in a fixed registration order.
pub fn providers_from_config(cfg: &AppConfig, client: &Client) -> Vec<Arc<dyn SourceProvider>> {
    let mut out: Vec<Arc<dyn SourceProvider>> = Vec::new();
    if cfg.sources.cenc {
        out.push(Arc::new(CencProvider::from_url(CENC_URL, client.clone())));
    }
    if cfg.sources.sichuan {
        out.push(Arc::new(ProvincialEewProvider::sichuan(client.clone())));
    }
    if cfg.sources.fujian {
        out.push(Arc::new(ProvincialEewProvider::fujian(client.clone())));
    }
    if cfg.sources.chinaeew {
        out.push(Arc::new(ChinaEewProvider::new(client.clone())));
    }
    out
}
