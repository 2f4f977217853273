// tests/aggregator_isolation.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeZone;
use quake_alert::ingest::feed::SourceFeed;
use quake_alert::ingest::providers::china_standard_time;
use quake_alert::ingest::FeedAggregator;
use quake_alert::{Depth, Event, FetchError, Location, ReportKind, SourceId, SourceProvider};

fn event(source: SourceId, fp: String) -> Event {
    Event {
        source_id: source,
        fingerprint: fp,
        occurred_at: china_standard_time()
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .unwrap(),
        epicenter: Location::new(30.0, 103.0),
        magnitude: 3.0,
        depth: Depth::Unknown,
        location_name: "somewhere".into(),
        report_kind: ReportKind::EarlyWarning,
        source_label: source.label().into(),
    }
}

/// Returns a new fingerprint on every call: `{source}-{n}`.
struct Ticking {
    source: SourceId,
    calls: AtomicUsize,
}

impl Ticking {
    fn new(source: SourceId) -> Arc<Self> {
        Arc::new(Self {
            source,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SourceProvider for Ticking {
    async fn fetch_latest(&self) -> Result<Option<Event>, FetchError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(event(self.source, format!("{}-{n}", self.source))))
    }

    fn source_id(&self) -> SourceId {
        self.source
    }
}

enum Misbehaviour {
    Fail,
    Hang,
    Panic,
}

struct Broken {
    source: SourceId,
    how: Misbehaviour,
}

#[async_trait]
impl SourceProvider for Broken {
    async fn fetch_latest(&self) -> Result<Option<Event>, FetchError> {
        match self.how {
            Misbehaviour::Fail => Err(FetchError::Status(502)),
            Misbehaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(None)
            }
            Misbehaviour::Panic => panic!("provider blew up"),
        }
    }

    fn source_id(&self) -> SourceId {
        self.source
    }
}

fn broken(source: SourceId, how: Misbehaviour) -> Arc<Broken> {
    Arc::new(Broken { source, how })
}

#[tokio::test]
async fn healthy_feeds_report_in_registration_order() {
    let mut agg = FeedAggregator::new(Duration::from_secs(1))
        .with_feed(SourceFeed::new(Ticking::new(SourceId::FujianEew), true))
        .with_feed(SourceFeed::new(Ticking::new(SourceId::Cenc), true))
        .with_feed(SourceFeed::new(Ticking::new(SourceId::SichuanEew), true));

    let events = agg.poll_cycle().await;
    let order: Vec<SourceId> = events.iter().map(|e| e.source_id).collect();
    assert_eq!(order, vec![SourceId::FujianEew, SourceId::Cenc, SourceId::SichuanEew]);
}

#[tokio::test]
async fn one_bad_feed_does_not_block_the_others() {
    let timeout = Duration::from_millis(50);
    let mut agg = FeedAggregator::new(Duration::from_secs(1));
    agg.register(SourceFeed::new(Ticking::new(SourceId::Cenc), false).with_timeout(timeout));
    agg.register(
        SourceFeed::new(broken(SourceId::SichuanEew, Misbehaviour::Hang), false).with_timeout(timeout),
    );
    agg.register(
        SourceFeed::new(broken(SourceId::FujianEew, Misbehaviour::Fail), false).with_timeout(timeout),
    );
    agg.register(
        SourceFeed::new(broken(SourceId::ChinaEew, Misbehaviour::Panic), false).with_timeout(timeout),
    );

    // Cycle 1 seeds the healthy feed.
    let started = std::time::Instant::now();
    assert!(agg.poll_cycle().await.is_empty());
    assert!(started.elapsed() < Duration::from_secs(5), "hung feed must time out");

    // Cycle 2 surfaces its next report despite the three broken feeds.
    let events = agg.poll_cycle().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source_id, SourceId::Cenc);
    assert_eq!(events[0].fingerprint, "cenc-1");

    assert!(agg.feeds()[0].state().is_seeded());
    assert!(agg.feeds()[1..].iter().all(|f| !f.state().is_seeded()));
}

#[tokio::test]
async fn empty_aggregator_yields_nothing() {
    let mut agg = FeedAggregator::default();
    assert!(agg.is_empty());
    assert!(agg.poll_cycle().await.is_empty());
}
