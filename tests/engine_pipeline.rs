// tests/engine_pipeline.rs
// Feed → evaluate → format → route, with fixture feeds and recording sinks.
use std::collections::VecDeque;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use quake_alert::ingest::feed::SourceFeed;
use quake_alert::ingest::providers::cenc::CencProvider;
use quake_alert::ingest::FeedAggregator;
use quake_alert::notify::{ChannelKind, ChannelRegistry, FormattedAlert, NotificationRouter, Notifier};
use quake_alert::{
    AlertEngine, DeliveryError, Event, FetchError, Location, SourceId, SourceProvider, Subscriber,
    SubscriberEvaluator,
};

struct RecordingSink {
    kind: ChannelKind,
    sent: Mutex<Vec<(Vec<String>, FormattedAlert)>>,
}

impl RecordingSink {
    fn new(kind: ChannelKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent(&self) -> Vec<(Vec<String>, FormattedAlert)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingSink {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, recipients: &[String], alert: &FormattedAlert) -> Result<(), DeliveryError> {
        self.sent.lock().push((recipients.to_vec(), alert.clone()));
        Ok(())
    }
}

/// Serves a queue of CENC bodies, one per poll; repeats the last one.
struct CencScript {
    bodies: Mutex<VecDeque<String>>,
}

#[async_trait]
impl SourceProvider for CencScript {
    async fn fetch_latest(&self) -> Result<Option<Event>, FetchError> {
        let mut q = self.bodies.lock();
        let body = if q.len() > 1 { q.pop_front() } else { q.front().cloned() };
        match body {
            Some(b) => CencProvider::parse(&b).map(Some),
            None => Ok(None),
        }
    }

    fn source_id(&self) -> SourceId {
        SourceId::Cenc
    }
}

fn cenc_body() -> String {
    fs::read_to_string("tests/fixtures/cenc.json").expect("missing tests/fixtures/cenc.json")
}

fn subscribers() -> Vec<Subscriber> {
    vec![
        // ~225 km from the fixture epicenter
        Subscriber::new("chengdu", Location::new(30.66, 104.06))
            .with_channel(ChannelKind::Mail, ["chengdu@example.com"]),
        // ~1680 km away
        Subscriber::new("xiamen", Location::new(24.48, 118.09)).with_channel(ChannelKind::Push, ["PDU-XM"]),
    ]
}

struct Harness {
    engine: AlertEngine,
    mail: Arc<RecordingSink>,
    push: Arc<RecordingSink>,
}

fn harness(provider: Arc<dyn SourceProvider>, test_mode: bool) -> Harness {
    let mail = RecordingSink::new(ChannelKind::Mail);
    let push = RecordingSink::new(ChannelKind::Push);
    let aggregator =
        FeedAggregator::new(Duration::from_secs(1)).with_feed(SourceFeed::new(provider, test_mode));
    let evaluator = SubscriberEvaluator::new(subscribers(), test_mode);
    let router = NotificationRouter::new(ChannelRegistry::new().with(mail.clone()).with(push.clone()));

    Harness {
        engine: AlertEngine::new(aggregator, evaluator, router),
        mail,
        push,
    }
}

#[tokio::test]
async fn test_mode_alerts_everyone_on_first_cycle() {
    let mut h = harness(Arc::new(CencProvider::from_fixture_str(&cenc_body())), true);

    let report = h.engine.run_cycle().await;
    assert_eq!(report.events, 1);
    assert_eq!(report.notifications, 2);
    assert_eq!(report.deliveries, 2);
    assert_eq!(report.delivery_failures, 0);

    let mail = h.mail.sent();
    assert_eq!(mail.len(), 1);
    assert_eq!(mail[0].0, vec!["chengdu@example.com".to_string()]);
    assert_eq!(mail[0].1.subject, "Earthquake alert - reviewed: Sichuan Ganzi Luding M4.6");
    assert!(mail[0].1.body.contains("For chengdu"));
    assert_eq!(h.push.sent().len(), 1);

    // Same checksum next cycle: nothing new.
    let again = h.engine.run_cycle().await;
    assert_eq!(again.events, 0);
    assert_eq!(h.mail.sent().len(), 1);
}

#[tokio::test]
async fn normal_mode_seeds_silently_then_alerts_only_nearby() {
    let first = cenc_body();
    let second = first.replace("4f2a9c1e7b3d5a60c8e1f9b2d7a4c3e1", "0d9b8a7c6e5f4a3b2c1d0e9f8a7b6c5d");
    let provider = Arc::new(CencScript {
        bodies: Mutex::new(VecDeque::from([first, second])),
    });
    let mut h = harness(provider, false);

    let seeded = h.engine.run_cycle().await;
    assert_eq!(seeded.events, 0, "startup report is not replayed");
    assert!(h.mail.sent().is_empty());

    let report = h.engine.run_cycle().await;
    assert_eq!(report.events, 1);
    assert_eq!(report.notifications, 1, "xiamen is too far for M4.6");
    assert_eq!(h.mail.sent().len(), 1);
    assert!(h.push.sent().is_empty());

    assert_eq!(h.engine.run_cycle().await.events, 0);
}

#[tokio::test]
async fn unrenderable_event_is_counted_and_not_sent() {
    let h = harness(Arc::new(CencProvider::from_fixture_str(&cenc_body())), true);
    let mut event = CencProvider::parse(&cenc_body()).unwrap();
    event.location_name = String::new();

    let report = h.engine.handle_event(&event).await;
    assert_eq!(report.notifications, 2);
    assert_eq!(report.format_failures, 2);
    assert_eq!(report.deliveries, 0);
    assert!(h.mail.sent().is_empty());
}

#[tokio::test]
async fn subscriber_with_bad_home_is_skipped() {
    let mail = RecordingSink::new(ChannelKind::Mail);
    let subs = vec![
        Subscriber::new("nowhere", Location::new(123.0, 0.0)).with_channel(ChannelKind::Mail, ["x@example.com"]),
        Subscriber::new("chengdu", Location::new(30.66, 104.06)).with_channel(ChannelKind::Mail, ["c@example.com"]),
    ];
    let engine = AlertEngine::new(
        FeedAggregator::default(),
        SubscriberEvaluator::new(subs, true),
        NotificationRouter::new(ChannelRegistry::new().with(mail.clone())),
    );

    let event = CencProvider::parse(&cenc_body()).unwrap();
    let report = engine.handle_event(&event).await;
    assert_eq!(report.notifications, 1);
    assert_eq!(mail.sent()[0].0, vec!["c@example.com".to_string()]);
}
