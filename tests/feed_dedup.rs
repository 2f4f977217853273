// tests/feed_dedup.rs
use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeZone;
use parking_lot::Mutex;
use quake_alert::ingest::feed::SourceFeed;
use quake_alert::ingest::providers::china_standard_time;
use quake_alert::{Depth, Event, FetchError, Location, ReportKind, SourceId, SourceProvider};

/// Replays a fixed script of fetch results, one per poll.
struct Scripted {
    script: Mutex<VecDeque<Result<Option<Event>, FetchError>>>,
}

impl Scripted {
    fn new(steps: Vec<Result<Option<Event>, FetchError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
        })
    }
}

#[async_trait]
impl SourceProvider for Scripted {
    async fn fetch_latest(&self) -> Result<Option<Event>, FetchError> {
        self.script.lock().pop_front().unwrap_or(Ok(None))
    }

    fn source_id(&self) -> SourceId {
        SourceId::SichuanEew
    }
}

fn ev(fp: &str) -> Option<Event> {
    Some(Event {
        source_id: SourceId::SichuanEew,
        fingerprint: fp.into(),
        occurred_at: china_standard_time()
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .unwrap(),
        epicenter: Location::new(30.3, 102.9),
        magnitude: 4.0,
        depth: Depth::Km(10.0),
        location_name: "Lushan".into(),
        report_kind: ReportKind::EarlyWarning,
        source_label: "test".into(),
    })
}

#[tokio::test]
async fn startup_report_is_not_replayed() {
    let p = Scripted::new(vec![Ok(ev("A")), Ok(ev("A")), Ok(ev("B")), Ok(ev("B"))]);
    let mut feed = SourceFeed::new(p, false);

    assert!(feed.poll().await.unwrap().is_none(), "first poll only seeds");
    assert_eq!(feed.state().last_fingerprint(), Some("A"));
    assert!(feed.poll().await.unwrap().is_none());

    let got = feed.poll().await.unwrap().expect("B is new");
    assert_eq!(got.fingerprint, "B");
    assert!(feed.poll().await.unwrap().is_none());
}

#[tokio::test]
async fn test_mode_surfaces_first_report() {
    let p = Scripted::new(vec![Ok(ev("A")), Ok(ev("A"))]);
    let mut feed = SourceFeed::new(p, true);

    assert_eq!(feed.poll().await.unwrap().unwrap().fingerprint, "A");
    assert!(feed.poll().await.unwrap().is_none());
}

#[tokio::test]
async fn failed_poll_leaves_state_untouched() {
    let p = Scripted::new(vec![
        Ok(ev("A")),
        Err(FetchError::Status(503)),
        Ok(ev("A")),
        Err(FetchError::Parse("bad".into())),
        Ok(ev("C")),
    ]);
    let mut feed = SourceFeed::new(p, false);

    assert!(feed.poll().await.unwrap().is_none());
    assert!(matches!(feed.poll().await, Err(FetchError::Status(503))));
    assert_eq!(feed.state().last_fingerprint(), Some("A"));
    // The recovery poll returns the same report; still not new.
    assert!(feed.poll().await.unwrap().is_none());
    assert!(feed.poll().await.is_err());
    assert_eq!(feed.poll().await.unwrap().unwrap().fingerprint, "C");
}

#[tokio::test]
async fn errors_before_seeding_do_not_seed() {
    let p = Scripted::new(vec![Err(FetchError::Status(500)), Ok(None), Ok(ev("A"))]);
    let mut feed = SourceFeed::new(p, false);

    assert!(feed.poll().await.is_err());
    assert!(!feed.state().is_seeded());
    assert!(feed.poll().await.unwrap().is_none());
    assert!(!feed.state().is_seeded(), "an empty answer does not seed");
    assert!(feed.poll().await.unwrap().is_none());
    assert!(feed.state().is_seeded());
}

#[tokio::test]
async fn republished_older_report_counts_as_new() {
    let p = Scripted::new(vec![Ok(ev("A")), Ok(ev("B")), Ok(ev("A"))]);
    let mut feed = SourceFeed::new(p, false);

    feed.poll().await.unwrap();
    assert_eq!(feed.poll().await.unwrap().unwrap().fingerprint, "B");
    assert_eq!(feed.poll().await.unwrap().unwrap().fingerprint, "A");
}
