//! Sends one synthetic alert to every configured subscriber through the real
//! channel adapters. Useful to verify credentials before going live.
//!
//! Usage: `notify_demo [path/to/quake.toml]`

use std::path::PathBuf;

use chrono::Utc;
use quake_alert::config::AppConfig;
use quake_alert::format::format_alert;
use quake_alert::ingest::providers::china_standard_time;
use quake_alert::{
    geo, ChannelRegistry, Depth, Event, Location, NotificationRouter, ReportKind, SourceId,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let _ = dotenvy::dotenv();

    let explicit = std::env::args().nth(1).map(PathBuf::from);
    let cfg = AppConfig::load_default(explicit)?;
    let client = quake_alert::http_client(cfg.request_timeout())?;
    let registry = ChannelRegistry::from_config(&cfg.notify, client, cfg.request_timeout());
    let router = NotificationRouter::new(registry).with_timeout(cfg.request_timeout());

    for sub in cfg.subscribers() {
        let event = Event {
            source_id: SourceId::Cenc,
            fingerprint: "demo".into(),
            occurred_at: Utc::now().with_timezone(&china_standard_time()),
            // Same spot as the subscriber: worst case for the intensity estimate.
            epicenter: Location::new(sub.home.latitude, sub.home.longitude),
            magnitude: 3.0,
            depth: Depth::Km(10.0),
            location_name: "notify demo (not a real event)".into(),
            report_kind: ReportKind::Automatic,
            source_label: "quake-alert demo".into(),
        };
        let impact = geo::estimate(event.epicenter, sub.home, event.magnitude, event.occurred_at);
        let alert = format_alert(&event, &sub, &impact)?;

        let outcomes = router.dispatch(&sub, &alert).await;
        for o in outcomes {
            println!("{} {:?}: {:?}", sub.name, o.channel, o.result);
        }
    }

    println!("notify-demo done");
    Ok(())
}
