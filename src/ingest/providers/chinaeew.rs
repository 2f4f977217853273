use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{epoch_millis_to_cst, lenient_depth, lenient_id, round2, Mode};
use crate::error::FetchError;
use crate::geo::Location;
use crate::ingest::types::{Depth, Event, ReportKind, SourceId, SourceProvider};

pub const CHINA_EEW_URL: &str = "https://mobile-new.chinaeew.cn/v1/earlywarnings";
/// How far back the warnings query looks.
pub const LOOKBACK_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
struct Envelope {
    code: i64,
    #[serde(default)]
    data: Vec<Warning>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Warning {
    #[serde(deserialize_with = "lenient_id")]
    event_id: String,
    start_at: i64,
    epicenter: String,
    magnitude: f64,
    latitude: f64,
    longitude: f64,
    #[serde(default, deserialize_with = "lenient_depth")]
    depth: Depth,
    #[serde(default)]
    source_type: Option<String>,
}

/// National early-warning network. Returns a list of recent warnings, newest
/// first; an empty list is a normal quiet period, not an error.
pub struct ChinaEewProvider {
    mode: Mode,
}

impl ChinaEewProvider {
    pub fn new(client: Client) -> Self {
        Self::from_url(CHINA_EEW_URL, client)
    }

    pub fn from_url(url: impl Into<String>, client: Client) -> Self {
        Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }

    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn parse(body: &str) -> Result<Option<Event>, FetchError> {
        let env: Envelope = serde_json::from_str(body)?;
        if env.code != 0 {
            return Err(FetchError::Upstream(env.code));
        }
        let Some(w) = env.data.into_iter().next() else {
            return Ok(None);
        };

        let source_label = w
            .source_type
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| SourceId::ChinaEew.label().to_string());

        Ok(Some(Event {
            source_id: SourceId::ChinaEew,
            fingerprint: w.event_id,
            occurred_at: epoch_millis_to_cst(w.start_at)?,
            epicenter: Location::new(round2(w.latitude), round2(w.longitude)),
            magnitude: round2(w.magnitude),
            depth: w.depth,
            location_name: w.epicenter,
            report_kind: ReportKind::EarlyWarning,
            source_label,
        }))
    }

    fn query() -> Vec<(&'static str, String)> {
        let start = Utc::now() - Duration::days(LOOKBACK_DAYS);
        vec![
            ("start_at", start.timestamp_millis().to_string()),
            ("updates", String::new()),
        ]
    }
}

#[async_trait]
impl SourceProvider for ChinaEewProvider {
    async fn fetch_latest(&self) -> Result<Option<Event>, FetchError> {
        let body = self.mode.body(&Self::query()).await?;
        Self::parse(&body)
    }

    fn source_id(&self) -> SourceId {
        SourceId::ChinaEew
    }
}
