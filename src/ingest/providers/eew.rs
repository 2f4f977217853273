use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{lenient_depth, lenient_f64, lenient_id, parse_feed_time, Mode};
use crate::error::FetchError;
use crate::geo::Location;
use crate::ingest::types::{Depth, Event, ReportKind, SourceId, SourceProvider};

pub const SICHUAN_EEW_URL: &str = "https://api.wolfx.jp/sc_eew.json";
pub const FUJIAN_EEW_URL: &str = "https://api.wolfx.jp/fj_eew.json";

// Field names (including the misspelled magnitude) are the provider's.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EewReport {
    #[serde(rename = "EventID", deserialize_with = "lenient_id")]
    event_id: String,
    origin_time: String,
    hypo_center: String,
    #[serde(deserialize_with = "lenient_f64")]
    magunitude: f64,
    #[serde(deserialize_with = "lenient_f64")]
    latitude: f64,
    #[serde(deserialize_with = "lenient_f64")]
    longitude: f64,
    #[serde(default, deserialize_with = "lenient_depth")]
    depth: Depth,
}

/// Provincial early-warning feed (Sichuan or Fujian). Both publish the same
/// shape; Fujian never reports a depth.
pub struct ProvincialEewProvider {
    source: SourceId,
    mode: Mode,
}

impl ProvincialEewProvider {
    pub fn sichuan(client: Client) -> Self {
        Self::from_url(SourceId::SichuanEew, SICHUAN_EEW_URL, client)
    }

    pub fn fujian(client: Client) -> Self {
        Self::from_url(SourceId::FujianEew, FUJIAN_EEW_URL, client)
    }

    pub fn from_url(source: SourceId, url: impl Into<String>, client: Client) -> Self {
        Self {
            source,
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }

    pub fn from_fixture_str(source: SourceId, s: &str) -> Self {
        Self {
            source,
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn parse(source: SourceId, body: &str) -> Result<Event, FetchError> {
        let r: EewReport = serde_json::from_str(body)?;
        let depth = match source {
            SourceId::FujianEew => Depth::Unknown,
            _ => r.depth,
        };

        Ok(Event {
            source_id: source,
            fingerprint: r.event_id,
            occurred_at: parse_feed_time(&r.origin_time)?,
            epicenter: Location::new(r.latitude, r.longitude),
            magnitude: r.magunitude,
            depth,
            location_name: r.hypo_center,
            report_kind: ReportKind::EarlyWarning,
            source_label: source.label().to_string(),
        })
    }
}

#[async_trait]
impl SourceProvider for ProvincialEewProvider {
    async fn fetch_latest(&self) -> Result<Option<Event>, FetchError> {
        let body = self.mode.body(&[]).await?;
        Self::parse(self.source, &body).map(Some)
    }

    fn source_id(&self) -> SourceId {
        self.source
    }
}
