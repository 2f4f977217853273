use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{lenient_depth, lenient_f64, parse_feed_time, Mode};
use crate::error::FetchError;
use crate::geo::Location;
use crate::ingest::types::{Depth, Event, ReportKind, SourceId, SourceProvider};

pub const CENC_URL: &str = "https://api.wolfx.jp/cenc_eqlist.json";

/// Catalogue list; only the checksum and the newest entry matter.
#[derive(Debug, Deserialize)]
struct CencList {
    md5: String,
    #[serde(rename = "No1")]
    latest: CencEntry,
}

#[derive(Debug, Deserialize)]
struct CencEntry {
    #[serde(rename = "type")]
    kind: String,
    time: String,
    location: String,
    #[serde(deserialize_with = "lenient_f64")]
    magnitude: f64,
    #[serde(default, deserialize_with = "lenient_depth")]
    depth: Depth,
    #[serde(deserialize_with = "lenient_f64")]
    latitude: f64,
    #[serde(deserialize_with = "lenient_f64")]
    longitude: f64,
}

/// National network catalogue. The list checksum changes whenever any entry
/// is added or revised, so it doubles as the fingerprint.
pub struct CencProvider {
    mode: Mode,
}

impl CencProvider {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_url(url: impl Into<String>, client: Client) -> Self {
        Self {
            mode: Mode::Http {
                url: url.into(),
                client,
            },
        }
    }

    pub fn parse(body: &str) -> Result<Event, FetchError> {
        let list: CencList = serde_json::from_str(body)?;
        let e = list.latest;
        let report_kind = if e.kind == "reviewed" {
            ReportKind::Reviewed
        } else {
            ReportKind::Automatic
        };

        Ok(Event {
            source_id: SourceId::Cenc,
            fingerprint: list.md5,
            occurred_at: parse_feed_time(&e.time)?,
            epicenter: Location::new(e.latitude, e.longitude),
            magnitude: e.magnitude,
            depth: e.depth,
            location_name: e.location,
            report_kind,
            source_label: SourceId::Cenc.label().to_string(),
        })
    }
}

#[async_trait]
impl SourceProvider for CencProvider {
    async fn fetch_latest(&self) -> Result<Option<Event>, FetchError> {
        let body = self.mode.body(&[]).await?;
        Self::parse(&body).map(Some)
    }

    fn source_id(&self) -> SourceId {
        SourceId::Cenc
    }
}
