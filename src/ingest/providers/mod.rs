// src/ingest/providers/mod.rs
//! Concrete upstream feeds. Each provider maps its source's field names and
//! units into the canonical [`Event`](crate::ingest::types::Event).

pub mod cenc;
pub mod chinaeew;
pub mod eew;

use std::time::Instant;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use metrics::histogram;
use reqwest::Client;
use serde::{Deserialize, Deserializer};

use crate::error::FetchError;
use crate::ingest::types::Depth;
use crate::metrics::FEED_FETCH_MS;

/// Wall-clock format used by the upstream feeds.
pub const FEED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const CST_OFFSET_SECS: i32 = 8 * 3600;

/// Upstream wall-clock times are China Standard Time (UTC+08:00).
pub fn china_standard_time() -> FixedOffset {
    FixedOffset::east_opt(CST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub(crate) fn parse_feed_time(s: &str) -> Result<DateTime<FixedOffset>, FetchError> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), FEED_TIME_FORMAT)
        .map_err(|e| FetchError::Parse(format!("time `{s}`: {e}")))?;
    naive
        .and_local_timezone(china_standard_time())
        .single()
        .ok_or_else(|| FetchError::Parse(format!("ambiguous time `{s}`")))
}

pub(crate) fn epoch_millis_to_cst(ms: i64) -> Result<DateTime<FixedOffset>, FetchError> {
    china_standard_time()
        .timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| FetchError::Parse(format!("timestamp out of range: {ms}")))
}

/// Where a provider gets its body from.
pub(crate) enum Mode {
    // Owned copy so tests don't need 'static fixtures.
    Fixture(String),
    Http { url: String, client: Client },
}

impl Mode {
    pub(crate) async fn body(&self, query: &[(&str, String)]) -> Result<String, FetchError> {
        match self {
            Mode::Fixture(s) => Ok(s.clone()),
            Mode::Http { url, client } => {
                let t0 = Instant::now();
                let resp = client.get(url.as_str()).query(query).send().await?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(FetchError::Status(status.as_u16()));
                }
                let body = resp.text().await?;
                histogram!(FEED_FETCH_MS).record(t0.elapsed().as_secs_f64() * 1_000.0);
                Ok(body)
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrString {
    Num(f64),
    Str(String),
}

/// Accept `3.4` as well as `"3.4"`.
pub(crate) fn lenient_f64<'de, D>(d: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumOrString::deserialize(d)? {
        NumOrString::Num(v) => Ok(v),
        NumOrString::Str(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| serde::de::Error::custom(format!("expected number, got `{s}`: {e}"))),
    }
}

/// Missing, null, or non-numeric (e.g. "unknown") depth → [`Depth::Unknown`].
pub(crate) fn lenient_depth<'de, D>(d: D) -> Result<Depth, D::Error>
where
    D: Deserializer<'de>,
{
    let depth = match Option::<NumOrString>::deserialize(d)? {
        Some(NumOrString::Num(v)) if v.is_finite() => Depth::Km(v),
        Some(NumOrString::Str(s)) => match s.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Depth::Km(v),
            _ => Depth::Unknown,
        },
        _ => Depth::Unknown,
    };
    Ok(depth)
}

/// Event ids come as strings from some feeds and integers from others.
pub(crate) fn lenient_id<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Int(i64),
        Str(String),
    }
    Ok(match Id::deserialize(d)? {
        Id::Int(v) => v.to_string(),
        Id::Str(s) => s,
    })
}

/// Two-decimal rounding used for the early-warning network's raw floats.
pub(crate) fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn feed_time_is_china_standard_time() {
        let t = parse_feed_time("2024-05-01 12:30:00").unwrap();
        assert_eq!(t.offset().local_minus_utc(), 8 * 3600);
        assert_eq!(t.hour(), 12);
        assert_eq!(t.with_timezone(&Utc).hour(), 4);
    }

    #[test]
    fn bad_time_is_parse_error() {
        assert!(matches!(
            parse_feed_time("yesterday"),
            Err(FetchError::Parse(_))
        ));
    }

    #[test]
    fn lenient_depth_handles_sentinels() {
        #[derive(Deserialize)]
        struct D {
            #[serde(default, deserialize_with = "lenient_depth")]
            depth: Depth,
        }
        let parse = |s: &str| serde_json::from_str::<D>(s).unwrap().depth;
        assert_eq!(parse(r#"{"depth": 10}"#), Depth::Km(10.0));
        assert_eq!(parse(r#"{"depth": "12.5"}"#), Depth::Km(12.5));
        assert_eq!(parse(r#"{"depth": "unknown"}"#), Depth::Unknown);
        assert_eq!(parse(r#"{"depth": null}"#), Depth::Unknown);
        assert_eq!(parse(r#"{}"#), Depth::Unknown);
    }
}
