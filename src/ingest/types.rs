// src/ingest/types.rs
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::geo::Location;

/// Upstream feed a report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// National seismic network catalogue (CENC).
    Cenc,
    /// Sichuan provincial early-warning feed.
    SichuanEew,
    /// Fujian provincial early-warning feed.
    FujianEew,
    /// National early-warning network.
    ChinaEew,
}

impl SourceId {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::Cenc => "cenc",
            SourceId::SichuanEew => "sichuan_eew",
            SourceId::FujianEew => "fujian_eew",
            SourceId::ChinaEew => "china_eew",
        }
    }

    /// Human attribution used in alert bodies.
    pub fn label(&self) -> &'static str {
        match self {
            SourceId::Cenc => "China Earthquake Networks Center",
            SourceId::SichuanEew => "Sichuan Earthquake Administration",
            SourceId::FujianEew => "Fujian Earthquake Administration",
            SourceId::ChinaEew => "China Earthquake Early Warning Network",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Reviewed,
    Automatic,
    EarlyWarning,
}

impl ReportKind {
    pub fn label(&self) -> &'static str {
        match self {
            ReportKind::Reviewed => "reviewed",
            ReportKind::Automatic => "automatic",
            ReportKind::EarlyWarning => "early warning",
        }
    }
}

/// Hypocenter depth; several feeds omit it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Depth {
    Km(f64),
    #[default]
    Unknown,
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Depth::Km(km) => write!(f, "{km} km"),
            Depth::Unknown => f.write_str("unknown"),
        }
    }
}

/// Canonical earthquake report. Immutable once a provider has built it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub source_id: SourceId,
    /// Opaque per-source revision id (checksum or event id), used for dedup.
    pub fingerprint: String,
    pub occurred_at: DateTime<FixedOffset>,
    pub epicenter: Location,
    pub magnitude: f64,
    pub depth: Depth,
    pub location_name: String,
    pub report_kind: ReportKind,
    pub source_label: String,
}

/// Upstream collaborator for one feed.
///
/// `Ok(None)` means the feed answered but currently has nothing to report.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Option<Event>, FetchError>;
    fn source_id(&self) -> SourceId;

    fn name(&self) -> &'static str {
        self.source_id().as_str()
    }
}
