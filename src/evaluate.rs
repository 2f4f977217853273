//! # Subscriber Evaluator
//! Decides, per event and subscriber, whether an alert is warranted.
//!
//! Policy (OR'd): epicenter closer than 200 km; or within 1000 km and the
//! magnitude exceeds 2; or the process runs in test mode.

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::EvaluateError;
use crate::geo::{self, ImpactEstimate, Location};
use crate::ingest::types::Event;
use crate::metrics::NOTIFICATIONS_TOTAL;
use crate::notify::{ChannelKind, ChannelMap};

pub const NEAR_FIELD_KM: f64 = 200.0;
pub const REGIONAL_KM: f64 = 1000.0;
pub const REGIONAL_MIN_MAGNITUDE: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub name: String,
    pub home: Location,
    #[serde(default)]
    pub channels: ChannelMap,
}

impl Subscriber {
    pub fn new(name: impl Into<String>, home: Location) -> Self {
        Self {
            name: name.into(),
            home,
            channels: ChannelMap::new(),
        }
    }

    pub fn with_channel<I, S>(mut self, kind: ChannelKind, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels
            .entry(kind)
            .or_default()
            .extend(addresses.into_iter().map(Into::into));
        self
    }

    pub fn addresses(&self, kind: ChannelKind) -> &[String] {
        self.channels.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Channels with at least one address, in [`ChannelKind`] order.
    pub fn active_channels(&self) -> impl Iterator<Item = (ChannelKind, &[String])> + '_ {
        self.channels
            .iter()
            .filter(|(_, addrs)| !addrs.is_empty())
            .map(|(k, addrs)| (*k, addrs.as_slice()))
    }
}

pub fn is_notification_worthy(distance_km: f64, magnitude: f64, test_mode: bool) -> bool {
    distance_km < NEAR_FIELD_KM
        || (distance_km <= REGIONAL_KM && magnitude > REGIONAL_MIN_MAGNITUDE)
        || test_mode
}

/// Combined payload handed to the formatter and router.
#[derive(Debug, Clone)]
pub struct Notification<'a> {
    pub event: &'a Event,
    pub subscriber: &'a Subscriber,
    pub impact: ImpactEstimate,
}

pub struct SubscriberEvaluator {
    subscribers: Vec<Subscriber>,
    test_mode: bool,
}

impl SubscriberEvaluator {
    pub fn new(subscribers: Vec<Subscriber>, test_mode: bool) -> Self {
        Self {
            subscribers,
            test_mode,
        }
    }

    pub fn subscribers(&self) -> &[Subscriber] {
        &self.subscribers
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    /// Impact of `event` on one subscriber.
    pub fn assess(&self, event: &Event, subscriber: &Subscriber) -> Result<ImpactEstimate, EvaluateError> {
        if !subscriber.home.is_valid() {
            return Err(EvaluateError::InvalidLocation {
                name: subscriber.name.clone(),
                latitude: subscriber.home.latitude,
                longitude: subscriber.home.longitude,
            });
        }

        let impact = geo::estimate(event.epicenter, subscriber.home, event.magnitude, event.occurred_at);
        if !impact.distance_km.is_finite() {
            return Err(EvaluateError::NonFinite(subscriber.name.clone()));
        }
        Ok(impact)
    }

    /// Subscribers that should be alerted for `event`, in configuration order.
    /// A subscriber that fails evaluation is logged and skipped.
    pub fn evaluate<'a>(&'a self, event: &'a Event) -> Vec<Notification<'a>> {
        let mut out = Vec::new();

        for subscriber in &self.subscribers {
            let impact = match self.assess(event, subscriber) {
                Ok(i) => i,
                Err(e) => {
                    error!(target: "evaluate", subscriber = %subscriber.name, error = %e, "skipping subscriber");
                    continue;
                }
            };

            if is_notification_worthy(impact.distance_km, event.magnitude, self.test_mode) {
                info!(
                    target: "evaluate",
                    subscriber = %subscriber.name,
                    source = event.source_id.as_str(),
                    distance_km = impact.distance_km,
                    intensity = impact.local_intensity,
                    "notify"
                );
                counter!(NOTIFICATIONS_TOTAL).increment(1);
                out.push(Notification {
                    event,
                    subscriber,
                    impact,
                });
            } else {
                debug!(
                    target: "evaluate",
                    subscriber = %subscriber.name,
                    distance_km = impact.distance_km,
                    magnitude = event.magnitude,
                    "skip notify: too far for magnitude"
                );
            }
        }

        out
    }
}
