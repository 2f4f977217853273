//! Plain-text rendering of an alert. Pure; no I/O.

use crate::error::FormatError;
use crate::evaluate::{Notification, Subscriber};
use crate::geo::ImpactEstimate;
use crate::ingest::providers::FEED_TIME_FORMAT;
use crate::ingest::types::Event;
use crate::notify::FormattedAlert;

/// `30.5°N` / `12.25°S`; zero counts as north/east.
fn hemisphere(value: f64, positive: char, negative: char) -> String {
    let h = if value >= 0.0 { positive } else { negative };
    format!("{}°{}", value.abs(), h)
}

/// Up to two decimals, never fewer than one: `4.6`, `5.15`, `3.0`.
fn magnitude(m: f64) -> String {
    let s = format!("{m:.2}");
    match s.strip_suffix('0') {
        Some(t) => t.to_string(),
        None => s,
    }
}

fn check_finite(field: &'static str, v: f64) -> Result<(), FormatError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(FormatError::InvalidField {
            field,
            value: v.to_string(),
        })
    }
}

pub fn format_alert(
    event: &Event,
    subscriber: &Subscriber,
    impact: &ImpactEstimate,
) -> Result<FormattedAlert, FormatError> {
    let location = event.location_name.trim();
    if location.is_empty() {
        return Err(FormatError::MissingField("location_name"));
    }
    check_finite("magnitude", event.magnitude)?;
    check_finite("latitude", event.epicenter.latitude)?;
    check_finite("longitude", event.epicenter.longitude)?;
    check_finite("distance_km", impact.distance_km)?;

    let kind = event.report_kind.label();
    let mag = magnitude(event.magnitude);
    let subject = format!("Earthquake alert - {kind}: {location} M{mag}");

    let body = format!(
        "Earthquake alert - {kind}: a magnitude {mag} earthquake occurred at {time} in {location} ({lat}, {lon}), depth {depth}. \
         For {name}: the epicenter is {dist:.1} km away, shaking is expected to arrive at {arrival}, \
         estimated local intensity {intensity:.1}. Source: {source}.",
        time = event.occurred_at.format(FEED_TIME_FORMAT),
        lat = hemisphere(event.epicenter.latitude, 'N', 'S'),
        lon = hemisphere(event.epicenter.longitude, 'E', 'W'),
        depth = event.depth,
        name = subscriber.name,
        dist = impact.distance_km,
        arrival = impact.estimated_arrival.format(FEED_TIME_FORMAT),
        intensity = impact.local_intensity,
        source = event.source_label,
    );

    Ok(FormattedAlert { subject, body })
}

/// Convenience for the engine: render straight from an evaluator result.
pub fn format_notification(n: &Notification<'_>) -> Result<FormattedAlert, FormatError> {
    format_alert(n.event, n.subscriber, &n.impact)
}
