//! # Geo Estimator
//! Pure functions that turn an epicenter + a subscriber's home into an
//! [`ImpactEstimate`]: great-circle distance, S-wave arrival time and the
//! expected local shaking intensity. No I/O, no state.

use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;
/// Simplified S-wave propagation speed.
pub const S_WAVE_SPEED_KM_S: f64 = 4.0;
/// Distances below this are clamped before taking `log10`.
pub const MIN_INTENSITY_DISTANCE_KM: f64 = 0.1;
/// Upper bound of the intensity scale.
pub const MAX_INTENSITY: f64 = 12.0;

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Finite and inside [-90, 90] x [-180, 180].
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Distance, arrival and intensity for one event x subscriber pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactEstimate {
    pub distance_km: f64,
    pub estimated_arrival: DateTime<FixedOffset>,
    pub local_intensity: f64,
}

/// Haversine great-circle distance in kilometers.
///
/// Symmetric in its arguments and exactly zero for identical points.
pub fn distance_km(a: Location, b: Location) -> f64 {
    if a == b {
        return 0.0;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    // abs() keeps the result bit-identical when a and b are swapped
    let d_lat = (b.latitude - a.latitude).abs().to_radians();
    let d_lon = (b.longitude - a.longitude).abs().to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// `origin + distance_km / 4 km/s`, at millisecond resolution.
pub fn arrival_time<Tz: TimeZone>(distance_km: f64, origin: DateTime<Tz>) -> DateTime<Tz> {
    let secs = (distance_km / S_WAVE_SPEED_KM_S).max(0.0);
    let millis = (secs * 1_000.0).round() as i64;
    origin + Duration::milliseconds(millis)
}

/// Expected local intensity:
/// `0.92 + 1.63*M - 3.49*log10(max(d, 0.1))`, then
/// `<= 0` → 0.0, `>= 12` → 12.0, otherwise truncated to one decimal.
pub fn local_intensity(distance_km: f64, magnitude: f64) -> f64 {
    let d = distance_km.max(MIN_INTENSITY_DISTANCE_KM);
    let raw = 0.92 + 1.63 * magnitude - 3.49 * d.log10();

    if raw.is_nan() || raw <= 0.0 {
        0.0
    } else if raw < MAX_INTENSITY {
        (raw * 10.0).trunc() / 10.0
    } else {
        MAX_INTENSITY
    }
}

/// Compose distance, arrival and intensity for one subscriber.
pub fn estimate(
    epicenter: Location,
    home: Location,
    magnitude: f64,
    origin: DateTime<FixedOffset>,
) -> ImpactEstimate {
    let distance = distance_km(home, epicenter);
    ImpactEstimate {
        distance_km: distance,
        estimated_arrival: arrival_time(distance, origin),
        local_intensity: local_intensity(distance, magnitude),
    }
}
