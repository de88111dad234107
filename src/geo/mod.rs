//! Geographic primitives -- coordinates, timestamped samples, distances.

pub mod zone;

pub use self::zone::SafeZone;

use serde::{Deserialize, Serialize};

/// Mean Earth radius in metres used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A position fix reported by the sender.
///
/// History slices are ordered oldest first; that order defines the timeline
/// and is trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Unix epoch milliseconds.
    pub timestamp_millis: i64,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, timestamp_millis: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_millis,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Great-circle distance to another sample, in metres.
    pub fn distance_to(&self, other: &LocationSample) -> f64 {
        haversine_distance(self.coordinate(), other.coordinate())
    }
}

/// Great-circle distance between two points in metres (haversine formula).
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Human-readable position, e.g. `41.0082 N, 28.9784 E`.
///
/// The hemisphere letters are fixed; negative values keep their sign.
pub fn display_location(c: Coordinate) -> String {
    format!("{:.4} N, {:.4} E", c.latitude, c.longitude)
}
