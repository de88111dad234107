//! Polygonal safe zones.
//!
//! Containment treats (longitude, latitude) as planar (x, y). That is only
//! accurate for small regions away from the poles and the antimeridian;
//! self-intersecting polygons give unspecified results.

use super::Coordinate;
use serde::{Deserialize, Serialize};

/// Minimum number of vertices for a usable polygon.
pub const MIN_VERTICES: usize = 3;

/// A closed polygon the tracked person is expected to stay within.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SafeZone {
    vertices: Vec<Coordinate>,
}

impl SafeZone {
    /// Build a zone, or `None` when there are too few vertices to enclose
    /// anything. Callers treat `None` exactly like "no zone configured".
    pub fn new(vertices: Vec<Coordinate>) -> Option<Self> {
        if vertices.len() < MIN_VERTICES {
            return None;
        }
        Some(Self { vertices })
    }

    /// Ray-casting point-in-polygon test.
    pub fn contains(&self, point: Coordinate) -> bool {
        let (px, py) = (point.longitude, point.latitude);
        let mut inside = false;

        let mut j = self.vertices.len() - 1;
        for i in 0..self.vertices.len() {
            let (xi, yi) = (self.vertices[i].longitude, self.vertices[i].latitude);
            let (xj, yj) = (self.vertices[j].longitude, self.vertices[j].latitude);

            // (yi > py) != (yj > py) also rules out yi == yj, so no divide by zero.
            if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }

        inside
    }
}

impl<'de> Deserialize<'de> for SafeZone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let vertices = Vec::<Coordinate>::deserialize(deserializer)?;
        let len = vertices.len();
        SafeZone::new(vertices).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "safe zone needs at least {} vertices, got {}",
                MIN_VERTICES, len
            ))
        })
    }
}
