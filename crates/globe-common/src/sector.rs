//! Geographic sector types and operations.

use serde::{Deserialize, Serialize};

/// A geographic rectangle in degrees: latitude in [-90, 90], longitude in
/// [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Sector {
    /// Create a new sector from corner coordinates.
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    /// The sector spanning the full globe.
    pub fn full_sphere() -> Self {
        Self {
            min_lat: -90.0,
            max_lat: 90.0,
            min_lon: -180.0,
            max_lon: 180.0,
        }
    }

    /// Latitudinal span in degrees.
    pub fn delta_lat(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Longitudinal span in degrees.
    pub fn delta_lon(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    /// A sector with no area cannot contain or intersect anything.
    pub fn is_empty(&self) -> bool {
        self.delta_lat() <= 0.0 || self.delta_lon() <= 0.0
    }

    /// Check if this sector intersects another.
    pub fn intersects(&self, other: &Sector) -> bool {
        self.min_lat < other.max_lat
            && self.max_lat > other.min_lat
            && self.min_lon < other.max_lon
            && self.max_lon > other.min_lon
    }

    /// Compute the intersection of two sectors.
    pub fn intersection(&self, other: &Sector) -> Option<Sector> {
        if !self.intersects(other) {
            return None;
        }

        Some(Sector {
            min_lat: self.min_lat.max(other.min_lat),
            max_lat: self.max_lat.min(other.max_lat),
            min_lon: self.min_lon.max(other.min_lon),
            max_lon: self.max_lon.min(other.max_lon),
        })
    }

    /// The smallest sector covering both inputs.
    pub fn union(&self, other: &Sector) -> Sector {
        Sector {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }

    /// Check if a point is contained within this sector.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}
