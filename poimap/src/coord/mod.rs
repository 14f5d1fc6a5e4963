//! Geographic primitives for viewport handling.
//!
//! This module provides the small amount of spherical geometry the refresh
//! engine needs: a WGS84 position type, great-circle distance, and the
//! [`Viewport`] from which the effective search radius is derived.
//!
//! # Effective Radius
//!
//! The search radius sent to the data API is never smaller than the configured
//! base radius, and grows with the visible map area:
//!
//! ```text
//! effective = max(base, ceil(distance(center, corner) × 1.1))
//! ```
//!
//! The 10% buffer keeps sub-pixel viewport jitter inside the same radius.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters (same constant common web map libraries use).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Multiplier applied to the center-to-corner distance.
pub const RADIUS_BUFFER: f64 = 1.1;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude in degrees (-90 to 90).
    pub lat: f64,
    /// Longitude in degrees (-180 to 180).
    pub lon: f64,
}

impl LatLon {
    /// Create a new position.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to another position, in meters.
    pub fn distance_to(&self, other: &LatLon) -> f64 {
        distance_m(*self, *other)
    }
}

impl std::fmt::Display for LatLon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lon)
    }
}

/// Haversine distance between two positions, in meters.
pub fn distance_m(a: LatLon, b: LatLon) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// The visible map area, reduced to what the refresh engine needs.
///
/// Only the center and the distance from the center to a corner matter: the
/// search is a circle, so the half diagonal is the smallest radius that still
/// covers the whole visible rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Map center.
    pub center: LatLon,
    /// Distance from the center to a viewport corner, in meters.
    pub half_diagonal_m: f64,
}

impl Viewport {
    /// Build a viewport from its center and any one of its corners.
    pub fn from_corner(center: LatLon, corner: LatLon) -> Self {
        Self {
            center,
            half_diagonal_m: distance_m(center, corner),
        }
    }

    /// Build a viewport from a center and a caller-supplied radius hint.
    ///
    /// Negative or non-finite hints are treated as zero, which makes the
    /// configured base radius win.
    pub fn from_radius_hint(center: LatLon, radius_hint_m: f64) -> Self {
        let half_diagonal_m = if radius_hint_m.is_finite() {
            radius_hint_m.max(0.0)
        } else {
            0.0
        };
        Self {
            center,
            half_diagonal_m,
        }
    }

    /// Same viewport size, moved to a new center.
    pub fn recentered(&self, center: LatLon) -> Self {
        Self {
            center,
            half_diagonal_m: self.half_diagonal_m,
        }
    }

    /// Search radius for this viewport given the configured base radius.
    pub fn effective_radius_m(&self, base_radius_m: f64) -> f64 {
        let covering = (self.half_diagonal_m * RADIUS_BUFFER).ceil();
        base_radius_m.max(covering)
    }
}
