//! Cache key derivation.
//!
//! Keys have the form `"<lat>,<lon>|<radius>|t<0|1>f<0|1>g<0|1>"` where
//! coordinates are rounded to 4 decimal places (about 11 m of latitude) and
//! the radius is bucketed to 100 m.

use std::fmt;

use crate::coord::LatLon;
use crate::model::FilterSet;

/// Radius bucket size in meters.
pub const RADIUS_BUCKET_M: f64 = 100.0;

const COORD_SCALE: f64 = 10_000.0;

/// Round a coordinate to 4 decimal places.
///
/// Never returns `-0.0`, which would format as `"-0.0000"` and split keys
/// on either side of the equator or the prime meridian.
pub fn round_coord(x: f64) -> f64 {
    let rounded = (x * COORD_SCALE).round() / COORD_SCALE;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Round a radius half-up to the nearest 100 m.
pub fn round_radius(radius_m: f64) -> u32 {
    let buckets = (radius_m / RADIUS_BUCKET_M + 0.5).floor();
    (buckets * RADIUS_BUCKET_M).max(0.0) as u32
}

/// Canonical key for a search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a search; a pure function of the rounded inputs.
    pub fn new(center: LatLon, radius_m: f64, filters: FilterSet) -> Self {
        Self(format!(
            "{:.4},{:.4}|{}|{}",
            round_coord(center.lat),
            round_coord(center.lon),
            round_radius(radius_m),
            filters
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_coord_four_places() {
        assert_eq!(round_coord(52.520008), 52.52);
        assert_eq!(format!("{:.4}", round_coord(52.520008)), "52.5200");
        assert_eq!(round_coord(-13.40456), -13.4046);
    }

    #[test]
    fn test_round_radius_half_up() {
        assert_eq!(round_radius(149.0), 100);
        assert_eq!(round_radius(150.0), 200);
        assert_eq!(round_radius(1200.0), 1200);
        assert_eq!(round_radius(1249.9), 1200);
        assert_eq!(round_radius(0.0), 0);
    }

    #[test]
    fn test_key_format() {
        let key = CacheKey::new(
            LatLon::new(52.520008, 13.404954),
            812.0,
            FilterSet::new(true, false, true),
        );
        assert_eq!(key.as_str(), "52.5200,13.4050|800|t1f0g1");
    }

    #[test]
    fn test_key_coalesces_float_jitter() {
        let filters = FilterSet::new(false, true, false);
        let a = CacheKey::new(LatLon::new(52.52001, 13.40501), 790.0, filters);
        let b = CacheKey::new(LatLon::new(52.520049, 13.405049), 830.0, filters);
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_ignores_sign_of_zero() {
        let filters = FilterSet::new(true, false, false);
        assert_eq!(round_coord(-0.00004).to_bits(), 0.0f64.to_bits());

        let north = CacheKey::new(LatLon::new(0.00004, 10.0), 1000.0, filters);
        let south = CacheKey::new(LatLon::new(-0.00004, 10.0), 1000.0, filters);
        assert_eq!(north, south);
        assert_eq!(north.as_str(), "0.0000,10.0000|1000|t1f0g0");

        let east = CacheKey::new(LatLon::new(51.4779, 0.00003), 1000.0, filters);
        let west = CacheKey::new(LatLon::new(51.4779, -0.00003), 1000.0, filters);
        assert_eq!(east, west);
        assert_eq!(east.as_str(), "51.4779,0.0000|1000|t1f0g0");
    }

    #[test]
    fn test_key_distinguishes_filters() {
        let center = LatLon::new(1.0, 2.0);
        let a = CacheKey::new(center, 800.0, FilterSet::new(true, false, false));
        let b = CacheKey::new(center, 800.0, FilterSet::new(true, true, false));
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn prop_round_coord_is_idempotent(x in -180.0f64..180.0) {
            let once = round_coord(x);
            prop_assert_eq!(round_coord(once), once);
        }

        #[test]
        fn prop_key_is_pure(lat in -80.0f64..80.0, lon in -170.0f64..170.0, r in 50.0f64..5000.0) {
            let filters = FilterSet::ALL;
            let a = CacheKey::new(LatLon::new(lat, lon), r, filters);
            let b = CacheKey::new(LatLon::new(lat, lon), r, filters);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_rounded_inputs_share_key(
            lat in prop_oneof![-80.0f64..80.0, -0.0001f64..0.0001],
            lon in prop_oneof![-170.0f64..170.0, -0.0001f64..0.0001],
        ) {
            let filters = FilterSet::new(true, false, false);
            let raw = CacheKey::new(LatLon::new(lat, lon), 800.0, filters);
            let rounded = CacheKey::new(LatLon::new(round_coord(lat), round_coord(lon)), 800.0, filters);
            prop_assert_eq!(raw, rounded);
        }

        #[test]
        fn prop_jitter_around_zero_shares_key(
            a in -0.000049f64..0.000049,
            b in -0.000049f64..0.000049,
            c in -0.000049f64..0.000049,
            d in -0.000049f64..0.000049,
        ) {
            let filters = FilterSet::ALL;
            let first = CacheKey::new(LatLon::new(a, b), 1000.0, filters);
            let second = CacheKey::new(LatLon::new(c, d), 1000.0, filters);
            prop_assert_eq!(first.as_str(), "0.0000,0.0000|1000|t1f1g1");
            prop_assert_eq!(first, second);
        }
    }
}
