//! Overpass QL query construction.
//!
//! Translates a search center, radius and [`FilterSet`] into the query text
//! posted to the data API. Building is pure: no I/O and no validation of the
//! radius, which callers are expected to clamp beforehand.
//!
//! # Query Shape
//!
//! ```text
//! [out:json][timeout:25];
//! (
//!   nwr["amenity"="toilets"](around:800,52.520000,13.405000);
//!   nwr["recycling:glass"="yes"](around:800,52.520000,13.405000);
//! );
//! out center tags;
//! ```
//!
//! `nwr` matches nodes, ways and relations; `out center` makes the API report
//! a centroid for non-node elements.

use std::fmt::Write;

use crate::coord::LatLon;
use crate::model::FilterSet;

/// Default server-side query timeout, in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u32 = 25;

/// Clause used when every filter is off.
///
/// A zero-area bounding box: syntactically valid, matches nothing, and keeps
/// the transport and cache pipeline uniform.
pub const EMPTY_QUERY_CLAUSE: &str = "node(0,0,0,0);";

/// Builds Overpass QL for point-of-interest searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryBuilder {
    timeout_secs: u32,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_TIMEOUT_SECS)
    }
}

impl QueryBuilder {
    /// Create a builder with the given server-side timeout.
    pub fn new(timeout_secs: u32) -> Self {
        Self { timeout_secs }
    }

    /// Server-side timeout embedded in every query.
    pub fn timeout_secs(&self) -> u32 {
        self.timeout_secs
    }

    /// Build the query text for a radius search around `center`.
    pub fn build(&self, center: LatLon, radius_m: f64, filters: FilterSet) -> String {
        let mut query = format!("[out:json][timeout:{}];\n", self.timeout_secs);

        if filters.is_empty() {
            query.push_str(EMPTY_QUERY_CLAUSE);
            query.push('\n');
        } else {
            let around = format!(
                "(around:{},{:.6},{:.6})",
                radius_m, center.lat, center.lon
            );
            query.push_str("(\n");
            for category in filters.enabled() {
                for (key, value) in category.tag_clauses() {
                    // Writing to a String cannot fail
                    let _ = writeln!(query, "  nwr[\"{}\"=\"{}\"]{};", key, value, around);
                }
            }
            query.push_str(");\n");
        }

        query.push_str("out center tags;");
        query
    }
}
