//! Data API response normalization.
//!
//! The API answers with `{"elements": [...]}` where each element is
//!
//! ```json
//! {"type": "node", "id": 1, "lat": 52.5, "lon": 13.4, "tags": {...}}
//! {"type": "way", "id": 2, "center": {"lat": 52.5, "lon": 13.4}, "tags": {...}}
//! ```
//!
//! Nodes use their own coordinates, ways and relations their reported
//! centroid. Elements without resolvable coordinates, or of a type the engine
//! does not know, are dropped. Source order is preserved.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::error::FetchError;
use crate::model::{ElementKind, GeoPoint};

#[derive(Debug, Deserialize)]
struct ApiResponse {
    elements: Vec<RawElement>,
}

#[derive(Debug, Deserialize)]
struct RawElement {
    #[serde(rename = "type")]
    kind: String,
    id: u64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<RawCenter>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawCenter {
    lat: f64,
    lon: f64,
}

impl RawElement {
    fn into_point(self) -> Option<GeoPoint> {
        let kind = ElementKind::from_api_type(&self.kind)?;
        let (lat, lon) = match kind {
            ElementKind::Node => (self.lat?, self.lon?),
            ElementKind::Way | ElementKind::Relation => {
                let center = self.center?;
                (center.lat, center.lon)
            }
        };
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        Some(GeoPoint::new(kind, self.id, lat, lon, self.tags))
    }
}

/// Parse a response body into normalized points.
///
/// # Errors
///
/// `FetchError::MalformedResponse` if the body is not JSON of the expected
/// shape. An empty `elements` array is a valid, empty result.
pub fn parse_elements(body: &[u8]) -> Result<Vec<GeoPoint>, FetchError> {
    let response: ApiResponse = serde_json::from_slice(body)
        .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

    Ok(response
        .elements
        .into_iter()
        .filter_map(RawElement::into_point)
        .collect())
}
