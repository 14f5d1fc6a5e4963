//! Domain model: result points, filter sets and point categories.
//!
//! # Filter normalization
//!
//! Filter selections arrive from the presentation layer or the config file
//! with any subset of categories specified. [`FilterSet::normalize`] turns
//! a missing or partial [`FilterSelection`] into a fully specified
//! [`FilterSet`] (unset → `false`). Everything downstream (cache keys, query
//! building) only ever sees a `FilterSet`, so an un-normalized selection can
//! never fracture the cache keyspace.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// OSM element type of a result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    /// Parse the `type` field of a data API element.
    pub fn from_api_type(s: &str) -> Option<Self> {
        match s {
            "node" => Some(Self::Node),
            "way" => Some(Self::Way),
            "relation" => Some(Self::Relation),
            _ => None,
        }
    }

    /// Lowercase name used in point ids.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized result row.
///
/// Ways and relations are reduced to their centroid, so every point has a
/// single coordinate regardless of its source geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// `"<kind>/<numeric id>"`, e.g. `"node/123"`.
    pub id: String,
    pub kind: ElementKind,
    pub lat: f64,
    pub lon: f64,
    pub tags: BTreeMap<String, String>,
}

impl GeoPoint {
    /// Create a point, deriving the id from kind and source id.
    pub fn new(
        kind: ElementKind,
        source_id: u64,
        lat: f64,
        lon: f64,
        tags: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: format!("{}/{}", kind, source_id),
            kind,
            lat,
            lon,
            tags,
        }
    }

    /// Value of a tag, if present.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Categories this point belongs to.
    pub fn categories(&self) -> Vec<PoiCategory> {
        PoiCategory::classify(&self.tags)
    }
}

/// Point-of-interest categories served by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoiCategory {
    Toilets,
    DrinkingWater,
    GlassRecycling,
}

/// Tag variants that all mean "glass recycling".
///
/// Mappers use several tagging schemes for the same thing; queries emit one
/// clause per variant and classification accepts any of them.
pub const GLASS_TAG_VARIANTS: [(&str, &str); 5] = [
    ("recycling", "glass"),
    ("recycling:glass", "yes"),
    ("recycling:glass_bottles", "yes"),
    ("recycling:glass_packaging", "yes"),
    ("recycling:material", "glass"),
];

impl PoiCategory {
    pub const ALL: [PoiCategory; 3] = [
        PoiCategory::Toilets,
        PoiCategory::DrinkingWater,
        PoiCategory::GlassRecycling,
    ];

    /// `(key, value)` tag clauses that select this category.
    pub fn tag_clauses(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Toilets => &[("amenity", "toilets")],
            Self::DrinkingWater => &[("amenity", "drinking_water")],
            Self::GlassRecycling => &GLASS_TAG_VARIANTS,
        }
    }

    /// Classify a tag map into zero or more categories.
    pub fn classify(tags: &BTreeMap<String, String>) -> Vec<PoiCategory> {
        Self::ALL
            .into_iter()
            .filter(|category| {
                category
                    .tag_clauses()
                    .iter()
                    .any(|(k, v)| tags.get(*k).is_some_and(|actual| actual == *v))
            })
            .collect()
    }
}

impl fmt::Display for PoiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Toilets => write!(f, "toilets"),
            Self::DrinkingWater => write!(f, "drinking water"),
            Self::GlassRecycling => write!(f, "glass recycling"),
        }
    }
}

/// Partially specified filter selection, as received from outside.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    #[serde(default)]
    pub toilets: Option<bool>,
    #[serde(default)]
    pub fountains: Option<bool>,
    #[serde(default)]
    pub glass: Option<bool>,
}

impl From<FilterSet> for FilterSelection {
    fn from(filters: FilterSet) -> Self {
        Self {
            toilets: Some(filters.toilets),
            fountains: Some(filters.fountains),
            glass: Some(filters.glass),
        }
    }
}

/// Fully normalized set of enabled categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSet {
    pub toilets: bool,
    pub fountains: bool,
    pub glass: bool,
}

impl FilterSet {
    /// Filter set with every category enabled.
    pub const ALL: FilterSet = FilterSet {
        toilets: true,
        fountains: true,
        glass: true,
    };

    pub fn new(toilets: bool, fountains: bool, glass: bool) -> Self {
        Self {
            toilets,
            fountains,
            glass,
        }
    }

    /// Normalize an optional, possibly partial selection.
    pub fn normalize(selection: Option<FilterSelection>) -> Self {
        let selection = selection.unwrap_or_default();
        Self {
            toilets: selection.toilets.unwrap_or(false),
            fountains: selection.fountains.unwrap_or(false),
            glass: selection.glass.unwrap_or(false),
        }
    }

    /// True when no category is enabled.
    pub fn is_empty(&self) -> bool {
        !(self.toilets || self.fountains || self.glass)
    }

    pub fn is_enabled(&self, category: PoiCategory) -> bool {
        match category {
            PoiCategory::Toilets => self.toilets,
            PoiCategory::DrinkingWater => self.fountains,
            PoiCategory::GlassRecycling => self.glass,
        }
    }

    /// Enabled categories in canonical order.
    pub fn enabled(&self) -> Vec<PoiCategory> {
        PoiCategory::ALL
            .into_iter()
            .filter(|c| self.is_enabled(*c))
            .collect()
    }

    /// Whether moving to `next` turns at least one category on.
    ///
    /// Only this transition needs new data; turning categories off is
    /// handled by filtering what is already held.
    pub fn newly_enabled(&self, next: &FilterSet) -> bool {
        (!self.toilets && next.toilets)
            || (!self.fountains && next.fountains)
            || (!self.glass && next.glass)
    }

    /// Whether a point belongs to at least one enabled category.
    pub fn matches(&self, point: &GeoPoint) -> bool {
        point
            .categories()
            .into_iter()
            .any(|category| self.is_enabled(category))
    }

    /// Points from `points` that match this filter set, in order.
    pub fn visible<'a>(&self, points: &'a [GeoPoint]) -> Vec<&'a GeoPoint> {
        points.iter().filter(|p| self.matches(p)).collect()
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t{}f{}g{}",
            u8::from(self.toilets),
            u8::from(self.fountains),
            u8::from(self.glass)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_normalize_none_is_all_false() {
        assert_eq!(FilterSet::normalize(None), FilterSet::new(false, false, false));
    }

    #[test]
    fn test_normalize_partial_selection() {
        let selection = FilterSelection {
            toilets: Some(true),
            fountains: None,
            glass: Some(false),
        };
        assert_eq!(
            FilterSet::normalize(Some(selection)),
            FilterSet::new(true, false, false)
        );
    }

    #[test]
    fn test_selection_deserializes_missing_fields() {
        let selection: FilterSelection = serde_json::from_str(r#"{"glass": true}"#).unwrap();
        assert_eq!(
            FilterSet::normalize(Some(selection)),
            FilterSet::new(false, false, true)
        );
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(
            t in proptest::option::of(any::<bool>()),
            f in proptest::option::of(any::<bool>()),
            g in proptest::option::of(any::<bool>()),
        ) {
            let once = FilterSet::normalize(Some(FilterSelection { toilets: t, fountains: f, glass: g }));
            let twice = FilterSet::normalize(Some(once.into()));
            prop_assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_newly_enabled_transitions() {
        let none = FilterSet::default();
        let toilets = FilterSet::new(true, false, false);
        let both = FilterSet::new(true, true, false);

        assert!(none.newly_enabled(&toilets));
        assert!(toilets.newly_enabled(&both));
        assert!(!both.newly_enabled(&toilets), "turning off needs no fetch");
        assert!(!toilets.newly_enabled(&toilets));
        assert!(!toilets.newly_enabled(&none));
    }

    #[test]
    fn test_display_matches_key_segment() {
        assert_eq!(FilterSet::new(true, false, true).to_string(), "t1f0g1");
        assert_eq!(FilterSet::default().to_string(), "t0f0g0");
    }

    #[test]
    fn test_classify_all_glass_variants() {
        for (k, v) in GLASS_TAG_VARIANTS {
            let categories = PoiCategory::classify(&tags(&[("amenity", "recycling"), (k, v)]));
            assert_eq!(categories, vec![PoiCategory::GlassRecycling], "{}={}", k, v);
        }
    }

    #[test]
    fn test_classify_toilets_and_water() {
        assert_eq!(
            PoiCategory::classify(&tags(&[("amenity", "toilets")])),
            vec![PoiCategory::Toilets]
        );
        assert_eq!(
            PoiCategory::classify(&tags(&[("amenity", "drinking_water")])),
            vec![PoiCategory::DrinkingWater]
        );
        assert!(PoiCategory::classify(&tags(&[("amenity", "bench")])).is_empty());
    }

    #[test]
    fn test_visible_refilters_locally() {
        let points = vec![
            GeoPoint::new(ElementKind::Node, 1, 0.0, 0.0, tags(&[("amenity", "toilets")])),
            GeoPoint::new(ElementKind::Way, 2, 0.0, 0.0, tags(&[("recycling:glass", "yes")])),
        ];
        let only_glass = FilterSet::new(false, false, true);
        let visible = only_glass.visible(&points);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "way/2");
    }

    #[test]
    fn test_point_id_format() {
        let p = GeoPoint::new(ElementKind::Relation, 42, 1.0, 2.0, BTreeMap::new());
        assert_eq!(p.id, "relation/42");
        assert_eq!(ElementKind::from_api_type("way"), Some(ElementKind::Way));
        assert_eq!(ElementKind::from_api_type("area"), None);
    }
}
