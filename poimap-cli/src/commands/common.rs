//! Helpers shared across commands.

use clap::Args;
use serde_json::{json, Value};

use poimap::coord::LatLon;
use poimap::model::{FilterSelection, FilterSet, GeoPoint};

/// Category flags. With none given, the configured default applies.
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct FilterArgs {
    /// Include public toilets
    #[arg(long)]
    pub toilets: bool,

    /// Include drinking water fountains
    #[arg(long)]
    pub fountains: bool,

    /// Include glass recycling containers
    #[arg(long)]
    pub glass: bool,
}

impl FilterArgs {
    /// Resolve the filter set: explicit flags win, otherwise `default`.
    pub fn resolve(&self, default: FilterSet) -> FilterSet {
        if !(self.toilets || self.fountains || self.glass) {
            return default;
        }
        let flag = |on: bool| on.then_some(true);
        FilterSet::normalize(Some(FilterSelection {
            toilets: flag(self.toilets),
            fountains: flag(self.fountains),
            glass: flag(self.glass),
        }))
    }
}

/// Points sorted by distance from `origin`, nearest first.
pub fn by_distance<'a>(points: &[&'a GeoPoint], origin: LatLon) -> Vec<(&'a GeoPoint, f64)> {
    let mut ranked: Vec<_> = points
        .iter()
        .map(|p| (*p, origin.distance_to(&LatLon::new(p.lat, p.lon))))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
    ranked
}

fn category_label(point: &GeoPoint) -> String {
    let labels: Vec<String> = point.categories().iter().map(|c| c.to_string()).collect();
    if labels.is_empty() {
        "-".to_string()
    } else {
        labels.join(", ")
    }
}

/// One human-readable line per point.
pub fn format_point(point: &GeoPoint, distance_m: f64) -> String {
    let name = point.tag("name").unwrap_or("");
    format!(
        "{:>7.0} m  {:<16} {:>10.5},{:<10.5} {}{}",
        distance_m,
        point.id,
        point.lat,
        point.lon,
        category_label(point),
        if name.is_empty() {
            String::new()
        } else {
            format!("  \"{}\"", name)
        }
    )
}

/// JSON object for one point.
pub fn point_json(point: &GeoPoint, distance_m: f64) -> Value {
    let categories: Vec<String> = point.categories().iter().map(|c| c.to_string()).collect();
    json!({
        "id": point.id,
        "kind": point.kind,
        "lat": point.lat,
        "lon": point.lon,
        "distance_m": distance_m.round(),
        "categories": categories,
        "tags": point.tags,
    })
}
