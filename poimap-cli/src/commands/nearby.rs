//! Nearby command - one-shot search around a location.

use clap::Args;
use tracing::info;

use poimap::coord::{LatLon, Viewport};
use poimap::transport::FetchRequest;

use super::common::{by_distance, format_point, point_json, FilterArgs};
use crate::error::CliError;
use crate::runner::{CliRunner, GlobalOptions};

/// Arguments for the nearby command.
#[derive(Debug, Args)]
pub struct NearbyArgs {
    /// Latitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// Search radius in meters (never below the configured base radius)
    #[arg(long)]
    pub radius: Option<f64>,

    #[command(flatten)]
    pub filters: FilterArgs,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Run the nearby command.
pub fn run(args: NearbyArgs, options: &GlobalOptions) -> Result<(), CliError> {
    let center = parse_center(args.lat, args.lon)?;
    let runner = CliRunner::new(options)?;
    runner.log_startup("nearby");
    let config = runner.config();

    let filters = args.filters.resolve(config.filters);
    let radius_m = Viewport::from_radius_hint(center, args.radius.unwrap_or(0.0))
        .effective_radius_m(config.refresh.base_radius_m);
    let request = FetchRequest::new(center, radius_m, filters);

    let transport = runner.transport()?;
    let cancel = runner.shutdown_token()?;
    let runtime = runner.runtime()?;

    let points = runtime.block_on(async { transport.fetch(&request, &cancel).await })?;
    info!(points = points.len(), radius_m, filters = %filters, "Search complete");

    let visible = filters.visible(&points);
    let ranked = by_distance(&visible, center);

    if args.json {
        let rows: Vec<_> = ranked.iter().map(|(p, d)| point_json(p, *d)).collect();
        let out = serde_json::to_string_pretty(&rows)
            .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
        println!("{}", out);
        return Ok(());
    }

    println!(
        "{} result(s) within {:.0} m of {} [{}]",
        ranked.len(),
        radius_m,
        center,
        filters
    );
    for (point, distance) in ranked {
        println!("{}", format_point(point, distance));
    }
    Ok(())
}

/// Validate a coordinate pair from the command line.
pub fn parse_center(lat: f64, lon: f64) -> Result<LatLon, CliError> {
    if !(lat.is_finite() && (-90.0..=90.0).contains(&lat)) {
        return Err(CliError::Input(format!("latitude {} out of range", lat)));
    }
    if !(lon.is_finite() && (-180.0..=180.0).contains(&lon)) {
        return Err(CliError::Input(format!("longitude {} out of range", lon)));
    }
    Ok(LatLon::new(lat, lon))
}
