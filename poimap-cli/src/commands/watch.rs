//! Watch command - drive a refresh controller from stdin.
//!
//! Each input line is one viewport event:
//!
//! ```text
//! view <lat> <lon> <half-diagonal-m>   pan/zoom settled (debounced)
//! center <lat> <lon>                   new location, fetch at once
//! filter <toilets|fountains|glass> <on|off>
//! refresh                              refetch the current viewport
//! ```
//!
//! Updates, loading changes and errors are printed as they arrive. The
//! command exits on Ctrl+C, or once stdin is closed and no debounce timer
//! or fetch is outstanding.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use poimap::coord::{LatLon, Viewport};
use poimap::model::{FilterSet, PoiCategory};
use poimap::refresh::{RefreshController, RefreshEvent};
use poimap::transport::MirrorHttpClient;

use super::common::{by_distance, format_point, FilterArgs};
use super::nearby::parse_center;
use crate::error::CliError;
use crate::runner::{CliRunner, GlobalOptions};

/// How often to check for completion once stdin is closed.
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Arguments for the watch command.
#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Maximum rows printed per update
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

/// One parsed stdin command.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchCommand {
    View(Viewport),
    Center(LatLon),
    Filter(PoiCategory, bool),
    Refresh,
}

impl WatchCommand {
    pub fn parse(line: &str) -> Result<Self, CliError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["view", lat, lon, half] => {
                let center = parse_center(number(lat)?, number(lon)?)?;
                Ok(Self::View(Viewport::from_radius_hint(center, number(half)?)))
            }
            ["center", lat, lon] => Ok(Self::Center(parse_center(number(lat)?, number(lon)?)?)),
            ["filter", category, state] => {
                let category = match *category {
                    "toilets" => PoiCategory::Toilets,
                    "fountains" => PoiCategory::DrinkingWater,
                    "glass" => PoiCategory::GlassRecycling,
                    other => return Err(CliError::Input(format!("unknown category '{}'", other))),
                };
                let on = match *state {
                    "on" => true,
                    "off" => false,
                    other => return Err(CliError::Input(format!("expected on|off, got '{}'", other))),
                };
                Ok(Self::Filter(category, on))
            }
            ["refresh"] => Ok(Self::Refresh),
            _ => Err(CliError::Input(format!("unrecognized command '{}'", line.trim()))),
        }
    }
}

fn number(raw: &str) -> Result<f64, CliError> {
    raw.parse()
        .map_err(|_| CliError::Input(format!("'{}' is not a number", raw)))
}

/// Filter set with one category switched.
fn with_category(filters: FilterSet, category: PoiCategory, on: bool) -> FilterSet {
    let mut next = filters;
    match category {
        PoiCategory::Toilets => next.toilets = on,
        PoiCategory::DrinkingWater => next.fountains = on,
        PoiCategory::GlassRecycling => next.glass = on,
    }
    next
}

fn apply<C: MirrorHttpClient + 'static>(controller: &RefreshController<C>, command: WatchCommand) {
    debug!(command = ?command, "Applying command");
    match command {
        WatchCommand::View(viewport) => controller.set_viewport(viewport),
        WatchCommand::Center(center) => controller.set_center(center),
        WatchCommand::Filter(category, on) => {
            controller.set_filters(with_category(controller.filters(), category, on))
        }
        WatchCommand::Refresh => controller.refresh(),
    }
}

/// Stdin is exhausted and the controller has nothing left to deliver.
fn finished<C: MirrorHttpClient + 'static>(
    stdin_closed: bool,
    controller: &RefreshController<C>,
) -> bool {
    stdin_closed && !controller.has_pending()
}

fn print_event<C: MirrorHttpClient + 'static>(
    controller: &RefreshController<C>,
    event: RefreshEvent,
    limit: usize,
) {
    match event {
        RefreshEvent::Loading(true) => println!("... loading"),
        RefreshEvent::Loading(false) => println!("... idle"),
        RefreshEvent::Error(e) => eprintln!("fetch failed, keeping previous results: {}", e),
        RefreshEvent::Updated(points) => {
            let filters = controller.filters();
            let visible = filters.visible(&points);
            let Some(viewport) = controller.viewport() else {
                return;
            };
            println!(
                "{} point(s) near {} [{}], {} visible",
                points.len(),
                viewport.center,
                filters,
                visible.len()
            );
            for (point, distance) in by_distance(&visible, viewport.center).into_iter().take(limit) {
                println!("{}", format_point(point, distance));
            }
        }
    }
}

/// Run the watch command.
pub fn run(args: WatchArgs, options: &GlobalOptions) -> Result<(), CliError> {
    let runner = CliRunner::new(options)?;
    runner.log_startup("watch");
    let config = runner.config().clone();

    let transport = Arc::new(runner.transport()?);
    let cache = runner.cache();
    let shutdown = runner.shutdown_token()?;
    let runtime = runner.runtime()?;

    runtime.block_on(async move {
        let (tx, mut events) = mpsc::unbounded_channel();
        let controller = RefreshController::new(
            transport,
            Arc::clone(&cache),
            config.refresh.clone(),
            args.filters.resolve(config.filters),
            Arc::new(tx),
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_closed = false;
        let mut poll = tokio::time::interval(DRAIN_POLL);

        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break Ok(()),

                line = lines.next_line(), if !stdin_closed => match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match WatchCommand::parse(&line) {
                        Ok(command) => apply(&controller, command),
                        Err(e) => eprintln!("{}", e),
                    },
                    Ok(None) => stdin_closed = true,
                    Err(e) => break Err(CliError::Io(e)),
                },

                Some(event) = events.recv() => print_event(&controller, event, args.limit),

                _ = poll.tick(), if stdin_closed => {
                    if finished(stdin_closed, &controller) {
                        break Ok(());
                    }
                }
            }
        };

        controller.shutdown();
        while let Ok(event) = events.try_recv() {
            print_event(&controller, event, args.limit);
        }

        let stats = cache.stats();
        debug!(stats = %stats, "Cache statistics");
        if let Some(e) = controller.last_error() {
            warn!(error = %e, "Last fetch failed");
        }
        result
    })
}
