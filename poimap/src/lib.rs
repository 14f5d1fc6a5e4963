//! poimap - nearby points of interest, kept fresh
//!
//! This library finds public toilets, drinking water and glass recycling
//! containers around a location by querying Overpass-compatible data API
//! mirrors, and keeps the result current while a map viewport moves.
//!
//! # Layers
//!
//! - [`query`]: center, radius and filters to a query payload
//! - [`transport`]: retry, backoff and failover across mirrors
//! - [`cache`]: TTL cache keyed by quantized search parameters
//! - [`refresh`]: debounced, single-flight viewport controller
//!
//! [`config`] and [`logging`] provide the ambient setup used by hosts such
//! as the `poimap` CLI.

pub mod cache;
pub mod config;
pub mod coord;
pub mod logging;
pub mod model;
pub mod query;
pub mod refresh;
pub mod transport;
