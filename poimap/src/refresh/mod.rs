//! Viewport-driven refresh.
//!
//! The [`RefreshController`] turns a stream of viewport and filter events
//! into a coherent `(points, loading, error)` view for one subscriber:
//!
//! - pan/zoom bursts are debounced, explicit recenters fetch at once
//! - each fetch consults the [`ResultCache`](crate::cache::ResultCache) first
//! - a new network fetch cancels the one in flight
//! - overlapping fetches produce one loading flag via [`LoadingTracker`]
//!
//! Notifications go to a [`RefreshListener`]; an
//! `mpsc::UnboundedSender<RefreshEvent>` is the simplest one to use.

mod controller;
mod listener;
mod loading;

pub use controller::{
    FetchOutcome, RefreshConfig, RefreshController, RefreshPhase, DEFAULT_BASE_RADIUS_M,
    DEFAULT_DEBOUNCE,
};
pub use listener::{NoopListener, RefreshEvent, RefreshListener};
pub use loading::LoadingTracker;
