//! Integration tests for the refresh controller.
//!
//! These drive a `RefreshController` end to end against a scripted mirror:
//! - cache hits and TTL expiry
//! - debouncing of pan/zoom bursts
//! - filter transitions
//! - cancellation of superseded fetches
//! - loading indicator and error reporting
//!
//! All tests run on paused Tokio time.
//!
//! Run with: `cargo test --test refresh_integration`

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use poimap::cache::ResultCache;
use poimap::coord::{LatLon, Viewport};
use poimap::model::FilterSet;
use poimap::query::QueryBuilder;
use poimap::refresh::{RefreshConfig, RefreshController, RefreshEvent, RefreshPhase};
use poimap::transport::{FetchError, FetchPolicy, MirrorHttpClient, MirrorResponse, TransportClient};

// ============================================================================
// Helpers
// ============================================================================

const MIRROR: &str = "https://mirror.test/api/interpreter";
const EMPTY: &str = r#"{"elements":[]}"#;

/// A toilet node at the given position, as the API would return it.
fn toilet_body(id: u64, lat: f64, lon: f64) -> String {
    format!(
        r#"{{"elements":[{{"type":"node","id":{},"lat":{},"lon":{},"tags":{{"amenity":"toilets"}}}}]}}"#,
        id, lat, lon
    )
}

struct Reply {
    delay: Duration,
    status: u16,
    body: String,
}

fn ok(body: impl Into<String>) -> Reply {
    Reply {
        delay: Duration::ZERO,
        status: 200,
        body: body.into(),
    }
}

fn slow(body: impl Into<String>, delay: Duration) -> Reply {
    Reply {
        delay,
        ..ok(body)
    }
}

fn status(status: u16) -> Reply {
    Reply {
        delay: Duration::ZERO,
        status,
        body: String::new(),
    }
}

/// Mirror that replays replies in order and answers `EMPTY` afterwards.
#[derive(Clone, Default)]
struct ScriptedMirror {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl ScriptedMirror {
    fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            ..Default::default()
        }
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }

    fn request_count(&self) -> usize {
        self.queries.lock().len()
    }
}

impl MirrorHttpClient for ScriptedMirror {
    async fn post_form(&self, _url: &str, query: &str) -> Result<MirrorResponse, FetchError> {
        self.queries.lock().push(query.to_string());
        let reply = self.replies.lock().pop_front().unwrap_or_else(|| ok(EMPTY));
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        Ok(MirrorResponse {
            status: reply.status,
            retry_after: None,
            body: reply.body.into_bytes(),
        })
    }
}

struct Harness {
    controller: RefreshController<ScriptedMirror>,
    mirror: ScriptedMirror,
    events: mpsc::UnboundedReceiver<RefreshEvent>,
}

impl Harness {
    fn new(mirror: ScriptedMirror, filters: FilterSet) -> Self {
        let transport = TransportClient::new(
            mirror.clone(),
            vec![MIRROR.to_string()],
            FetchPolicy::default(),
            QueryBuilder::default(),
        )
        .expect("one mirror configured");
        let (tx, events) = mpsc::unbounded_channel();
        let controller = RefreshController::new(
            Arc::new(transport),
            Arc::new(ResultCache::new(Duration::from_secs(300))),
            RefreshConfig::default(),
            filters,
            Arc::new(tx),
        );
        Self {
            controller,
            mirror,
            events,
        }
    }

    fn drain(&mut self) -> Vec<RefreshEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    fn loading_changes(&mut self) -> Vec<bool> {
        self.drain()
            .into_iter()
            .filter_map(|event| match event {
                RefreshEvent::Loading(loading) => Some(loading),
                _ => None,
            })
            .collect()
    }

    fn point_ids(&self) -> Vec<String> {
        self.controller.points().iter().map(|p| p.id.clone()).collect()
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_secs(5)).await;
}

fn berlin() -> LatLon {
    LatLon::new(52.52, 13.405)
}

fn hamburg() -> LatLon {
    LatLon::new(53.55, 9.993)
}

// ============================================================================
// Cache
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_repeat_search_within_ttl_hits_cache() {
    let mirror = ScriptedMirror::new([
        ok(toilet_body(1, 52.52, 13.405)),
        ok(toilet_body(2, 53.55, 9.993)),
    ]);
    let mut h = Harness::new(mirror, FilterSet::ALL);

    h.controller.set_center(berlin());
    settle().await;
    h.controller.set_center(hamburg());
    settle().await;
    assert_eq!(h.point_ids(), vec!["node/2"]);
    h.drain();

    h.controller.set_center(berlin());

    assert_eq!(h.mirror.request_count(), 2, "served from cache");
    assert_eq!(h.point_ids(), vec!["node/1"]);
    assert!(!h.controller.is_loading());
    let events = h.drain();
    assert!(events.iter().all(|e| !matches!(e, RefreshEvent::Loading(_))));
    assert!(matches!(events.as_slice(), [RefreshEvent::Updated(p)] if p.len() == 1));
}

#[tokio::test(start_paused = true)]
async fn test_jittered_center_shares_cache_entry() {
    let mirror = ScriptedMirror::new([ok(toilet_body(1, 52.52, 13.405))]);
    let h = Harness::new(mirror, FilterSet::ALL);

    h.controller.set_center(berlin());
    settle().await;
    h.controller.set_center(LatLon::new(52.52002, 13.40502));
    settle().await;

    assert_eq!(h.mirror.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_refetches() {
    let mirror = ScriptedMirror::new([
        ok(toilet_body(1, 52.52, 13.405)),
        ok(toilet_body(3, 52.52, 13.405)),
    ]);
    let h = Harness::new(mirror, FilterSet::ALL);

    h.controller.set_center(berlin());
    settle().await;
    tokio::time::sleep(Duration::from_secs(301)).await;
    h.controller.set_center(berlin());
    settle().await;

    assert_eq!(h.mirror.request_count(), 2);
    assert_eq!(h.point_ids(), vec!["node/3"]);
}

// ============================================================================
// Debounce
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_viewport_burst_fetches_once_with_last_params() {
    let h = Harness::new(ScriptedMirror::default(), FilterSet::ALL);

    for i in 0..5 {
        let center = LatLon::new(52.50 + 0.01 * i as f64, 13.40);
        h.controller.set_viewport(Viewport::from_radius_hint(center, 2000.0));
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(h.mirror.request_count(), 0, "still inside the quiet period");

    settle().await;

    let queries = h.mirror.queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("(around:2200,52.540000,13.400000)"), "{}", queries[0]);
}

#[tokio::test(start_paused = true)]
async fn test_recenter_supersedes_pending_debounce() {
    let h = Harness::new(ScriptedMirror::default(), FilterSet::ALL);

    h.controller
        .set_viewport(Viewport::from_radius_hint(hamburg(), 500.0));
    h.controller.set_center(berlin());
    settle().await;

    let queries = h.mirror.queries();
    assert_eq!(queries.len(), 1);
    assert!(queries[0].contains("52.520000,13.405000"));
    assert_eq!(h.controller.viewport().map(|v| v.half_diagonal_m), Some(500.0));
}

// ============================================================================
// Filters
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_filter_transitions() {
    let mirror = ScriptedMirror::new([ok(toilet_body(1, 52.52, 13.405))]);
    let h = Harness::new(mirror, FilterSet::new(true, false, false));

    h.controller.set_center(berlin());
    settle().await;
    assert_eq!(h.mirror.request_count(), 1);

    // true -> false never fetches
    h.controller.set_filters(FilterSet::new(false, false, false));
    settle().await;
    assert_eq!(h.mirror.request_count(), 1);
    assert_eq!(h.point_ids(), vec!["node/1"], "points kept for local re-filtering");

    // false -> true fetches once
    h.controller.set_filters(FilterSet::new(false, true, false));
    settle().await;
    assert_eq!(h.mirror.request_count(), 2);
    assert!(h.mirror.queries()[1].contains("drinking_water"));
}

#[tokio::test(start_paused = true)]
async fn test_filter_change_before_any_viewport_does_not_fetch() {
    let h = Harness::new(ScriptedMirror::default(), FilterSet::new(false, false, false));

    h.controller.set_filters(FilterSet::ALL);
    settle().await;

    assert_eq!(h.mirror.request_count(), 0);
    assert_eq!(h.controller.filters(), FilterSet::ALL);
}

// ============================================================================
// Single-flight and loading
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_superseded_fetch_never_delivers() {
    let mirror = ScriptedMirror::new([
        slow(toilet_body(1, 52.52, 13.405), Duration::from_secs(3)),
        slow(toilet_body(2, 53.55, 9.993), Duration::from_millis(500)),
    ]);
    let mut h = Harness::new(mirror, FilterSet::ALL);

    h.controller.set_center(berlin());
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.controller.set_center(hamburg());
    settle().await;

    assert_eq!(h.point_ids(), vec!["node/2"]);
    let updates: Vec<_> = h
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            RefreshEvent::Updated(points) => Some(points[0].id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(updates, vec!["node/2"]);
    assert_eq!(h.controller.phase(), RefreshPhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_cache_hit_during_fetch_does_not_flicker() {
    let mirror = ScriptedMirror::new([
        ok(toilet_body(1, 52.52, 13.405)),
        slow(toilet_body(2, 53.55, 9.993), Duration::from_secs(2)),
    ]);
    let mut h = Harness::new(mirror, FilterSet::ALL);

    h.controller.set_center(berlin());
    settle().await;
    assert_eq!(h.loading_changes(), vec![true, false]);

    h.controller.set_center(hamburg());
    h.controller.set_center(berlin());
    assert!(h.controller.is_loading(), "cancelled fetch still unwinding");
    settle().await;

    assert_eq!(h.loading_changes(), vec![true, false]);
    assert!(!h.controller.is_loading());
    assert_eq!(h.point_ids(), vec!["node/1"]);
}

// ============================================================================
// Errors and shutdown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failure_keeps_previous_points() {
    let mirror = ScriptedMirror::new([ok(toilet_body(1, 52.52, 13.405)), status(500)]);
    let mut h = Harness::new(mirror, FilterSet::ALL);

    h.controller.set_center(berlin());
    settle().await;
    h.drain();

    h.controller.set_center(hamburg());
    settle().await;

    assert_eq!(h.point_ids(), vec!["node/1"]);
    assert_eq!(h.controller.last_error(), Some(FetchError::Http { status: 500 }));
    let events = h.drain();
    assert!(events
        .iter()
        .any(|e| matches!(e, RefreshEvent::Error(FetchError::Http { status: 500 }))));
    assert!(matches!(events.last(), Some(RefreshEvent::Loading(false))));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_in_flight_fetch() {
    let mirror = ScriptedMirror::new([slow(toilet_body(1, 52.52, 13.405), Duration::from_secs(3))]);
    let mut h = Harness::new(mirror, FilterSet::ALL);

    h.controller.set_center(berlin());
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.controller.shutdown();
    settle().await;

    assert!(h.controller.points().is_empty());
    assert!(h.controller.last_error().is_none());
    assert_eq!(h.controller.phase(), RefreshPhase::Closed);
    assert!(!h.controller.is_loading());
    assert_eq!(h.loading_changes(), vec![true, false]);
}
