//! Viewport-driven refresh controller.
//!
//! # State Machine
//!
//! ```text
//! Idle --[trigger, cache miss]--> Fetching
//! Fetching --[result | error]--> Idle
//! Fetching --[trigger]--> Fetching (previous fetch cancelled)
//! any --[shutdown]--> Closed
//! ```
//!
//! # Ordering
//!
//! Every trigger bumps a generation counter. A fetch may only publish its
//! result if its generation is still current, so a slow response that was
//! superseded never overwrites newer data even if it races its own
//! cancellation.
//!
//! Notifications are queued in an outbox while the state lock is held and
//! delivered after it is released, one at a time and in queue order. A
//! listener may therefore read the controller, or drive it, from inside a
//! callback.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::listener::{RefreshEvent, RefreshListener};
use super::loading::LoadingTracker;
use crate::cache::{CacheEntry, CacheKey, ResultCache};
use crate::coord::{LatLon, Viewport};
use crate::model::{FilterSet, GeoPoint};
use crate::transport::{ErrorDisposition, FetchError, FetchRequest, MirrorHttpClient, TransportClient};

/// Default quiet period before a pan/zoom burst triggers a fetch (300ms).
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Default minimum search radius in meters.
pub const DEFAULT_BASE_RADIUS_M: f64 = 1000.0;

/// Refresh controller settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshConfig {
    /// Quiet period for pan/zoom events.
    pub debounce: Duration,
    /// Lower bound for the effective search radius.
    pub base_radius_m: f64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            base_radius_m: DEFAULT_BASE_RADIUS_M,
        }
    }
}

/// Externally visible controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    /// No fetch outstanding.
    Idle,
    /// A network fetch is in flight.
    Fetching,
    /// Shut down; further events are ignored.
    Closed,
}

/// How a finished fetch was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Points were published to the listener.
    Delivered(usize),
    /// A newer trigger exists; the result was cached but not published.
    Superseded,
    /// The fetch was cancelled.
    Aborted,
    /// The fetch failed; previous points were kept.
    Failed(FetchError),
}

struct ControllerState {
    viewport: Option<Viewport>,
    filters: FilterSet,
    points: Arc<Vec<GeoPoint>>,
    generation: u64,
    debounce_seq: u64,
    debounce: Option<CancellationToken>,
    in_flight: Option<(u64, CancellationToken)>,
    loading: LoadingTracker,
    last_error: Option<FetchError>,
    closed: bool,
}

/// Pending notifications and whether some caller is delivering them.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<RefreshEvent>,
    draining: bool,
}

struct Inner<C: MirrorHttpClient> {
    transport: Arc<TransportClient<C>>,
    cache: Arc<ResultCache>,
    config: RefreshConfig,
    listener: Arc<dyn RefreshListener>,
    shutdown: CancellationToken,
    // Lock order: state, then outbox. Neither is held while the listener runs.
    state: Mutex<ControllerState>,
    outbox: Mutex<Outbox>,
}

/// Keeps points fresh for one viewport subscription.
///
/// This is a cheap handle; clones share the same subscription. All methods
/// must be called from within a Tokio runtime since fetches and debounce
/// timers run as spawned tasks.
///
/// # Example
///
/// ```ignore
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// let controller = RefreshController::new(transport, cache, RefreshConfig::default(), filters, Arc::new(tx));
///
/// controller.set_center(LatLon::new(52.52, 13.405));
/// while let Some(event) = rx.recv().await {
///     // RefreshEvent::Updated / Loading / Error
/// }
/// ```
pub struct RefreshController<C: MirrorHttpClient> {
    inner: Arc<Inner<C>>,
}

impl<C: MirrorHttpClient> Clone for RefreshController<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: MirrorHttpClient + 'static> RefreshController<C> {
    /// Create a controller with no viewport yet.
    pub fn new(
        transport: Arc<TransportClient<C>>,
        cache: Arc<ResultCache>,
        config: RefreshConfig,
        filters: FilterSet,
        listener: Arc<dyn RefreshListener>,
    ) -> Self {
        let state = ControllerState {
            viewport: None,
            filters,
            points: Arc::new(Vec::new()),
            generation: 0,
            debounce_seq: 0,
            debounce: None,
            in_flight: None,
            loading: LoadingTracker::new(),
            last_error: None,
            closed: false,
        };

        Self {
            inner: Arc::new(Inner {
                transport,
                cache,
                config,
                listener,
                shutdown: CancellationToken::new(),
                state: Mutex::new(state),
                outbox: Mutex::new(Outbox::default()),
            }),
        }
    }

    /// A new location became known: recenter and fetch immediately.
    ///
    /// Keeps the size of the last viewport (or the base radius if there is
    /// none yet) and supersedes any pending debounced event.
    pub fn set_center(&self, center: LatLon) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }

        let viewport = match state.viewport {
            Some(viewport) => viewport.recentered(center),
            None => Viewport::from_radius_hint(center, 0.0),
        };
        state.viewport = Some(viewport);
        Self::cancel_debounce(&mut state);

        debug!(center = %center, "Explicit recenter");
        self.start_fetch(&mut state, viewport);
        drop(state);
        self.flush();
    }

    /// The map settled after a pan or zoom. Debounced.
    pub fn set_viewport(&self, viewport: Viewport) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }

        state.viewport = Some(viewport);
        Self::cancel_debounce(&mut state);
        state.debounce_seq += 1;
        let seq = state.debounce_seq;
        let token = self.inner.shutdown.child_token();
        state.debounce = Some(token.clone());
        drop(state);

        let this = self.clone();
        let quiet = self.inner.config.debounce;
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(quiet) => this.fire_debounced(seq),
            }
        });
    }

    /// Replace the filter set.
    ///
    /// Fetches only when a category was turned on; turning categories off
    /// keeps the held points, which consumers re-filter locally.
    pub fn set_filters(&self, filters: FilterSet) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }

        let previous = state.filters;
        state.filters = filters;
        if !previous.newly_enabled(&filters) {
            debug!(from = %previous, to = %filters, "Filter change needs no fetch");
            return;
        }

        if let Some(viewport) = state.viewport {
            self.start_fetch(&mut state, viewport);
        }
        drop(state);
        self.flush();
    }

    /// Fetch for the current viewport right away, bypassing the debounce.
    pub fn refresh(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        if let Some(viewport) = state.viewport {
            Self::cancel_debounce(&mut state);
            self.start_fetch(&mut state, viewport);
        }
        drop(state);
        self.flush();
    }

    /// Tear down the subscription, cancelling timers and fetches.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.debounce = None;
        state.in_flight = None;
        self.inner.shutdown.cancel();
        debug!("Refresh controller shut down");
    }

    /// Points currently on display.
    pub fn points(&self) -> Arc<Vec<GeoPoint>> {
        Arc::clone(&self.inner.state.lock().points)
    }

    pub fn filters(&self) -> FilterSet {
        self.inner.state.lock().filters
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.inner.state.lock().viewport
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().loading.is_loading()
    }

    /// Whether a debounce timer or a network fetch is still outstanding.
    pub fn has_pending(&self) -> bool {
        let state = self.inner.state.lock();
        !state.closed && (state.debounce.is_some() || state.in_flight.is_some())
    }

    /// Most recent non-cancellation failure, cleared by the next success.
    pub fn last_error(&self) -> Option<FetchError> {
        self.inner.state.lock().last_error.clone()
    }

    pub fn phase(&self) -> RefreshPhase {
        let state = self.inner.state.lock();
        if state.closed {
            RefreshPhase::Closed
        } else if state.in_flight.is_some() {
            RefreshPhase::Fetching
        } else {
            RefreshPhase::Idle
        }
    }

    fn cancel_debounce(state: &mut ControllerState) {
        if let Some(token) = state.debounce.take() {
            token.cancel();
        }
    }

    fn fire_debounced(&self, seq: u64) {
        let mut state = self.inner.state.lock();
        if state.closed || state.debounce_seq != seq {
            return;
        }
        state.debounce = None;
        if let Some(viewport) = state.viewport {
            self.start_fetch(&mut state, viewport);
        }
        drop(state);
        self.flush();
    }

    /// Queue a notification. Caller holds the state lock.
    fn notify(&self, event: RefreshEvent) {
        self.inner.outbox.lock().queue.push_back(event);
    }

    fn notify_loading(&self, change: Option<bool>) {
        if let Some(loading) = change {
            self.notify(RefreshEvent::Loading(loading));
        }
    }

    /// Deliver queued notifications. Caller must not hold the state lock.
    ///
    /// Only one caller drains at a time; a caller that finds a drain in
    /// progress (another thread, or a listener re-entering the controller)
    /// leaves its events to that drain.
    fn flush(&self) {
        {
            let mut outbox = self.inner.outbox.lock();
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }

        loop {
            let next = {
                let mut outbox = self.inner.outbox.lock();
                let next = outbox.queue.pop_front();
                if next.is_none() {
                    outbox.draining = false;
                }
                next
            };
            let Some(event) = next else {
                break;
            };

            let listener = &self.inner.listener;
            match event {
                RefreshEvent::Updated(points) => listener.on_update(points),
                RefreshEvent::Loading(loading) => listener.on_loading_change(loading),
                RefreshEvent::Error(error) => listener.on_error(&error),
            }
        }
    }

    /// Serve from cache or launch a network fetch. Caller holds the lock.
    fn start_fetch(&self, state: &mut ControllerState, viewport: Viewport) {
        let radius_m = viewport.effective_radius_m(self.inner.config.base_radius_m);
        let request = FetchRequest::new(viewport.center, radius_m, state.filters);
        let key = request.cache_key();

        if let Some((_, token)) = state.in_flight.take() {
            debug!("Cancelling superseded fetch");
            token.cancel();
        }
        state.generation += 1;
        let generation = state.generation;

        if let Some(points) = self.inner.cache.lookup(&key, Instant::now()) {
            debug!(key = %key, points = points.len(), "Cache hit");
            state.points = Arc::clone(&points);
            self.notify(RefreshEvent::Updated(points));
            self.notify_loading(state.loading.settle());
            return;
        }

        debug!(key = %key, radius_m, "Cache miss, fetching");
        let token = self.inner.shutdown.child_token();
        state.in_flight = Some((generation, token.clone()));
        self.notify_loading(state.loading.begin());

        let this = self.clone();
        tokio::spawn(async move {
            let result = this.inner.transport.fetch(&request, &token).await;
            let outcome = this.complete_fetch(generation, key, result);
            debug!(generation, outcome = ?outcome, "Fetch finished");
        });
    }

    /// Classify a finished fetch, publish it if still current, and release
    /// its share of the loading indicator.
    fn complete_fetch(
        &self,
        generation: u64,
        key: CacheKey,
        result: Result<Vec<GeoPoint>, FetchError>,
    ) -> FetchOutcome {
        let result = result.map(Arc::new);
        if let Ok(points) = &result {
            self.inner
                .cache
                .set(key, CacheEntry::new(Instant::now(), Arc::clone(points)));
        }

        let mut state = self.inner.state.lock();
        let current = Self::finish_in_flight(&mut state, generation);
        let outcome = match result {
            Ok(points) if current => {
                let count = points.len();
                state.points = Arc::clone(&points);
                state.last_error = None;
                self.notify(RefreshEvent::Updated(points));
                FetchOutcome::Delivered(count)
            }
            Ok(_) => FetchOutcome::Superseded,
            Err(error) => match error.disposition() {
                ErrorDisposition::Ignore => FetchOutcome::Aborted,
                ErrorDisposition::Report if current => {
                    warn!(error = %error, "Fetch failed, keeping previous points");
                    state.last_error = Some(error.clone());
                    self.notify(RefreshEvent::Error(error.clone()));
                    FetchOutcome::Failed(error)
                }
                ErrorDisposition::Report => FetchOutcome::Superseded,
            },
        };
        self.notify_loading(state.loading.end());
        drop(state);

        self.flush();
        outcome
    }

    /// Clear the in-flight slot if it belongs to `generation`.
    ///
    /// Returns whether `generation` is still the current one.
    fn finish_in_flight(state: &mut ControllerState, generation: u64) -> bool {
        if state
            .in_flight
            .as_ref()
            .is_some_and(|(owner, _)| *owner == generation)
        {
            state.in_flight = None;
        }
        !state.closed && state.generation == generation
    }
}
