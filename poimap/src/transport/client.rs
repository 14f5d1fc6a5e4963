//! Retry and failover loop over an ordered mirror list.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::FetchError;
use super::http::{MirrorHttpClient, MirrorResponse};
use super::policy::FetchPolicy;
use super::response::parse_elements;
use crate::cache::CacheKey;
use crate::coord::LatLon;
use crate::model::{FilterSet, GeoPoint};
use crate::query::QueryBuilder;

/// Public Overpass API mirrors, in preference order.
pub const DEFAULT_MIRRORS: [&str; 3] = [
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://maps.mail.ru/osm/tools/overpass/api/interpreter",
];

/// One search: where, how far, and which categories.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchRequest {
    pub center: LatLon,
    pub radius_m: f64,
    pub filters: FilterSet,
}

impl FetchRequest {
    pub fn new(center: LatLon, radius_m: f64, filters: FilterSet) -> Self {
        Self {
            center,
            radius_m,
            filters,
        }
    }

    /// Cache key this request's result is stored under.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.center, self.radius_m, self.filters)
    }
}

/// What to do after a non-success response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextStep {
    /// Honor the server's `Retry-After` and retry the same mirror.
    WaitAndRetry(Duration),
    /// Pause briefly and move to the next mirror.
    Failover(Duration),
    /// Back off exponentially and retry the same mirror.
    Backoff(Duration),
    /// Give up with the response status.
    Fail,
}

/// Transport client for the data API.
///
/// Holds an HTTP client, the ordered mirror list and the retry policy. A
/// single client is safe to share between controllers via `Arc`.
pub struct TransportClient<C: MirrorHttpClient> {
    http: C,
    mirrors: Vec<String>,
    policy: FetchPolicy,
    builder: QueryBuilder,
}

impl<C: MirrorHttpClient> std::fmt::Debug for TransportClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportClient")
            .field("mirrors", &self.mirrors)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<C: MirrorHttpClient> TransportClient<C> {
    /// Creates a transport client.
    ///
    /// # Errors
    ///
    /// `FetchError::Config` if `mirrors` is empty.
    pub fn new(
        http: C,
        mirrors: Vec<String>,
        policy: FetchPolicy,
        builder: QueryBuilder,
    ) -> Result<Self, FetchError> {
        if mirrors.is_empty() {
            return Err(FetchError::Config(
                "at least one mirror endpoint is required".to_string(),
            ));
        }
        Ok(Self {
            http,
            mirrors,
            policy,
            builder,
        })
    }

    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    pub fn query_builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Fetch points for a request.
    ///
    /// Tries mirrors in order, honoring `Retry-After` hints, backing off on
    /// gateway timeouts and failing over on other server-side errors. The
    /// cancellation token interrupts both in-flight requests and waits.
    ///
    /// # Errors
    ///
    /// - `Aborted` if `cancel` fires
    /// - `Network` if a mirror could not be reached (no retry)
    /// - `Http { status }` once retries and mirrors are exhausted
    /// - `MalformedResponse` if a successful body cannot be parsed
    pub async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<GeoPoint>, FetchError> {
        let query = self
            .builder
            .build(request.center, request.radius_m, request.filters);

        let mut mirror = 0usize;
        let mut attempt = 1u32;
        let mut retry_after_waits = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Aborted);
            }

            let url = &self.mirrors[mirror];
            debug!(mirror = %url, attempt, "Posting query");

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Aborted),
                result = self.http.post_form(url, &query) => result,
            };

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    warn!(mirror = %url, error = %e, "Mirror unreachable");
                    return Err(e);
                }
            };

            if response.is_success() {
                let points = parse_elements(&response.body)?;
                info!(
                    mirror = %url,
                    points = points.len(),
                    radius_m = request.radius_m,
                    "Fetched points"
                );
                return Ok(points);
            }

            match self.next_step(&response, mirror, attempt, retry_after_waits) {
                NextStep::WaitAndRetry(delay) => {
                    warn!(
                        mirror = %url,
                        status = response.status,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, honoring Retry-After"
                    );
                    retry_after_waits += 1;
                    pause(delay, cancel).await?;
                }
                NextStep::Failover(delay) => {
                    warn!(
                        mirror = %url,
                        status = response.status,
                        next = %self.mirrors[mirror + 1],
                        "Failing over to next mirror"
                    );
                    pause(delay, cancel).await?;
                    mirror += 1;
                }
                NextStep::Backoff(delay) => {
                    warn!(
                        mirror = %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Gateway timeout, backing off"
                    );
                    pause(delay, cancel).await?;
                    attempt += 1;
                }
                NextStep::Fail => {
                    warn!(mirror = %url, status = response.status, attempt, "Giving up");
                    return Err(FetchError::Http {
                        status: response.status,
                    });
                }
            }
        }
    }

    fn next_step(
        &self,
        response: &MirrorResponse,
        mirror: usize,
        attempt: u32,
        retry_after_waits: u32,
    ) -> NextStep {
        let status = response.status;

        if matches!(status, 429 | 503) && retry_after_waits < self.policy.max_retry_after_waits {
            if let Some(delay) = self
                .policy
                .retry_after_delay(response.retry_after.as_deref(), Utc::now())
            {
                return NextStep::WaitAndRetry(delay);
            }
        }

        let has_next_mirror = mirror + 1 < self.mirrors.len();
        let failover_status =
            status == 400 || status == 429 || ((500..600).contains(&status) && status != 504);
        if failover_status && has_next_mirror {
            return NextStep::Failover(self.policy.failover_pause);
        }

        if status == 504 && attempt < self.policy.max_attempts {
            return NextStep::Backoff(self.policy.backoff_for_attempt(attempt));
        }

        NextStep::Fail
    }
}

/// Sleep that returns `Aborted` as soon as `cancel` fires.
async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), FetchError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Aborted),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
