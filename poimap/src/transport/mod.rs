//! Fault-tolerant transport to the data API mirrors.
//!
//! This module owns everything between "here is a search" and "here are the
//! normalized points": building the payload, posting it to an ordered list
//! of mirrors, honoring rate-limit hints, backing off, failing over, and
//! normalizing the JSON response.
//!
//! # Components
//!
//! - [`MirrorHttpClient`]: HTTP seam (real: [`ReqwestMirrorClient`])
//! - [`FetchPolicy`]: retry, backoff and failover constants
//! - [`TransportClient`]: the retry/failover loop
//! - [`FetchError`]: typed failures, including cancellation
//!
//! # Example
//!
//! ```ignore
//! use poimap::transport::{FetchRequest, ReqwestMirrorClient, TransportClient};
//! use tokio_util::sync::CancellationToken;
//!
//! let http = ReqwestMirrorClient::new(Duration::from_secs(30))?;
//! let client = TransportClient::new(http, mirrors, FetchPolicy::default(), QueryBuilder::default())?;
//! let points = client.fetch(&request, &CancellationToken::new()).await?;
//! ```

mod client;
mod error;
mod http;
mod policy;
mod response;

pub use client::{FetchRequest, TransportClient, DEFAULT_MIRRORS};
pub use error::{ErrorDisposition, FetchError};
pub use http::{MirrorHttpClient, MirrorResponse, ReqwestMirrorClient, DEFAULT_REQUEST_TIMEOUT};
pub use policy::{parse_retry_after, FetchPolicy};
pub use response::parse_elements;

#[cfg(test)]
pub use http::tests::{MockMirrorClient, ScriptedReply};
