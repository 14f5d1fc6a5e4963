//! Transport error taxonomy.

use thiserror::Error;

/// Errors produced by a fetch.
///
/// `Aborted` is expected control flow (a newer request superseded this
/// one) and is never reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The fetch was cancelled.
    #[error("Request aborted")]
    Aborted,

    /// No response was received.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success status after the retry and failover policy was exhausted.
    #[error("HTTP {status} from data API")]
    Http { status: u16 },

    /// Response body was not the expected JSON shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Client-side misconfiguration (e.g. no mirrors).
    #[error("Configuration error: {0}")]
    Config(String),
}

/// What the refresh layer should do with a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Drop silently; not a failure.
    Ignore,
    /// Log and expose as the last error; keep displaying previous data.
    Report,
}

impl FetchError {
    /// Returns true for cancellation.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// HTTP status if the error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(*status),
            _ => None,
        }
    }

    pub fn disposition(&self) -> ErrorDisposition {
        if self.is_aborted() {
            ErrorDisposition::Ignore
        } else {
            ErrorDisposition::Report
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Network(e.to_string())
    }
}
