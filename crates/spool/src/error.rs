use std::sync::Arc;

use thiserror::Error;

/// Errors produced while opening or streaming a segment feed.
///
/// The enum is `Clone` so a single failure can be fanned out to every
/// consumer of a shared stream; the underlying `reqwest` error is kept
/// behind an `Arc` for that reason.
#[derive(Debug, Error, Clone)]
pub enum FeedError {
    /// The document was not a usable playlist: missing header, wrong
    /// playlist kind, or an undecodable key resource.
    #[error("invalid playlist from {url}: {reason}")]
    Format { url: String, reason: String },

    /// Transport-level failure from the HTTP client.
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        source: Arc<reqwest::Error>,
    },

    /// The request did not complete within the configured deadline.
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    /// The server answered with a non-success status code.
    #[error("unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    /// A master playlist was parsed but no variant could be selected.
    #[error("no playable variant in master playlist {url}")]
    NoPlayableVariant { url: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("HTTP client configuration failed: {0}")]
    Config(String),

    /// The feed was cancelled before this operation could run.
    #[error("feed cancelled")]
    Cancelled,
}

impl FeedError {
    /// Builds a [`FeedError::Format`] from anything displayable.
    pub fn format(url: impl Into<String>, reason: impl ToString) -> Self {
        FeedError::Format {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the same request can reasonably succeed.
    ///
    /// Server errors (5xx) and transport hiccups are retryable; client
    /// errors (4xx), malformed documents, and cancellation are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FeedError::Timeout { .. } => true,
            FeedError::Status { status, .. } => (500..=599).contains(status),
            FeedError::Network { source, .. } => {
                source.is_connect() || source.is_timeout() || source.is_request()
            }
            _ => false,
        }
    }
}
