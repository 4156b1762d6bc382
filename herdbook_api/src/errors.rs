//! Error types for the API client.

use thiserror::Error;

/// Typed failure raised for every request that does not complete successfully.
///
/// Raised for every non-2xx response and for client-side timeout/network
/// failures; the transport layer never recovers locally, it always raises.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The server answered with a non-success HTTP status.
    #[error("{url} returned {status} {status_text}")]
    Status {
        status: u16,
        status_text: String,
        /// Parsed JSON error body when the server sent one, otherwise the
        /// raw text wrapped as a JSON string.
        body: Option<serde_json::Value>,
        url: String,
    },
    /// The request exceeded the configured timeout and was aborted.
    #[error("request to {url} timed out")]
    Timeout { url: String },
    /// The request never produced an HTTP response (DNS, connect, abort).
    #[error("network failure for {url}: {message}")]
    Network { url: String, message: String },
    /// A success response whose body could not be decoded as the expected type.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },
    /// The base URL and path do not combine into a valid URL.
    #[error("invalid URL: {message}")]
    InvalidUrl { message: String },
}

impl ApiError {
    /// HTTP status backing this failure. Timeouts report 408; failures that
    /// never produced an HTTP response report 0.
    pub fn status(&self) -> u16 {
        match self {
            Self::Status { status, .. } => *status,
            Self::Timeout { .. } => 408,
            _ => 0,
        }
    }

    /// Parsed error body, when the server attached one.
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    /// The request URL, when one was formed.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Status { url, .. }
            | Self::Timeout { url }
            | Self::Network { url, .. }
            | Self::Decode { url, .. } => Some(url),
            Self::InvalidUrl { .. } => None,
        }
    }
}
