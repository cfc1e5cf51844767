//! Adapter-local errors and their mapping onto [`TransportError`].

use pipeline::TransportError;
use thiserror::Error;

/// Failures raised inside the reqwest adapters.
#[derive(Debug, Error)]
pub enum HttpTransportError {
    /// The underlying `reqwest::Client` could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// The request did not complete before its deadline.
    #[error("{kind} request to {url} timed out")]
    Timeout { kind: &'static str, url: String },

    /// Connection, protocol, or body-read failure.
    #[error("{kind} request to {url} failed: {source}")]
    Request {
        kind: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The JSONP body was not `callback(...)` around valid JSON.
    #[error("JSONP response from {url} is not a {callback}(...) call")]
    Unpadded { url: String, callback: String },

    /// The body claimed to be JSON but did not parse.
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl HttpTransportError {
    pub(crate) fn from_reqwest(kind: &'static str, url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                kind,
                url: url.to_string(),
            }
        } else {
            Self::Request {
                kind,
                url: url.to_string(),
                source,
            }
        }
    }
}

impl From<HttpTransportError> for TransportError {
    fn from(err: HttpTransportError) -> Self {
        TransportError::failed(err.to_string())
    }
}
