//! Transport port definitions.
//!
//! The pipeline never performs I/O. It describes each outgoing request as
//! plain data and hands it to one of three ports, implemented by the adapter
//! crates:
//!
//! | Port | Implemented by |
//! |------|----------------|
//! | [`PlatformTransport`] | `platform-transport` (host SDK request primitive) |
//! | [`HttpTransport`] | `http-transport` (`reqwest`) |
//! | [`JsonpTransport`] | `http-transport` (`reqwest`, callback-padded JSON) |
//!
//! Adapters must reject unsupported verbs with
//! [`TransportError::UnknownMethod`]; [`HttpMethod::parse`] does the check.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::TransportError;
use crate::types::JsonMap;

// ---------------------------------------------------------------------------
// Verbs
// ---------------------------------------------------------------------------

/// HTTP verbs understood by the bundled adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Options,
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Trace,
    Connect,
}

impl HttpMethod {
    /// Parses a verb case-insensitively.
    ///
    /// Unknown verbs fail with [`TransportError::UnknownMethod`] carrying the
    /// verb in uppercase.
    pub fn parse(method: &str) -> Result<Self, TransportError> {
        let upper = method.to_uppercase();
        match upper.as_str() {
            "OPTIONS" => Ok(HttpMethod::Options),
            "GET" => Ok(HttpMethod::Get),
            "HEAD" => Ok(HttpMethod::Head),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "TRACE" => Ok(HttpMethod::Trace),
            "CONNECT" => Ok(HttpMethod::Connect),
            _ => Err(TransportError::UnknownMethod(upper)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
            HttpMethod::Connect => "CONNECT",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

/// A request for the platform-native transport.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformRequest {
    /// `host + fullPath`, without query string.
    pub url: String,
    /// `url` with the request data encoded as a query string.
    pub full_url: String,
    /// Request data.
    pub data: JsonMap,
    /// Uppercased verb, not yet validated.
    pub method: String,
    /// Endpoint pass-through fields (loading flags, `header`, ...).
    pub passthrough: JsonMap,
}

/// A request for the generic HTTP transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequestConfig {
    pub url: String,
    /// Uppercased verb, not yet validated.
    pub method: String,
    pub data: JsonMap,
    /// Merged HTTP options. Recognised keys: `headers` / `header` (object),
    /// `timeout` (milliseconds). Unknown keys are ignored by the adapter.
    pub options: JsonMap,
}

/// A successful HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Decoded body.
    pub data: Value,
}

/// A request for the JSONP transport.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonpRequest {
    /// Full URL including the query string.
    pub url: String,
    /// Name of the global callback the server must wrap the payload in.
    pub callback_name: String,
    /// JSONP options (`callbackParam`, `timeout`).
    pub options: JsonMap,
}

/// A successful JSONP response.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonpResponse {
    payload: Value,
}

impl JsonpResponse {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }

    /// Consumes the response, returning the unpadded payload.
    pub fn json(self) -> Value {
        self.payload
    }
}

// ---------------------------------------------------------------------------
// Ports
// ---------------------------------------------------------------------------

/// The host platform's native request API.
#[async_trait]
pub trait PlatformTransport: Send + Sync {
    /// Performs the request and resolves with the response payload.
    async fn request(&self, request: PlatformRequest) -> Result<Value, TransportError>;
}

/// A generic promise-style HTTP client.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequestConfig) -> Result<HttpResponse, TransportError>;
}

/// A JSONP client.
#[async_trait]
pub trait JsonpTransport: Send + Sync {
    async fn fetch(&self, request: JsonpRequest) -> Result<JsonpResponse, TransportError>;
}

/// The set of transports a client was built with.
#[derive(Clone, Default)]
pub struct Transports {
    pub platform: Option<Arc<dyn PlatformTransport>>,
    pub http: Option<Arc<dyn HttpTransport>>,
    pub jsonp: Option<Arc<dyn JsonpTransport>>,
}

impl std::fmt::Debug for Transports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transports")
            .field("platform", &self.platform.is_some())
            .field("http", &self.http.is_some())
            .field("jsonp", &self.jsonp.is_some())
            .finish()
    }
}
