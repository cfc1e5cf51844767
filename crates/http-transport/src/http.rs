//! Generic HTTP transport over `reqwest`.
//!
//! Recognised options (from `httpOptions` and the pass-through bag):
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `header` / `headers` | object of header name → value |
//! | `timeout` | milliseconds; `0` or absent means no timeout |
//!
//! `GET` and `HEAD` carry their data in the query string the pipeline already
//! built; every other verb sends `data` as a JSON body. Response bodies are
//! parsed as JSON when possible and returned as a JSON string otherwise.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{HttpMethod, HttpRequestConfig, HttpResponse, HttpTransport, JsonMap, TransportError};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::HttpTransportError;

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    /// Builds an adapter with a fresh client.
    pub fn new() -> Result<Self, HttpTransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(HttpTransportError::Build)?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttp {
    async fn send(&self, request: HttpRequestConfig) -> Result<HttpResponse, TransportError> {
        let method = HttpMethod::parse(&request.method)?;
        let url = request.url;

        let mut builder = self.client.request(to_reqwest(method), &url);
        builder = apply_options(builder, &request.options);
        if !matches!(method, HttpMethod::Get | HttpMethod::Head) {
            builder = builder.json(&request.data);
        }

        debug!(%method, %url, "sending HTTP request");
        let response = builder
            .send()
            .await
            .map_err(|e| HttpTransportError::from_reqwest("HTTP", &url, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| HttpTransportError::from_reqwest("HTTP", &url, e))?;

        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "HTTP request returned an error status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            data: parse_body(body),
        })
    }
}

pub(crate) fn to_reqwest(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Options => Method::OPTIONS,
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Trace => Method::TRACE,
        HttpMethod::Connect => Method::CONNECT,
    }
}

/// Applies `header`/`headers` and `timeout` from an option bag.
pub(crate) fn apply_options(mut builder: RequestBuilder, options: &JsonMap) -> RequestBuilder {
    for key in ["headers", "header"] {
        if let Some(Value::Object(headers)) = options.get(key) {
            for (name, value) in headers {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                builder = builder.header(name.as_str(), value);
            }
        }
    }
    if let Some(ms) = timeout_ms(options) {
        builder = builder.timeout(Duration::from_millis(ms));
    }
    builder
}

pub(crate) fn timeout_ms(options: &JsonMap) -> Option<u64> {
    options
        .get("timeout")
        .and_then(Value::as_u64)
        .filter(|ms| *ms > 0)
}

fn parse_body(body: String) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}
