//! JSONP transport over `reqwest`.
//!
//! The callback name is appended to the URL as `<callbackParam>=<name>` and
//! the response body is expected to be `name(<json>)`, optionally followed by
//! a semicolon. Recognised options:
//!
//! | Key | Meaning |
//! |-----|---------|
//! | `callbackParam` | query parameter carrying the name (default `callback`) |
//! | `timeout` | milliseconds (default 5000) |
//! | `header` / `headers` | object of header name → value |

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{JsonpRequest, JsonpResponse, JsonpTransport, TransportError};
use serde_json::Value;
use tracing::{debug, warn};
use url::form_urlencoded;

use crate::error::HttpTransportError;
use crate::http::{apply_options, timeout_ms};

const DEFAULT_CALLBACK_PARAM: &str = "callback";
const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// [`JsonpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestJsonp {
    client: reqwest::Client,
}

impl ReqwestJsonp {
    pub fn new() -> Result<Self, HttpTransportError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(HttpTransportError::Build)?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JsonpTransport for ReqwestJsonp {
    async fn fetch(&self, request: JsonpRequest) -> Result<JsonpResponse, TransportError> {
        let param = request
            .options
            .get("callbackParam")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_CALLBACK_PARAM);
        let url = with_callback(&request.url, param, &request.callback_name);
        let timeout = timeout_ms(&request.options).unwrap_or(DEFAULT_TIMEOUT_MS);

        debug!(%url, callback = %request.callback_name, "sending JSONP request");
        let builder = apply_options(self.client.get(&url), &request.options)
            .timeout(Duration::from_millis(timeout));
        let response = builder
            .send()
            .await
            .map_err(|e| HttpTransportError::from_reqwest("JSONP", &request.url, e))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| HttpTransportError::from_reqwest("JSONP", &request.url, e))?;

        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "JSONP request returned an error status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload = unpad(&body, &request.callback_name).ok_or_else(|| {
            HttpTransportError::Unpadded {
                url: request.url.clone(),
                callback: request.callback_name.clone(),
            }
        })?;
        let payload: Value =
            serde_json::from_str(payload).map_err(|source| HttpTransportError::Decode {
                url: request.url.clone(),
                source,
            })?;
        Ok(JsonpResponse::new(payload))
    }
}

fn with_callback(url: &str, param: &str, name: &str) -> String {
    let pair = form_urlencoded::Serializer::new(String::new())
        .append_pair(param, name)
        .finish();
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{url}{sep}{pair}")
}

/// Extracts the JSON text from `name(...)`.
fn unpad<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    let body = body.trim();
    let body = body.strip_suffix(';').unwrap_or(body).trim_end();
    body.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use pipeline::JsonMap;

    fn request(url: String, callback: &str, options: Value) -> JsonpRequest {
        JsonpRequest {
            url,
            callback_name: callback.to_string(),
            options: match options {
                Value::Object(map) => map,
                _ => JsonMap::new(),
            },
        }
    }

    #[tokio::test]
    async fn fetch_unwraps_padding() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/fake-get/array-data")
                .query_param("a", "1")
                .query_param("callback", "arrayDataCallback");
            then.status(200)
                .body("arrayDataCallback([0, \"array data\"]);");
        });

        let transport = ReqwestJsonp::new().unwrap();
        let response = transport
            .fetch(request(
                server.url("/fake-get/array-data?a=1"),
                "arrayDataCallback",
                json!({}),
            ))
            .await
            .unwrap();

        assert_eq!(response.json(), json!([0, "array data"]));
        mock.assert();
    }

    #[tokio::test]
    async fn custom_callback_param_is_used() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/x").query_param("cb", "done");
            then.status(200).body("done({\"ok\":true})");
        });

        let transport = ReqwestJsonp::new().unwrap();
        let response = transport
            .fetch(request(server.url("/x"), "done", json!({ "callbackParam": "cb" })))
            .await
            .unwrap();

        assert_eq!(response.json(), json!({ "ok": true }));
        mock.assert();
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200)
                .delay(Duration::from_millis(500))
                .body("cb({})");
        });

        let transport = ReqwestJsonp::new().unwrap();
        let url = server.url("/slow");
        let err = transport
            .fetch(request(url.clone(), "cb", json!({ "timeout": 50 })))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), format!("JSONP request to {url} timed out"));
    }

    #[tokio::test]
    async fn wrong_callback_is_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/x");
            then.status(200).body("other({})");
        });

        let transport = ReqwestJsonp::new().unwrap();
        let err = transport
            .fetch(request(server.url("/x"), "cb", json!({})))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("is not a cb(...) call"), "got: {err}");
    }

    #[test]
    fn unpad_accepts_optional_semicolon_and_whitespace() {
        assert_eq!(unpad("cb({\"a\":1});\n", "cb"), Some("{\"a\":1}"));
        assert_eq!(unpad("cb ([1])", "cb"), Some("[1]"));
        assert_eq!(unpad("{\"a\":1}", "cb"), None);
    }

    #[test]
    fn callback_joins_existing_query() {
        assert_eq!(with_callback("/a?x=1", "callback", "f"), "/a?x=1&callback=f");
        assert_eq!(with_callback("/a", "cb", "my fn"), "/a?cb=my+fn");
    }
}
