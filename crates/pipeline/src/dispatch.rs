//! The terminal step of every chain: hands the resolved request to a transport.
//!
//! Route selection happened when the descriptor was finalized; the dispatcher
//! only builds the transport-specific request:
//!
//! | Route | Request |
//! |-------|---------|
//! | platform | `{url, full_url, data, method, ...passthrough}` |
//! | http | `{url: GET ? full_url : url, data, method, options: http ++ passthrough}` |
//! | jsonp, POST | http with `{url, data, method, options: http}` |
//! | jsonp, other verbs | jsonp with `{url: full_url, callback_name, options: jsonp}` |
//!
//! Whatever the transport returns is written to `ctx.response`. On failure the
//! data is a copy of the client's default error payload and the error is kept
//! alongside it. [`Dispatch::handle`] itself always returns `Ok`, which is what
//! lets every middleware above it complete its unwind phase.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::context::{Context, RequestContext, Response};
use crate::descriptor::RouteSelection;
use crate::errors::{ApiError, TransportError};
use crate::middleware::{Middleware, Next};
use crate::transport::{
    HttpRequestConfig, HttpTransport, JsonpRequest, JsonpTransport, PlatformRequest,
    PlatformTransport, Transports,
};
use crate::types::{TransportRoute, VALID_REQ_TYPES};

/// Terminal middleware that performs the request.
pub struct Dispatch {
    transports: Transports,
    default_error: Value,
}

impl Dispatch {
    pub fn new(transports: Transports, default_error: Value) -> Self {
        Self {
            transports,
            default_error,
        }
    }

    async fn send(&self, request: &RequestContext) -> Result<Value, ApiError> {
        let route = match &request.descriptor.route {
            RouteSelection::Valid(route) => *route,
            RouteSelection::Invalid(req_type) => {
                error!(
                    req_type = %req_type,
                    valid = ?VALID_REQ_TYPES,
                    "reqType is not a supported transport"
                );
                return Err(ApiError::InvalidReqType {
                    req_type: req_type.clone(),
                });
            }
        };

        let resolved = &request.resolved;
        let method = resolved.method.to_uppercase();
        debug!(%route, %method, url = %resolved.url, "dispatching request");

        match route {
            TransportRoute::Platform => {
                let request = PlatformRequest {
                    url: resolved.url.clone(),
                    full_url: resolved.full_url.clone(),
                    data: resolved.data.clone(),
                    method,
                    passthrough: resolved.passthrough.clone(),
                };
                Ok(self.platform()?.request(request).await?)
            }
            TransportRoute::Http => {
                let url = if method == "GET" {
                    resolved.full_url.clone()
                } else {
                    resolved.url.clone()
                };
                let mut options = request.descriptor.http_options.clone();
                options.extend(resolved.passthrough.clone());
                let request = HttpRequestConfig {
                    url,
                    method,
                    data: resolved.data.clone(),
                    options,
                };
                Ok(self.http()?.send(request).await?.data)
            }
            TransportRoute::JsonpFallback if method == "POST" => {
                let request = HttpRequestConfig {
                    url: resolved.url.clone(),
                    method,
                    data: resolved.data.clone(),
                    options: request.descriptor.http_options.clone(),
                };
                Ok(self.http()?.send(request).await?.data)
            }
            TransportRoute::JsonpFallback => {
                let request = JsonpRequest {
                    url: resolved.full_url.clone(),
                    callback_name: request.callback_name.clone(),
                    options: request.descriptor.jsonp_options.clone(),
                };
                Ok(self.jsonp()?.fetch(request).await?.json())
            }
        }
    }

    fn platform(&self) -> Result<&Arc<dyn PlatformTransport>, TransportError> {
        self.transports
            .platform
            .as_ref()
            .ok_or(TransportError::NotConfigured("platform"))
    }

    fn http(&self) -> Result<&Arc<dyn HttpTransport>, TransportError> {
        self.transports
            .http
            .as_ref()
            .ok_or(TransportError::NotConfigured("http"))
    }

    fn jsonp(&self) -> Result<&Arc<dyn JsonpTransport>, TransportError> {
        self.transports
            .jsonp
            .as_ref()
            .ok_or(TransportError::NotConfigured("jsonp"))
    }
}

#[async_trait]
impl Middleware for Dispatch {
    async fn handle(&self, ctx: &mut Context, _next: Next<'_>) -> Result<(), ApiError> {
        let response = match self.send(&ctx.request).await {
            Ok(data) => {
                debug!(api = %ctx.api_name(), "transport succeeded");
                Response::ok(data)
            }
            Err(error) => {
                warn!(api = %ctx.api_name(), %error, "transport failed, error captured");
                Response::failed(self.default_error.clone(), error)
            }
        };
        ctx.response = Some(response);
        Ok(())
    }
}
