//! Per-call state threaded through the middleware chain.
//!
//! A [`Context`] is created fresh for every call. Its `request` half starts as
//! a copy of the endpoint descriptor plus the call arguments and is refined by
//! the framing middleware into [`ResolvedParams`]. Its `response` half is empty
//! until the dispatch step (or a short-circuiting middleware) fills it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::descriptor::RequestDescriptor;
use crate::errors::ApiError;
use crate::identifiers::CallId;
use crate::types::{JsonMap, Params, Timestamp};

/// Mutable state for one API call.
#[derive(Debug)]
pub struct Context {
    pub call_id: CallId,
    pub request: RequestContext,
    /// `None` until the dispatch step runs.
    pub response: Option<Response>,
    /// Stamped by the start-time framing middleware.
    pub start_time: Option<Timestamp>,
    /// Stamped by the end-time framing middleware during unwind.
    pub end_time: Option<Timestamp>,
    /// `end_time - start_time`.
    pub req_time: Option<Duration>,
}

impl Context {
    /// Builds the context for a call to `descriptor`.
    ///
    /// `callback_name` defaults to `<path>Callback`.
    pub fn new(
        descriptor: Arc<RequestDescriptor>,
        args: JsonMap,
        callback_name: Option<String>,
    ) -> Self {
        let callback_name =
            callback_name.unwrap_or_else(|| format!("{}Callback", descriptor.path));
        let request = RequestContext {
            args,
            method: descriptor.method.clone(),
            host: descriptor.host.clone(),
            params: descriptor.params.clone(),
            callback_name,
            resolved: ResolvedParams::default(),
            descriptor,
        };
        Self {
            call_id: CallId::new_random(),
            request,
            response: None,
            start_time: None,
            end_time: None,
            req_time: None,
        }
    }

    /// Name of the API being called.
    pub fn api_name(&self) -> &str {
        &self.request.descriptor.api_name
    }
}

/// The request half of a [`Context`].
#[derive(Debug)]
pub struct RequestContext {
    /// The endpoint this call belongs to.
    pub descriptor: Arc<RequestDescriptor>,
    /// Call-time arguments.
    pub args: JsonMap,
    /// Verb as configured; the dispatcher uppercases it.
    pub method: String,
    pub host: String,
    /// Declared parameters after the pre-hook merge.
    pub params: Params,
    /// JSONP callback name.
    pub callback_name: String,
    /// Filled in by the framing middleware, read by the dispatcher.
    pub resolved: ResolvedParams,
}

/// The resolved request parameters consumed by the dispatch step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParams {
    /// `host + fullPath`.
    pub url: String,
    /// `url` plus the encoded query string.
    pub full_url: String,
    pub method: String,
    /// Request data: declared defaults overlaid with call arguments.
    pub data: JsonMap,
    /// Fields forwarded to the transport untouched.
    pub passthrough: JsonMap,
}

/// The response half of a [`Context`].
#[derive(Debug)]
pub struct Response {
    pub data: Value,
    pub error: Option<ApiError>,
}

impl Response {
    /// A successful response.
    pub fn ok(data: Value) -> Self {
        Self { data, error: None }
    }

    /// A failed response carrying fallback `data`.
    pub fn failed(data: Value, error: ApiError) -> Self {
        Self {
            data,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
