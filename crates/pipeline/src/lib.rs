//! Request pipeline engine for apiwire.
//!
//! A nested [`ApiGroup`] of endpoint definitions is flattened into callable
//! [`ApiFunction`]s. Each call builds a fresh [`Context`], runs the optional
//! pre-hook, sends the context through an onion-model middleware chain that
//! ends in transport dispatch, and hands the result to the optional post-hook.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate performs no I/O itself.
//! Transports are supplied through the [`PlatformTransport`],
//! [`HttpTransport`], and [`JsonpTransport`] traits; the `http-transport` and
//! `platform-transport` crates implement them.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`descriptor`] | Endpoint/group config and the flattener |
//! | [`client`] | `Client`, its builder and configuration |
//! | [`api`] | `ApiFunction`, hooks, the per-call orchestration |
//! | [`middleware`] | `Middleware`, `Next`, chain compilation |
//! | [`framing`] | Built-in timing, param, URL and response middleware |
//! | [`dispatch`] | Terminal transport dispatch |
//! | [`context`] | Per-call state |
//! | [`transport`] | Transport ports and request/response shapes |
//! | [`identifiers`] | `CallId` |
//! | [`types`] | `Params`, transport kinds, `Timestamp` |
//! | [`errors`] | `ConfigError`, `TransportError`, `ApiError` |

pub mod api;
pub mod client;
pub mod context;
pub mod descriptor;
pub mod dispatch;
pub mod errors;
pub mod framing;
pub mod identifiers;
pub mod middleware;
pub mod transport;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use api::{
    post_hook_fn, pre_hook_fn, ApiFunction, ApiMap, CallOptions, HookOutput, PostHook,
    PostHookFn, PreHook, PreHookFn,
};
pub use client::{Client, ClientBuilder, ClientConfig};
pub use context::{Context, RequestContext, ResolvedParams, Response};
pub use descriptor::{
    flatten, merge_options, ApiGroup, ClientDefaults, EndpointConfig, EndpointOptions,
    RequestDescriptor, RouteSelection, DEFAULT_METHOD,
};
pub use dispatch::Dispatch;
pub use errors::{ApiError, ConfigError, TransportError};
pub use framing::{encode_query, FramingSet};
pub use identifiers::CallId;
pub use middleware::{from_fn, Middleware, MiddlewareRef, Next, Pipeline};
pub use transport::{
    HttpMethod, HttpRequestConfig, HttpResponse, HttpTransport, JsonpRequest, JsonpResponse,
    JsonpTransport, PlatformRequest, PlatformTransport, Transports,
};
pub use types::{JsonMap, Params, Timestamp, TransportKind, TransportRoute, VALID_REQ_TYPES};
