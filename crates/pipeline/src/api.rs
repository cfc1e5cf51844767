//! Callable API functions and the per-call orchestration around the pipeline.
//!
//! ## Call sequence
//!
//! 1. Arguments: `null` becomes an empty object; anything other than an
//!    object is rejected.
//! 2. A fresh [`Context`] is built from the descriptor and the arguments.
//! 3. The [`PreHook`] runs. Its `header` lands in the pass-through bag and its
//!    `params` are merged into the declared params (see
//!    [`Params::merge_hook`]).
//! 4. The compiled [`crate::Pipeline`] runs, unwind phase included.
//! 5. The [`PostHook`] receives the response data and the context. It may
//!    reject the call; its returned value is discarded.
//! 6. A captured transport error rejects the call; otherwise the response
//!    data resolves it.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, debug_span, Instrument};

use crate::client::ClientInner;
use crate::context::Context;
use crate::descriptor::RequestDescriptor;
use crate::errors::ApiError;
use crate::types::{JsonMap, Params};

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// What a [`PreHook`] may contribute to a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HookOutput {
    /// Merged into the declared params.
    pub params: Option<Params>,
    /// Stored as `header` in the pass-through bag. Prefer a middleware that
    /// edits `ctx.request.resolved.passthrough` directly.
    pub header: Option<JsonMap>,
}

/// Runs before the pipeline; may supply extra params or a header.
#[async_trait]
pub trait PreHook: Send + Sync {
    async fn before(&self) -> Result<HookOutput, ApiError>;
}

/// Runs after the pipeline with the response data and the finished context.
///
/// An `Err` rejects the call. An `Ok` value is ignored: the call always
/// resolves with the response data.
#[async_trait]
pub trait PostHook: Send + Sync {
    async fn after(&self, data: Value, ctx: &Context) -> Result<Value, ApiError>;
}

/// Adapts an async closure into a [`PreHook`].
pub struct PreHookFn<F>(F);

/// Wraps `f` as a [`PreHook`].
pub fn pre_hook_fn<F, Fut>(f: F) -> PreHookFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HookOutput, ApiError>> + Send + 'static,
{
    PreHookFn(f)
}

#[async_trait]
impl<F, Fut> PreHook for PreHookFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HookOutput, ApiError>> + Send + 'static,
{
    async fn before(&self) -> Result<HookOutput, ApiError> {
        (self.0)().await
    }
}

/// Adapts a synchronous closure into a [`PostHook`].
pub struct PostHookFn<F>(F);

/// Wraps `f` as a [`PostHook`].
pub fn post_hook_fn<F>(f: F) -> PostHookFn<F>
where
    F: Fn(Value, &Context) -> Result<Value, ApiError> + Send + Sync + 'static,
{
    PostHookFn(f)
}

#[async_trait]
impl<F> PostHook for PostHookFn<F>
where
    F: Fn(Value, &Context) -> Result<Value, ApiError> + Send + Sync + 'static,
{
    async fn after(&self, data: Value, ctx: &Context) -> Result<Value, ApiError> {
        (self.0)(data, ctx)
    }
}

// ---------------------------------------------------------------------------
// ApiFunction
// ---------------------------------------------------------------------------

/// Per-call options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// JSONP callback name; defaults to `<path>Callback`.
    pub callback_name: Option<String>,
}

impl CallOptions {
    pub fn callback_name(name: impl Into<String>) -> Self {
        Self {
            callback_name: Some(name.into()),
        }
    }
}

/// A callable endpoint produced by [`crate::Client::get_api`].
///
/// Cheap to clone. [`ApiFunction::key`] and [`ApiFunction::params`] expose the
/// prefetch metadata and never change between calls.
#[derive(Clone)]
pub struct ApiFunction {
    descriptor: Arc<RequestDescriptor>,
    client: Arc<ClientInner>,
}

impl ApiFunction {
    pub(crate) fn new(descriptor: RequestDescriptor, client: Arc<ClientInner>) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            client,
        }
    }

    /// The prefetch/cache key: `prefix + "/" + path`.
    pub fn key(&self) -> &str {
        &self.descriptor.full_path
    }

    /// The declared parameter shape.
    pub fn params(&self) -> &Params {
        &self.descriptor.params
    }

    /// The API name: `name`, or `path` when unnamed.
    pub fn name(&self) -> &str {
        &self.descriptor.api_name
    }

    /// The finalized endpoint configuration.
    pub fn descriptor(&self) -> &RequestDescriptor {
        &self.descriptor
    }

    /// Calls the endpoint with default options.
    pub async fn call(&self, args: Value) -> Result<Value, ApiError> {
        self.call_with(args, CallOptions::default()).await
    }

    /// Calls the endpoint.
    pub async fn call_with(&self, args: Value, options: CallOptions) -> Result<Value, ApiError> {
        let descriptor = &self.descriptor;
        let args = match args {
            Value::Null => JsonMap::new(),
            Value::Object(map) => map,
            _ => {
                return Err(ApiError::InvalidArgs {
                    api: descriptor.api_name.clone(),
                })
            }
        };

        let mut ctx = Context::new(Arc::clone(descriptor), args, options.callback_name);
        let span = debug_span!(
            "api_call",
            api = %descriptor.api_name,
            key = %descriptor.full_path,
            call_id = %ctx.call_id,
        );

        async move {
            let output = match &descriptor.pre_hook {
                Some(hook) => hook.before().await?,
                None => HookOutput::default(),
            };
            apply_hook_output(&mut ctx, output);

            let pipeline = self.client.compile(descriptor);
            pipeline.run(&mut ctx).await?;

            let data = match &ctx.response {
                Some(response) => response.data.clone(),
                None => {
                    return Err(ApiError::NoResponse {
                        api: descriptor.api_name.clone(),
                    })
                }
            };
            if let Some(hook) = &descriptor.post_hook {
                hook.after(data.clone(), &ctx).await?;
            }

            match ctx.response.take().and_then(|response| response.error) {
                Some(error) => {
                    debug!(%error, req_time = ?ctx.req_time, "call rejected");
                    Err(error)
                }
                None => {
                    debug!(req_time = ?ctx.req_time, "call resolved");
                    Ok(data)
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn apply_hook_output(ctx: &mut Context, output: HookOutput) {
    if let Some(header) = output.header {
        ctx.request
            .resolved
            .passthrough
            .insert("header".to_string(), Value::Object(header));
    }
    if let Some(params) = output.params {
        ctx.request.params = ctx.request.descriptor.params.merge_hook(params);
    }
}

impl std::fmt::Debug for ApiFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiFunction")
            .field("name", &self.descriptor.api_name)
            .field("key", &self.descriptor.full_path)
            .field("params", &self.descriptor.params)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ApiMap
// ---------------------------------------------------------------------------

/// API name → [`ApiFunction`], ordered by name.
#[derive(Debug, Clone, Default)]
pub struct ApiMap {
    apis: BTreeMap<String, ApiFunction>,
}

impl ApiMap {
    /// Inserts `api`, returning the function it replaced, if any.
    pub(crate) fn insert(&mut self, api: ApiFunction) -> Option<ApiFunction> {
        self.apis.insert(api.name().to_string(), api)
    }

    /// The function registered under `name`.
    pub fn get(&self, name: &str) -> Option<&ApiFunction> {
        self.apis.get(name)
    }

    /// Whether an API named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.apis.contains_key(name)
    }

    /// API names in ascending order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.apis.keys().map(String::as_str)
    }

    /// `(name, function)` pairs in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ApiFunction)> {
        self.apis.iter().map(|(name, api)| (name.as_str(), api))
    }

    /// Number of APIs.
    pub fn len(&self) -> usize {
        self.apis.len()
    }

    /// Whether the map holds no APIs.
    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}

impl std::ops::Index<&str> for ApiMap {
    type Output = ApiFunction;

    fn index(&self, name: &str) -> &ApiFunction {
        match self.apis.get(name) {
            Some(api) => api,
            None => panic!("no API named `{name}`"),
        }
    }
}
