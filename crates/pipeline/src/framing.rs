//! Framing middleware: the fixed steps every compiled chain starts and ends with.
//!
//! | Step | Position | Effect |
//! |------|----------|--------|
//! | [`StartTime`] | first | stamps `ctx.start_time` |
//! | [`FormatParams`] | second | builds `resolved.data`, checks required params |
//! | [`UpdateUrl`] | after user middleware | computes `url` / `full_url` |
//! | [`FormatResponse`] | after user middleware | unwind: `[code, data, msg]` → object |
//! | [`EndTime`] | just before dispatch | unwind: stamps `end_time`, `req_time` |
//!
//! `UpdateUrl` runs after user middleware so the URL reflects any edits they
//! made to `resolved.data`. `EndTime` sits directly above dispatch, so its
//! unwind runs before any user middleware resumes and they always observe the
//! timing fields.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::form_urlencoded;

use crate::context::Context;
use crate::errors::ApiError;
use crate::middleware::{Middleware, MiddlewareRef, Next};
use crate::types::{JsonMap, Timestamp};

/// The five framing middleware a client compiles into every chain.
///
/// Replace individual entries through [`crate::ClientBuilder::framing`] to
/// customise formatting or timing.
#[derive(Clone)]
pub struct FramingSet {
    pub start_time: MiddlewareRef,
    pub format_params: MiddlewareRef,
    pub update_url: MiddlewareRef,
    pub format_response: MiddlewareRef,
    pub end_time: MiddlewareRef,
}

impl Default for FramingSet {
    fn default() -> Self {
        Self {
            start_time: Arc::new(StartTime),
            format_params: Arc::new(FormatParams),
            update_url: Arc::new(UpdateUrl),
            format_response: Arc::new(FormatResponse),
            end_time: Arc::new(EndTime),
        }
    }
}

impl std::fmt::Debug for FramingSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramingSet")
            .field("start_time", &self.start_time.name())
            .field("format_params", &self.format_params.name())
            .field("update_url", &self.update_url.name())
            .field("format_response", &self.format_response.name())
            .field("end_time", &self.end_time.name())
            .finish()
    }
}

// ---------------------------------------------------------------------------

/// Stamps the start of the call.
#[derive(Debug, Default)]
pub struct StartTime;

#[async_trait]
impl Middleware for StartTime {
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) -> Result<(), ApiError> {
        ctx.start_time = Some(Timestamp::now());
        next.run(ctx).await
    }
}

// ---------------------------------------------------------------------------

/// Builds the request data from declared params and call arguments.
///
/// Declared defaults are overlaid with every call argument, declared or not.
/// Parameters marked `{"required": true}` fail the call when missing or null.
/// Endpoint pass-through fields are copied into the bag without replacing a
/// `header` a pre-hook already put there.
#[derive(Debug, Default)]
pub struct FormatParams;

#[async_trait]
impl Middleware for FormatParams {
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) -> Result<(), ApiError> {
        let request = &mut ctx.request;

        let missing = request
            .params
            .required()
            .into_iter()
            .find(|name| request.args.get(*name).map_or(true, Value::is_null))
            .map(str::to_string);
        if let Some(param) = missing {
            return Err(ApiError::MissingParam {
                api: request.descriptor.api_name.clone(),
                param,
            });
        }

        let mut data = request.params.defaults();
        data.extend(request.args.iter().map(|(k, v)| (k.clone(), v.clone())));

        let resolved = &mut request.resolved;
        resolved.data = data;
        resolved.method = request.method.clone();
        for (key, value) in &request.descriptor.extra {
            resolved
                .passthrough
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        next.run(ctx).await
    }
}

// ---------------------------------------------------------------------------

/// Computes `url = host + fullPath` and `full_url = url?query`.
#[derive(Debug, Default)]
pub struct UpdateUrl;

#[async_trait]
impl Middleware for UpdateUrl {
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) -> Result<(), ApiError> {
        let request = &mut ctx.request;
        let url = format!("{}{}", request.host, request.descriptor.full_path);
        let query = encode_query(&request.resolved.data);

        request.resolved.full_url = if query.is_empty() {
            url.clone()
        } else {
            format!("{url}?{query}")
        };
        request.resolved.url = url;

        next.run(ctx).await
    }
}

/// Form-encodes `data`. Strings are used verbatim, `null` becomes empty, and
/// everything else is encoded as its JSON text.
pub fn encode_query(data: &JsonMap) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in data {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        serializer.append_pair(key, &text);
    }
    serializer.finish()
}

// ---------------------------------------------------------------------------

/// Normalises array payloads `[code, data, msg?]` into `{code, data, msg?}`.
#[derive(Debug, Default)]
pub struct FormatResponse;

#[async_trait]
impl Middleware for FormatResponse {
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) -> Result<(), ApiError> {
        next.run(ctx).await?;

        if let Some(response) = ctx.response.as_mut() {
            if let Some(normalized) = normalize_array(&response.data) {
                response.data = normalized;
            }
        }
        Ok(())
    }
}

fn normalize_array(data: &Value) -> Option<Value> {
    let items = data.as_array().filter(|items| items.len() >= 2)?;
    let mut object = JsonMap::new();
    object.insert("code".to_string(), items[0].clone());
    object.insert("data".to_string(), items[1].clone());
    if let Some(msg) = items.get(2) {
        object.insert("msg".to_string(), msg.clone());
    }
    Some(Value::Object(object))
}

// ---------------------------------------------------------------------------

/// Stamps the end of the call and the elapsed request time.
#[derive(Debug, Default)]
pub struct EndTime;

#[async_trait]
impl Middleware for EndTime {
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) -> Result<(), ApiError> {
        let outcome = next.run(ctx).await;

        let end = Timestamp::now();
        ctx.end_time = Some(end);
        ctx.req_time = ctx.start_time.map(|start| end.duration_since(start));

        outcome
    }
}
