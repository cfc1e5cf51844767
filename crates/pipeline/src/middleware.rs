//! Onion-model middleware composition.
//!
//! A [`Pipeline`] is an ordered list of [`Middleware`]. Each middleware gets
//! the shared [`Context`] and a [`Next`] continuation. Awaiting
//! `next.run(ctx)` runs everything downstream, terminal dispatch included, and
//! only returns once the whole tail has settled. Code written after that await
//! therefore runs during the unwind phase, in reverse registration order.
//!
//! `Next` is consumed by `run`, so a middleware can invoke its tail at most
//! once. Not calling it at all short-circuits the chain; such a middleware is
//! expected to fill `ctx.response` itself.
//!
//! ```ignore
//! let timing = from_fn(|ctx, next| Box::pin(async move {
//!     next.run(ctx).await?;
//!     tracing::info!(elapsed = ?ctx.req_time, "done");
//!     Ok(())
//! }));
//! client.use_middleware(timing);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use tracing::trace;

use crate::context::Context;
use crate::errors::ApiError;
use crate::framing::FramingSet;

/// A step in the request pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Processes the call. Invoke `next.run(ctx)` to continue downstream.
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) -> Result<(), ApiError>;

    /// Name used in trace events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to a middleware.
pub type MiddlewareRef = Arc<dyn Middleware>;

/// The continuation handed to a middleware: the rest of the chain.
pub struct Next<'a> {
    rest: &'a [MiddlewareRef],
}

impl<'a> Next<'a> {
    /// A continuation over the whole of `chain`.
    pub fn new(chain: &'a [MiddlewareRef]) -> Self {
        Self { rest: chain }
    }

    /// Runs the remaining chain against `ctx`.
    pub async fn run(self, ctx: &mut Context) -> Result<(), ApiError> {
        match self.rest.split_first() {
            Some((head, tail)) => {
                trace!(middleware = head.name(), "enter");
                head.handle(ctx, Next { rest: tail }).await
            }
            None => Ok(()),
        }
    }

    /// Number of middleware left downstream.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}

// ---------------------------------------------------------------------------
// Closures
// ---------------------------------------------------------------------------

/// Wraps a closure as a middleware.
///
/// The closure must return a boxed future borrowing its arguments, which is
/// what `Box::pin(async move { ... })` produces.
pub fn from_fn<F>(f: F) -> MiddlewareRef
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<(), ApiError>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnMiddleware(f))
}

struct FnMiddleware<F>(F);

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Result<(), ApiError>>
        + Send
        + Sync
        + 'static,
{
    async fn handle(&self, ctx: &mut Context, next: Next<'_>) -> Result<(), ApiError> {
        (self.0)(ctx, next).await
    }
}

// ---------------------------------------------------------------------------
// Compiled chain
// ---------------------------------------------------------------------------

/// A compiled, ready-to-run middleware chain.
pub struct Pipeline {
    chain: Vec<MiddlewareRef>,
}

impl Pipeline {
    /// Assembles the chain for one call:
    ///
    /// `[start-time, format-params, ...middleware, update-url, format-response,
    /// end-time, dispatch]`
    ///
    /// where `middleware` is `global ++ local` when `use_global` is set and
    /// `local` alone otherwise.
    pub fn compile(
        framing: &FramingSet,
        global: &[MiddlewareRef],
        local: &[MiddlewareRef],
        use_global: bool,
        dispatch: MiddlewareRef,
    ) -> Self {
        let user_len = if use_global { global.len() } else { 0 } + local.len();
        let mut chain = Vec::with_capacity(user_len + 6);

        chain.push(Arc::clone(&framing.start_time));
        chain.push(Arc::clone(&framing.format_params));
        if use_global {
            chain.extend(global.iter().cloned());
        }
        chain.extend(local.iter().cloned());
        chain.push(Arc::clone(&framing.update_url));
        chain.push(Arc::clone(&framing.format_response));
        chain.push(Arc::clone(&framing.end_time));
        chain.push(dispatch);

        Self { chain }
    }

    /// Runs the chain to completion, unwind phase included.
    pub async fn run(&self, ctx: &mut Context) -> Result<(), ApiError> {
        Next::new(&self.chain).run(ctx).await
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Middleware names in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|m| m.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;
    use crate::context::Response;
    use crate::descriptor::RequestDescriptor;
    use crate::types::JsonMap;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        label: &'static str,
        log: Log,
    }

    #[async_trait]
    impl Middleware for Recorder {
        async fn handle(&self, ctx: &mut Context, next: Next<'_>) -> Result<(), ApiError> {
            self.log.lock().unwrap().push(format!("{}:in", self.label));
            next.run(ctx).await?;
            self.log.lock().unwrap().push(format!("{}:out", self.label));
            Ok(())
        }
    }

    struct Terminal {
        log: Log,
    }

    #[async_trait]
    impl Middleware for Terminal {
        async fn handle(&self, ctx: &mut Context, _next: Next<'_>) -> Result<(), ApiError> {
            self.log.lock().unwrap().push("terminal".to_string());
            ctx.response = Some(Response::ok(json!("done")));
            Ok(())
        }
    }

    fn ctx() -> Context {
        let descriptor = Arc::new(RequestDescriptor::for_test("fake", "onion"));
        Context::new(descriptor, JsonMap::new(), None)
    }

    fn recorder(label: &'static str, log: &Log) -> MiddlewareRef {
        Arc::new(Recorder {
            label,
            log: Arc::clone(log),
        })
    }

    #[tokio::test]
    async fn unwind_runs_in_reverse_order() {
        let log: Log = Arc::default();
        let chain: Vec<MiddlewareRef> = vec![
            recorder("a", &log),
            recorder("b", &log),
            Arc::new(Terminal { log: Arc::clone(&log) }),
        ];

        let mut ctx = ctx();
        Next::new(&chain).run(&mut ctx).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:in", "b:in", "terminal", "b:out", "a:out"]
        );
        assert_eq!(ctx.response.unwrap().data, json!("done"));
    }

    #[tokio::test]
    async fn errors_skip_the_rest_of_the_chain() {
        let log: Log = Arc::default();
        let failing = from_fn(|_ctx, _next| Box::pin(async { Err::<(), _>(ApiError::custom("boom")) }));
        let chain: Vec<MiddlewareRef> = vec![
            recorder("a", &log),
            failing,
            Arc::new(Terminal { log: Arc::clone(&log) }),
        ];

        let mut ctx = ctx();
        let err = Next::new(&chain).run(&mut ctx).await.unwrap_err();

        assert_eq!(err.to_string(), "boom");
        assert_eq!(*log.lock().unwrap(), vec!["a:in"]);
        assert!(ctx.response.is_none());
    }

    #[tokio::test]
    async fn closures_can_short_circuit() {
        let log: Log = Arc::default();
        let cached = from_fn(|ctx, _next| {
            Box::pin(async move {
                ctx.response = Some(Response::ok(json!({ "cached": true })));
                Ok::<(), ApiError>(())
            })
        });
        let chain: Vec<MiddlewareRef> = vec![cached, Arc::new(Terminal { log: Arc::clone(&log) })];

        let mut ctx = ctx();
        Next::new(&chain).run(&mut ctx).await.unwrap();

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(ctx.response.unwrap().data, json!({ "cached": true }));
    }

    #[test]
    fn compile_places_user_middleware_between_framing() {
        let log: Log = Arc::default();
        let framing = FramingSet::default();
        let global = vec![recorder("global", &log)];
        let local = vec![recorder("local", &log)];
        let dispatch: MiddlewareRef = Arc::new(Terminal { log: Arc::clone(&log) });

        let with_global =
            Pipeline::compile(&framing, &global, &local, true, Arc::clone(&dispatch));
        let names = with_global.names();
        assert_eq!(with_global.len(), 8);
        assert!(names[0].ends_with("StartTime"));
        assert!(names[1].ends_with("FormatParams"));
        assert!(names[2].ends_with("Recorder"));
        assert!(names[3].ends_with("Recorder"));
        assert!(names[4].ends_with("UpdateUrl"));
        assert!(names[5].ends_with("FormatResponse"));
        assert!(names[6].ends_with("EndTime"));
        assert!(names[7].ends_with("Terminal"));

        let without_global = Pipeline::compile(&framing, &global, &local, false, dispatch);
        assert_eq!(without_global.len(), 7);
    }

    #[test]
    fn next_reports_remaining_length() {
        let log: Log = Arc::default();
        let chain = vec![recorder("a", &log), recorder("b", &log)];
        assert_eq!(Next::new(&chain).remaining(), 2);
        assert_eq!(Next::new(&chain[1..]).remaining(), 1);
    }
}
