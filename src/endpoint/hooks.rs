use crate::endpoint::{ContextPatch, EndpointContext, Reply};
use crate::error::Result;
use axum::http::Method;
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Result of a hook. `Respond` ends a before phase with that reply, or replaces
/// the status and body in an after phase while its headers are merged in.
#[derive(Clone, Debug)]
pub enum HookOutcome {
    Continue(ContextPatch),
    Respond(Reply),
}

impl HookOutcome {
    pub fn proceed() -> Self {
        HookOutcome::Continue(ContextPatch::default())
    }

    /// `Respond` with a 200 JSON body and no extra headers.
    pub fn respond(body: Value) -> Self {
        HookOutcome::Respond(Reply::json(body))
    }
}

pub type HookMatcher = Arc<dyn Fn(&EndpointContext) -> bool + Send + Sync>;
pub type HookHandler = Arc<dyn Fn(EndpointContext) -> BoxFuture<'static, Result<HookOutcome>> + Send + Sync>;

#[derive(Clone)]
pub struct Hook {
    matcher: HookMatcher,
    handler: HookHandler,
}

impl Hook {
    pub fn new<M, F, Fut>(matcher: M, handler: F) -> Self
    where
        M: Fn(&EndpointContext) -> bool + Send + Sync + 'static,
        F: Fn(EndpointContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookOutcome>> + Send + 'static,
    {
        Hook {
            matcher: Arc::new(matcher),
            handler: Arc::new(move |ctx| -> BoxFuture<'static, Result<HookOutcome>> { Box::pin(handler(ctx)) }),
        }
    }

    pub fn always<F, Fut>(handler: F) -> Self
    where
        F: Fn(EndpointContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookOutcome>> + Send + 'static,
    {
        Self::new(|_| true, handler)
    }

    /// Runs only for one endpoint, identified by method and route pattern.
    pub fn on_route<F, Fut>(method: Method, route: &str, handler: F) -> Self
    where
        F: Fn(EndpointContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookOutcome>> + Send + 'static,
    {
        let route = route.to_string();
        Self::new(move |ctx| ctx.method == method && ctx.route == route, handler)
    }

    pub fn matches(&self, ctx: &EndpointContext) -> bool {
        (self.matcher)(ctx)
    }

    pub async fn run(&self, ctx: EndpointContext) -> Result<HookOutcome> {
        (self.handler)(ctx).await
    }
}

/// A plugin middleware: a before hook bound to a route glob (`/notification/*`).
#[derive(Clone)]
pub struct Middleware {
    pub path: String,
    pub hook: Hook,
}

impl Middleware {
    pub fn new<F, Fut>(path: &str, handler: F) -> Self
    where
        F: Fn(EndpointContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HookOutcome>> + Send + 'static,
    {
        let pattern = path.to_string();
        Middleware {
            path: path.to_string(),
            hook: Hook::new(move |ctx| glob_matches(&pattern, &ctx.route), handler),
        }
    }
}

fn glob_matches(pattern: &str, route: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => route.starts_with(prefix),
        None => pattern == route,
    }
}
