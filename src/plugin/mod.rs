//! Plugins: named bundles of schema, endpoints, middleware, and hooks.

mod registry;

pub use registry::{PluginRegistry, RouteMatch, RouteTable};

use crate::context::MarketingContext;
use crate::endpoint::{Endpoint, Hook, HookSet, Middleware};
use crate::error::Result;
use crate::schema::PluginSchema;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The parts of an incoming request visible to `on_request` / `on_response`.
#[derive(Clone, Debug)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    /// Path relative to the base path.
    pub path: String,
    pub headers: HeaderMap,
}

pub type LifecycleFn = Arc<dyn Fn(Arc<MarketingContext>) -> BoxFuture<'static, Result<()>> + Send + Sync>;
/// `Some(response)` ends dispatch with that response.
pub type OnRequestFn = Arc<dyn Fn(RequestInfo) -> BoxFuture<'static, Result<Option<Response>>> + Send + Sync>;
/// Returns the response to send, either the one given or a replacement.
pub type OnResponseFn = Arc<dyn Fn(RequestInfo, Response) -> BoxFuture<'static, Result<Response>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Plugin {
    pub id: String,
    pub endpoints: Vec<Endpoint>,
    pub middlewares: Vec<Middleware>,
    pub schema: Option<PluginSchema>,
    pub hooks: HookSet,
    pub on_request: Option<OnRequestFn>,
    pub on_response: Option<OnResponseFn>,
    pub init: Option<LifecycleFn>,
    pub destroy: Option<LifecycleFn>,
}

impl Plugin {
    pub fn new(id: &str) -> Self {
        Plugin {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn schema(mut self, schema: PluginSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn before(mut self, hook: Hook) -> Self {
        self.hooks.before.push(hook);
        self
    }

    pub fn after(mut self, hook: Hook) -> Self {
        self.hooks.after.push(hook);
        self
    }

    pub fn on_request<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Response>>> + Send + 'static,
    {
        self.on_request = Some(Arc::new(move |req| -> BoxFuture<'static, Result<Option<Response>>> {
            Box::pin(f(req))
        }));
        self
    }

    pub fn on_response<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(RequestInfo, Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response>> + Send + 'static,
    {
        self.on_response = Some(Arc::new(move |req, res| -> BoxFuture<'static, Result<Response>> {
            Box::pin(f(req, res))
        }));
        self
    }

    pub fn on_init<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<MarketingContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.init = Some(lifecycle(f));
        self
    }

    pub fn on_destroy<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<MarketingContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.destroy = Some(lifecycle(f));
        self
    }
}

fn lifecycle<F, Fut>(f: F) -> LifecycleFn
where
    F: Fn(Arc<MarketingContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |ctx| -> BoxFuture<'static, Result<()>> { Box::pin(f(ctx)) })
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("id", &self.id)
            .field("endpoints", &self.endpoints)
            .field("schema", &self.schema.as_ref().map(|s| s.keys().collect::<Vec<_>>()))
            .finish()
    }
}
