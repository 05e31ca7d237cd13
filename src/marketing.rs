//! The running instance: context, plugin registry, and request entry points.

use crate::config::{self, OnApiErrorOptions, MarketingOptions};
use crate::context::MarketingContext;
use crate::endpoint::{run_endpoint, CallOptions, EndpointContext, EndpointOutput};
use crate::error::{ApiError, Result};
use crate::handlers::base_endpoints;
use crate::plugin::{Plugin, PluginRegistry, RouteMatch, RouteTable};
use crate::rate_limit::RateLimiter;
use crate::schema::core_schema;
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::response::Response;
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};

/// Input for a direct, in-process endpoint call.
#[derive(Clone, Debug, Default)]
pub struct CallInput {
    pub body: Value,
    pub query: Map<String, Value>,
    pub headers: HeaderMap,
}

impl CallInput {
    pub fn body(body: Value) -> Self {
        CallInput {
            body,
            ..Default::default()
        }
    }

    pub fn query(query: Value) -> Self {
        CallInput {
            query: query.as_object().cloned().unwrap_or_default(),
            ..Default::default()
        }
    }
}

pub struct Marketing {
    context: Arc<MarketingContext>,
    registry: RwLock<PluginRegistry>,
    pub(crate) disabled_paths: Vec<String>,
    pub(crate) rate_limiter: Option<RateLimiter>,
    pub(crate) on_api_error: OnApiErrorOptions,
}

impl Marketing {
    /// Validate options, merge plugin schemas, build the adapter, and run plugin
    /// `init` hooks in registration order.
    pub async fn init(options: MarketingOptions) -> Result<Arc<Self>> {
        let validated = config::validate(&options)?;
        let schema = core_schema().merge_plugins(options.plugins.iter().filter_map(|p| p.schema.as_ref()));
        let context = Arc::new(MarketingContext::new(&options, validated, schema));
        for plugin in &options.plugins {
            if let Some(init) = &plugin.init {
                init(context.clone()).await?;
            }
        }
        let registry = PluginRegistry::new(base_endpoints(), options.hooks.clone(), options.plugins.clone());
        if !options.logger.disabled {
            tracing::info!(
                base_path = %context.base_path,
                store = options.database.id(),
                plugins = ?options.plugins.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
                "{} initialized",
                context.app_name
            );
        }
        Ok(Arc::new(Marketing {
            context,
            registry: RwLock::new(registry),
            disabled_paths: options.disabled_paths.clone(),
            rate_limiter: options
                .rate_limit
                .enabled
                .then(|| RateLimiter::new(&options.rate_limit)),
            on_api_error: options.on_api_error.clone(),
        }))
    }

    pub fn context(&self) -> Arc<MarketingContext> {
        self.context.clone()
    }

    /// The current route table. Later plugin changes do not affect a held snapshot.
    pub fn snapshot(&self) -> Arc<RouteTable> {
        self.registry.read().unwrap_or_else(|e| e.into_inner()).snapshot()
    }

    pub fn routes(&self) -> Vec<(Method, String)> {
        self.snapshot().routes()
    }

    pub fn plugin_ids(&self) -> Vec<String> {
        let registry = self.registry.read().unwrap_or_else(|e| e.into_inner());
        registry.plugins().iter().map(|p| p.id.clone()).collect()
    }

    /// Register a plugin on the running instance. Its schema is not applied to
    /// the already-built adapter.
    pub async fn add_plugin(&self, plugin: Plugin) -> Result<Arc<RouteTable>> {
        if plugin.schema.is_some() {
            tracing::warn!(plugin = %plugin.id, "schema of a plugin added after init is not merged; run migrations and restart");
        }
        if let Some(init) = &plugin.init {
            init(self.context.clone()).await?;
        }
        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        Ok(registry.add(plugin))
    }

    /// Unregister a plugin, running its `destroy` hook if it has one.
    pub async fn remove_plugin(&self, id: &str) -> Result<Option<Arc<RouteTable>>> {
        let removed = {
            let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
            registry.remove(id)
        };
        let Some((plugin, table)) = removed else {
            return Ok(None);
        };
        if let Some(destroy) = &plugin.destroy {
            destroy(self.context.clone()).await?;
        }
        Ok(Some(table))
    }

    /// Call an endpoint directly, bypassing the HTTP layer. `path` is relative to
    /// the base path. Errors are returned unless `opts.as_response` is set.
    pub async fn call(&self, method: Method, path: &str, input: CallInput, opts: CallOptions) -> Result<EndpointOutput> {
        let table = self.snapshot();
        let (endpoint, params) = match table.find(&method, path) {
            RouteMatch::Found(endpoint, params) => (endpoint, params),
            RouteMatch::MethodNotAllowed => {
                return Err(ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED", "Method not allowed").into())
            }
            RouteMatch::NotFound => return Err(ApiError::not_found(format!("No endpoint for {}", path)).into()),
        };
        let mut ctx = EndpointContext::new(self.context.clone(), method, &endpoint.path, path);
        ctx.params = params;
        ctx.query = input.query;
        ctx.body = input.body;
        ctx.headers = input.headers;
        run_endpoint(&endpoint, ctx, table.hooks(), opts).await
    }

    /// The `Request -> Response` handler behind [`router`](Self::router).
    pub async fn handler(&self, req: Request<Body>) -> Result<Response> {
        crate::routes::dispatch(self, req).await
    }

    pub fn router(self: &Arc<Self>) -> axum::Router {
        crate::routes::router(self.clone())
    }
}
