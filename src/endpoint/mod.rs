//! Endpoints: one path-bound handler with declared input schemas, plus the
//! hook pipeline every call runs through.

mod context;
mod hooks;
mod wrap;

pub use context::{ContextPatch, EndpointContext};
pub use hooks::{Hook, HookOutcome, Middleware};
pub use wrap::{run_endpoint, CallOptions, EndpointOutput, HookSet};

use crate::error::Result;
use crate::validation::InputSchema;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What a handler produces: a JSON body, a status, and response headers.
#[derive(Clone, Debug)]
pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn json(body: Value) -> Self {
        Reply {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body,
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }
}

impl From<Value> for Reply {
    fn from(body: Value) -> Self {
        Reply::json(body)
    }
}

pub type HandlerFn = Arc<dyn Fn(EndpointContext) -> BoxFuture<'static, Result<Reply>> + Send + Sync>;

#[derive(Clone)]
pub struct Endpoint {
    pub method: Method,
    /// Route pattern relative to the base path, e.g. `/user/get/:id`.
    pub path: String,
    pub body: Option<InputSchema>,
    pub query: Option<InputSchema>,
    handler: HandlerFn,
}

impl Endpoint {
    pub fn new<F, Fut>(method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(EndpointContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        Endpoint {
            method,
            path: path.to_string(),
            body: None,
            query: None,
            handler: Arc::new(move |ctx| -> BoxFuture<'static, Result<Reply>> { Box::pin(handler(ctx)) }),
        }
    }

    pub fn get<F, Fut>(path: &str, handler: F) -> Self
    where
        F: Fn(EndpointContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        Self::new(Method::GET, path, handler)
    }

    pub fn post<F, Fut>(path: &str, handler: F) -> Self
    where
        F: Fn(EndpointContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        Self::new(Method::POST, path, handler)
    }

    pub fn put<F, Fut>(path: &str, handler: F) -> Self
    where
        F: Fn(EndpointContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        Self::new(Method::PUT, path, handler)
    }

    pub fn delete<F, Fut>(path: &str, handler: F) -> Self
    where
        F: Fn(EndpointContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply>> + Send + 'static,
    {
        Self::new(Method::DELETE, path, handler)
    }

    pub fn body(mut self, schema: InputSchema) -> Self {
        self.body = Some(schema);
        self
    }

    pub fn query(mut self, schema: InputSchema) -> Self {
        self.query = Some(schema);
        self
    }

    pub(crate) fn handler(&self) -> &HandlerFn {
        &self.handler
    }

    /// `:name` tokens of the pattern, in order.
    pub fn param_names(&self) -> Vec<&str> {
        self.path
            .split('/')
            .filter_map(|s| s.strip_prefix(':'))
            .collect()
    }

    /// Match a concrete path, returning captured params.
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        match_pattern(&self.path, path)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish()
    }
}

/// Segment-wise match of `/a/:b/c` against a concrete path. Empty segments are ignored.
pub fn match_pattern(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pat: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if pat.len() != segs.len() {
        return None;
    }
    let mut params = HashMap::new();
    for (p, s) in pat.iter().zip(segs.iter()) {
        match p.strip_prefix(':') {
            Some(name) => {
                let decoded = percent_encoding::percent_decode_str(s).decode_utf8_lossy().into_owned();
                params.insert(name.to_string(), decoded);
            }
            None if p == s => {}
            None => return None,
        }
    }
    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_captures_and_decodes_params() {
        let params = match_pattern("/notification/user/:userId", "/notification/user/a%20b").unwrap();
        assert_eq!(params["userId"], "a b");
        assert!(match_pattern("/user/get/:id", "/user/get").is_none());
        assert!(match_pattern("/user/get/:id", "/user/list/1").is_none());
    }

    #[test]
    fn param_names_in_order() {
        let e = Endpoint::get("/a/:x/b/:y", |_| async { Ok(Reply::json(Value::Null)) });
        assert_eq!(e.param_names(), vec!["x", "y"]);
    }
}
