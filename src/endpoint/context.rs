use crate::context::MarketingContext;
use crate::db::Record;
use crate::error::{ApiError, Result};
use crate::response::append_headers;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-call context: the shared process context overlaid with request-scoped fields.
#[derive(Clone)]
pub struct EndpointContext {
    pub method: Method,
    /// Route pattern that matched, e.g. `/user/get/:id`.
    pub route: String,
    /// Concrete request path relative to the base path.
    pub path: String,
    pub params: HashMap<String, String>,
    pub query: Map<String, Value>,
    pub body: Value,
    pub headers: HeaderMap,
    /// Headers collected for the response so far.
    pub response_headers: HeaderMap,
    /// The endpoint's response, visible to after hooks.
    pub returned: Option<Value>,
    pub context: Arc<MarketingContext>,
}

impl EndpointContext {
    pub fn new(context: Arc<MarketingContext>, method: Method, route: &str, path: &str) -> Self {
        EndpointContext {
            method,
            route: route.to_string(),
            path: path.to_string(),
            params: HashMap::new(),
            query: Map::new(),
            body: Value::Null,
            headers: HeaderMap::new(),
            response_headers: HeaderMap::new(),
            returned: None,
            context,
        }
    }

    pub fn param(&self, name: &str) -> Result<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ApiError::bad_request(format!("missing path parameter {}", name)).into())
    }

    /// The request body as a record; a missing body is empty.
    pub fn body_record(&self) -> Result<Record> {
        match &self.body {
            Value::Object(m) => Ok(m.clone()),
            Value::Null => Ok(Record::new()),
            _ => Err(ApiError::bad_request("body must be a JSON object").into()),
        }
    }

    pub fn query_bool(&self, name: &str) -> bool {
        match self.query.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true" || s == "1",
            _ => false,
        }
    }

    pub fn query_usize(&self, name: &str) -> Option<usize> {
        match self.query.get(name)? {
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn query_str(&self, name: &str) -> Option<&str> {
        self.query.get(name).and_then(Value::as_str)
    }

    /// Overlay a hook's patch: headers and fields are last-writer-wins per key.
    pub fn apply(&mut self, patch: ContextPatch) {
        append_headers(&mut self.headers, &patch.headers);
        if !patch.body.is_empty() {
            if !self.body.is_object() {
                self.body = Value::Object(Map::new());
            }
            if let Value::Object(body) = &mut self.body {
                body.extend(patch.body);
            }
        }
        self.query.extend(patch.query);
    }
}

/// Changes a before hook makes to the call, or headers an after hook adds to the response.
#[derive(Clone, Debug, Default)]
pub struct ContextPatch {
    pub headers: HeaderMap,
    pub body: Map<String, Value>,
    pub query: Map<String, Value>,
}

impl ContextPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn body_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.body.insert(key.to_string(), value.into());
        self
    }

    pub fn query_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.query.insert(key.to_string(), value.into());
        self
    }
}
