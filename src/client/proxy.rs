//! Turning one argument object into a concrete request for a resolved route.

use crate::client::resolve::RouteSpec;
use crate::error::ClientError;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

/// Characters left unescaped in a path segment or query component.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// The caller's argument object split by role.
#[derive(Debug, Default, PartialEq)]
pub struct CallArgs {
    pub params: Map<String, Value>,
    pub query: Map<String, Value>,
    pub fetch_options: Map<String, Value>,
    pub body: Map<String, Value>,
}

#[derive(Debug)]
pub struct PreparedRequest {
    pub method: Method,
    /// Path relative to the client's base URL, query string included.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

fn take_object(map: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match map.remove(key) {
        Some(Value::Object(o)) => o,
        _ => Map::new(),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Split `args` into params, query, fetch options, and body. Without an
/// explicit `params` object, top-level keys named like the route's `:params`
/// are moved out of the body.
pub fn split_args(route: Option<&RouteSpec>, args: Value) -> Result<CallArgs, ClientError> {
    let mut rest = match args {
        Value::Object(o) => o,
        Value::Null => Map::new(),
        other => return Err(ClientError::InvalidRequest(format!("arguments must be an object, got {}", other))),
    };
    let explicit = rest.contains_key("params");
    let mut params = take_object(&mut rest, "params");
    let query = take_object(&mut rest, "query");
    let fetch_options = take_object(&mut rest, "fetchOptions");
    if !explicit {
        for name in route.map(|r| r.params()).unwrap_or_default() {
            if let Some(v) = rest.remove(name) {
                params.insert(name.to_string(), v);
            }
        }
    }
    Ok(CallArgs {
        params,
        query,
        fetch_options,
        body: rest,
    })
}

/// Route method, else `fetchOptions.method`, else POST with a body, else GET.
pub fn infer_method(route: Option<&RouteSpec>, args: &CallArgs) -> Result<Method, ClientError> {
    if let Some(route) = route {
        return Ok(route.method.clone());
    }
    if let Some(m) = args.fetch_options.get("method").and_then(Value::as_str) {
        return Method::from_bytes(m.to_ascii_uppercase().as_bytes())
            .map_err(|_| ClientError::InvalidRequest(format!("unknown method {}", m)));
    }
    Ok(if args.body.is_empty() { Method::GET } else { Method::POST })
}

fn fill_pattern(pattern: &str, params: &Map<String, Value>) -> Result<String, ClientError> {
    let mut out = String::new();
    for segment in pattern.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        match segment.strip_prefix(':') {
            Some(name) => {
                let value = params.get(name).ok_or_else(|| ClientError::MissingParam {
                    route: pattern.to_string(),
                    param: name.to_string(),
                })?;
                out.extend(utf8_percent_encode(&scalar(value), COMPONENT));
            }
            None => out.push_str(segment),
        }
    }
    Ok(if out.is_empty() { "/".into() } else { out })
}

fn query_string(query: &Map<String, Value>) -> String {
    let mut pairs = Vec::new();
    for (key, value) in query {
        let values = match value {
            Value::Null => continue,
            Value::Array(items) => items.iter().map(scalar).collect(),
            other => vec![scalar(other)],
        };
        for v in values {
            pairs.push(format!(
                "{}={}",
                utf8_percent_encode(key, COMPONENT),
                utf8_percent_encode(&v, COMPONENT)
            ));
        }
    }
    pairs.join("&")
}

/// Build the request for `candidate` (the path joined from segments) given the
/// route it resolved to, if any.
pub fn prepare(route: Option<&RouteSpec>, candidate: &str, args: Value) -> Result<PreparedRequest, ClientError> {
    let args = split_args(route, args)?;
    let method = infer_method(route, &args)?;
    let mut path = match route {
        Some(r) => fill_pattern(&r.pattern, &args.params)?,
        None => candidate.to_string(),
    };
    let qs = query_string(&args.query);
    if !qs.is_empty() {
        path.push('?');
        path.push_str(&qs);
    }

    let mut headers = HeaderMap::new();
    if let Some(Value::Object(h)) = args.fetch_options.get("headers") {
        for (name, value) in h {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ClientError::InvalidRequest(format!("invalid header name {}", name)))?;
            let value = HeaderValue::from_str(&scalar(value))
                .map_err(|_| ClientError::InvalidRequest(format!("invalid value for header {}", name)))?;
            headers.insert(name, value);
        }
    }

    let body = (method != Method::GET).then(|| Value::Object(args.body));
    Ok(PreparedRequest {
        method,
        path,
        headers,
        body,
    })
}
