use crate::endpoint::{run_endpoint, CallOptions, EndpointContext, EndpointOutput};
use crate::error::{ApiError, MarketingError, Result};
use crate::marketing::Marketing;
use crate::plugin::{RequestInfo, RouteMatch, RouteTable};
use crate::rate_limit::client_key;
use crate::response::{append_headers, empty_response, json_response};
use crate::routes::MAX_BODY_SIZE;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

pub const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Path below `base`, or `None` when the request is outside it. Trailing
/// slashes are ignored.
fn relative_path(base: &str, path: &str) -> Option<String> {
    let rest = path.strip_prefix(base)?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }
    let trimmed = rest.trim_end_matches('/');
    Some(if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() })
}

fn decode(s: &str) -> String {
    let spaced = s.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Parse a raw query string. Repeated keys collect into an array.
pub fn parse_query(raw: Option<&str>) -> Map<String, Value> {
    let mut out = Map::new();
    for pair in raw.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(k);
        let value = Value::String(decode(v));
        match out.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                out.insert(key, value);
            }
        }
    }
    out
}

async fn read_body(body: Body) -> Result<Value> {
    let bytes = to_bytes(body, MAX_BODY_SIZE)
        .await
        .map_err(|_| ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", "Request body too large"))?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)).into())
}

fn cors_headers(marketing: &Marketing, request: &HeaderMap, preflight: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let Some(origin) = request.get(header::ORIGIN) else {
        return headers;
    };
    let trusted = origin
        .to_str()
        .map(|o| marketing.context().is_trusted_origin(o))
        .unwrap_or(false);
    if trusted {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
    }
    if trusted || preflight {
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(CORS_ALLOW_METHODS));
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(CORS_ALLOW_HEADERS));
    }
    headers
}

/// How a request left `process`. An intercepted response is sent as is.
enum Dispatched {
    Intercepted(Response),
    Handled(Response),
}

/// Everything between request interception and the endpoint result.
async fn process(marketing: &Marketing, table: &RouteTable, info: &RequestInfo, body: Body) -> Result<Dispatched> {
    for (id, on_request) in table.on_request() {
        if let Some(res) = on_request(info.clone()).await? {
            tracing::debug!(plugin = %id, path = %info.path, "request answered by plugin");
            return Ok(Dispatched::Intercepted(res));
        }
    }

    if let Some(limiter) = &marketing.rate_limiter {
        limiter.check(&client_key(&info.headers), &info.path)?;
    }

    let (endpoint, params) = match table.find(&info.method, &info.path) {
        RouteMatch::Found(endpoint, params) => (endpoint, params),
        RouteMatch::MethodNotAllowed => {
            return Err(ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED", "Method not allowed").into())
        }
        RouteMatch::NotFound => return Err(ApiError::not_found(format!("No endpoint for {}", info.path)).into()),
    };

    let mut ctx = EndpointContext::new(marketing.context(), info.method.clone(), &endpoint.path, &info.path);
    ctx.params = params;
    ctx.query = parse_query(info.uri.query());
    ctx.headers = info.headers.clone();
    ctx.body = if info.method == Method::GET { Value::Null } else { read_body(body).await? };

    let opts = CallOptions {
        return_headers: true,
        ..Default::default()
    };
    Ok(Dispatched::Handled(match run_endpoint(&endpoint, ctx, table.hooks(), opts).await? {
        EndpointOutput::Response(res) => res,
        EndpointOutput::WithHeaders {
            status,
            headers,
            response,
        } => json_response(status, &headers, &response),
        EndpointOutput::Value(v) => json_response(StatusCode::OK, &HeaderMap::new(), &v),
    }))
}

/// Redirect markers become a 302. Anything else is logged, handed to the
/// configured callback, then either returned to the caller or answered.
fn on_error(marketing: &Marketing, err: MarketingError, path: &str) -> Result<Response> {
    if let Some(api) = err.as_api().filter(|e| e.is_redirect()) {
        let mut res = empty_response(StatusCode::FOUND);
        append_headers(res.headers_mut(), &api.headers);
        return Ok(res);
    }
    let options = &marketing.on_api_error;
    if !options.disable_logging && !marketing.context().logger_disabled {
        match err.as_api() {
            Some(api) if api.status.is_client_error() => {
                tracing::warn!(path = %path, status = %api.status, code = %api.code, "{}", api.message)
            }
            _ => tracing::error!(path = %path, error = %err, "request failed"),
        }
    }
    if let Some(callback) = &options.on_error {
        callback(&err);
    }
    if options.throw {
        return Err(err);
    }
    Ok(err.into_response())
}

pub(crate) async fn dispatch(marketing: &Marketing, req: Request<Body>) -> Result<Response> {
    let context = marketing.context();
    let (parts, body) = req.into_parts();
    let Some(path) = relative_path(&context.base_path, parts.uri.path()) else {
        return Ok(ApiError::not_found(format!("No endpoint for {}", parts.uri.path())).into_response());
    };

    if parts.method == Method::OPTIONS {
        let mut res = empty_response(StatusCode::OK);
        append_headers(res.headers_mut(), &cors_headers(marketing, &parts.headers, true));
        return Ok(res);
    }

    if marketing.disabled_paths.iter().any(|p| p.trim_end_matches('/') == path) {
        let mut res = ApiError::not_found(format!("No endpoint for {}", path)).into_response();
        append_headers(res.headers_mut(), &cors_headers(marketing, &parts.headers, false));
        return Ok(res);
    }

    let info = RequestInfo {
        method: parts.method.clone(),
        uri: parts.uri.clone(),
        path,
        headers: parts.headers.clone(),
    };
    let table = marketing.snapshot();
    let mut res = match process(marketing, &table, &info, body).await {
        Ok(Dispatched::Intercepted(res)) => return Ok(res),
        Ok(Dispatched::Handled(res)) => res,
        Err(e) => on_error(marketing, e, &info.path)?,
    };
    for (_, on_response) in table.on_response() {
        res = match on_response(info.clone(), res).await {
            Ok(res) => res,
            Err(e) => on_error(marketing, e, &info.path)?,
        };
    }
    append_headers(res.headers_mut(), &cors_headers(marketing, &parts.headers, false));
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_base_path_and_trailing_slash() {
        assert_eq!(relative_path("/api/marketing", "/api/marketing/user/list/").as_deref(), Some("/user/list"));
        assert_eq!(relative_path("/api/marketing", "/api/marketing").as_deref(), Some("/"));
        assert_eq!(relative_path("/api/marketing", "/api/marketingx/ok"), None);
        assert_eq!(relative_path("", "/ok").as_deref(), Some("/ok"));
    }

    #[test]
    fn query_decodes_and_collects_repeats() {
        let q = parse_query(Some("email=a%40b.com&name=Jane+Doe&tag=x&tag=y&flag"));
        assert_eq!(q["email"], "a@b.com");
        assert_eq!(q["name"], "Jane Doe");
        assert_eq!(q["tag"], serde_json::json!(["x", "y"]));
        assert_eq!(q["flag"], "");
    }
}
