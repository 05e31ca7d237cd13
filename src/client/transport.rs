//! Where prepared client requests go: over HTTP, or into an in-process router.

use crate::client::proxy::PreparedRequest;
use crate::error::ClientError;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

#[derive(Debug)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: PreparedRequest) -> Result<TransportResponse, ClientError>;
}

/// Sends requests to `base_url` (scheme, host, and base path).
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        HttpTransport {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: PreparedRequest) -> Result<TransportResponse, ClientError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method, &url).headers(request.headers);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let res = builder.send().await?;
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = res.bytes().await?;
        Ok(TransportResponse {
            status,
            headers,
            body: parse_body(&bytes),
        })
    }
}

/// Drives an axum [`Router`] directly, without a socket.
#[derive(Clone)]
pub struct RouterTransport {
    router: Router,
    base_path: String,
}

impl RouterTransport {
    pub fn new(router: Router, base_path: &str) -> Self {
        RouterTransport {
            router,
            base_path: base_path.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Transport for RouterTransport {
    async fn send(&self, request: PreparedRequest) -> Result<TransportResponse, ClientError> {
        let uri = format!("{}{}", self.base_path, request.path);
        let mut builder = Request::builder().method(request.method).uri(uri);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        let body = match &request.body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                Body::from(serde_json::to_vec(v).map_err(|e| ClientError::InvalidRequest(e.to_string()))?)
            }
            None => Body::empty(),
        };
        let req = builder
            .body(body)
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let res = self
            .router
            .clone()
            .oneshot(req)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = to_bytes(res.into_body(), usize::MAX)
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(TransportResponse {
            status,
            headers,
            body: parse_body(&bytes),
        })
    }
}
