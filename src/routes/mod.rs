//! HTTP surface: one catch-all axum route under the base path, dispatched
//! against the current route table.

mod dispatch;

pub(crate) use dispatch::dispatch;
pub use dispatch::{parse_query, CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS};

use crate::marketing::Marketing;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Largest accepted request body.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

async fn handle(State(marketing): State<Arc<Marketing>>, req: Request<Body>) -> Response {
    match marketing.handler(req).await {
        Ok(res) => res,
        Err(e) => e.into_response(),
    }
}

/// Router serving `{base_path}` and everything below it.
pub fn router(marketing: Arc<Marketing>) -> Router {
    let base = marketing.context().base_path.clone();
    let nested = if base.is_empty() { "/*rest".to_string() } else { format!("{}/*rest", base) };
    let root = if base.is_empty() { "/".to_string() } else { base };
    Router::new()
        .route(&root, any(handle))
        .route(&nested, any(handle))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .with_state(marketing)
}
