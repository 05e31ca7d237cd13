//! Liveness and version.

use crate::endpoint::{EndpointContext, Reply};
use crate::error::Result;
use serde_json::json;

pub async fn ok(_ctx: EndpointContext) -> Result<Reply> {
    Ok(Reply::json(json!({ "ok": true })))
}

pub async fn version(ctx: EndpointContext) -> Result<Reply> {
    Ok(Reply::json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "app": ctx.context.app_name,
    })))
}
