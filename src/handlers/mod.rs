//! Built-in endpoints mounted on every instance.

pub mod campaign;
pub mod common;
pub mod user;

use crate::endpoint::Endpoint;

pub fn base_endpoints() -> Vec<Endpoint> {
    let mut endpoints = vec![
        Endpoint::get("/ok", common::ok),
        Endpoint::get("/version", common::version),
    ];
    endpoints.extend(user::endpoints());
    endpoints.extend(campaign::endpoints());
    endpoints
}

/// `limit` / `offset` query parameters shared by list endpoints.
pub(crate) fn list_query() -> crate::validation::InputSchema {
    use crate::validation::{FieldRule, InputSchema};
    InputSchema::new()
        .field("limit", FieldRule::number().range(Some(1.0), Some(100.0)))
        .field("offset", FieldRule::number().range(Some(0.0), None))
}
