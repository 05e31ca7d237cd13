//! User CRUD.

use crate::db::Where;
use crate::endpoint::{Endpoint, EndpointContext, Reply};
use crate::error::{ApiError, Result};
use crate::handlers::list_query;
use crate::validation::{FieldRule, InputSchema};
use serde_json::{json, Value};

/// Digits with optional leading `+`, spaces, dashes and parentheses.
const PHONE_PATTERN: &str = r"^\+?[0-9][0-9 ()\-]*$";

fn user_fields(email: FieldRule) -> InputSchema {
    InputSchema::new()
        .field("email", email)
        .field("firstName", FieldRule::string().max_length(255))
        .field("lastName", FieldRule::string().max_length(255))
        .field("phone", FieldRule::string().max_length(32).pattern(PHONE_PATTERN))
        .field("emailVerified", FieldRule::boolean())
        .field("properties", FieldRule::object())
}

pub fn endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::post("/user/create", create).body(user_fields(FieldRule::string().required().email())),
        Endpoint::get("/user/get/:id", get),
        Endpoint::put("/user/update/:id", update).body(user_fields(FieldRule::string().email())),
        Endpoint::delete("/user/delete/:id", delete),
        Endpoint::get("/user/list", list).query(list_query().field("email", FieldRule::string())),
    ]
}

async fn create(ctx: EndpointContext) -> Result<Reply> {
    let user = ctx.context.internal.create_user(ctx.body_record()?).await?;
    Ok(Reply::json(Value::Object(user)))
}

async fn get(ctx: EndpointContext) -> Result<Reply> {
    let user = ctx.context.internal.require("user", ctx.param("id")?).await?;
    Ok(Reply::json(Value::Object(user)))
}

async fn update(ctx: EndpointContext) -> Result<Reply> {
    let id = ctx.param("id")?;
    let internal = &ctx.context.internal;
    let mut data = ctx.body_record()?;
    data.remove("id");
    if let Some(email) = data.get("email").and_then(Value::as_str).map(str::to_lowercase) {
        if let Some(other) = internal.find_user_by_email(&email).await? {
            if other.get("id").and_then(Value::as_str) != Some(id) {
                return Err(ApiError::conflict("User with this email already exists").into());
            }
        }
        data.insert("email".into(), email.into());
    }
    let user = internal.update_by_id("user", id, data).await?;
    Ok(Reply::json(Value::Object(user)))
}

async fn delete(ctx: EndpointContext) -> Result<Reply> {
    ctx.context.internal.delete_by_id("user", ctx.param("id")?).await?;
    Ok(Reply::json(json!({ "success": true })))
}

async fn list(ctx: EndpointContext) -> Result<Reply> {
    let mut where_ = Vec::new();
    if let Some(email) = ctx.query_str("email") {
        where_.push(Where::eq("email", email.to_lowercase()));
    }
    let users = ctx
        .context
        .internal
        .list("user", where_, ctx.query_usize("limit"), ctx.query_usize("offset"))
        .await?;
    Ok(Reply::json(Value::Array(users.into_iter().map(Value::Object).collect())))
}
