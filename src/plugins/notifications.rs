//! In-app notifications for users.

use crate::db::Where;
use crate::endpoint::{Endpoint, EndpointContext, Reply};
use crate::error::{ApiError, Result};
use crate::plugin::Plugin;
use crate::schema::{DefaultValue, FieldAttribute, OnDelete, PluginModel, PluginSchema};
use crate::validation::{FieldRule, InputSchema};
use serde_json::{json, Value};

pub const ID: &str = "notifications";
const MODEL: &str = "notification";
const KINDS: [&str; 4] = ["info", "success", "warning", "error"];

pub fn schema() -> PluginSchema {
    let mut schema = PluginSchema::new();
    schema.insert(
        MODEL.into(),
        PluginModel::new()
            .model_name(MODEL)
            .field(
                "userId",
                FieldAttribute::string().required().references("user", "id", OnDelete::Cascade),
            )
            .field("title", FieldAttribute::string().required())
            .field("message", FieldAttribute::string().required())
            .field("type", FieldAttribute::string().default_value("info"))
            .field("read", FieldAttribute::boolean().default_value(false))
            .field("createdAt", FieldAttribute::date().required().default_with(DefaultValue::Now)),
    );
    schema
}

pub fn plugin() -> Plugin {
    Plugin::new(ID)
        .schema(schema())
        .endpoint(
            Endpoint::post("/notification/create", create).body(
                InputSchema::new()
                    .field("userId", FieldRule::string().required())
                    .field("title", FieldRule::string().required().min_length(1).max_length(255))
                    .field("message", FieldRule::string().required())
                    .field("type", FieldRule::string().one_of(KINDS)),
            ),
        )
        .endpoint(
            Endpoint::get("/notification/user/:userId", list_for_user).query(
                InputSchema::new()
                    .field("unreadOnly", FieldRule::boolean())
                    .field("limit", FieldRule::number().range(Some(1.0), Some(100.0))),
            ),
        )
        .endpoint(Endpoint::put("/notification/read/:id", mark_read))
}

async fn create(ctx: EndpointContext) -> Result<Reply> {
    let data = ctx.body_record()?;
    let user_id = data.get("userId").and_then(Value::as_str).unwrap_or_default();
    if ctx.context.internal.find_by_id("user", user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found").into());
    }
    let notification = ctx.context.adapter.create(MODEL, data, None, false).await?;
    Ok(Reply::json(Value::Object(notification)))
}

async fn list_for_user(ctx: EndpointContext) -> Result<Reply> {
    let mut where_ = vec![Where::eq("userId", ctx.param("userId")?)];
    if ctx.query_bool("unreadOnly") {
        where_.push(Where::eq("read", false));
    }
    let notifications = ctx
        .context
        .internal
        .list(MODEL, where_, ctx.query_usize("limit"), None)
        .await?;
    Ok(Reply::json(Value::Array(
        notifications.into_iter().map(Value::Object).collect(),
    )))
}

async fn mark_read(ctx: EndpointContext) -> Result<Reply> {
    let mut data = crate::db::Record::new();
    data.insert("read".into(), json!(true));
    let notification = ctx
        .context
        .internal
        .update_by_id(MODEL, ctx.param("id")?, data)
        .await?;
    Ok(Reply::json(Value::Object(notification)))
}
