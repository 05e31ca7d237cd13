//! Campaign CRUD.

use crate::db::Where;
use crate::endpoint::{Endpoint, EndpointContext, Reply};
use crate::error::{ApiError, Result};
use crate::handlers::list_query;
use crate::validation::{FieldRule, Format, InputSchema};
use serde_json::{json, Value};

const CHANNELS: [&str; 4] = ["email", "sms", "push", "in_app"];
const STATUSES: [&str; 5] = ["draft", "scheduled", "active", "paused", "completed"];

fn campaign_fields(name: FieldRule) -> InputSchema {
    InputSchema::new()
        .field("name", name)
        .field("description", FieldRule::string())
        .field("channel", FieldRule::string().one_of(CHANNELS))
        .field("status", FieldRule::string().one_of(STATUSES))
        .field("content", FieldRule::object())
        .field("scheduledAt", FieldRule::string().format(Format::DateTime))
        .field("createdBy", FieldRule::string())
}

pub fn endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::post("/campaign/create", create).body(campaign_fields(FieldRule::string().required().min_length(1))),
        Endpoint::get("/campaign/get/:id", get),
        Endpoint::put("/campaign/update/:id", update).body(campaign_fields(FieldRule::string().min_length(1))),
        Endpoint::delete("/campaign/delete/:id", delete),
        Endpoint::get("/campaign/list", list).query(
            list_query()
                .field("status", FieldRule::string().one_of(STATUSES))
                .field("channel", FieldRule::string().one_of(CHANNELS)),
        ),
    ]
}

async fn create(ctx: EndpointContext) -> Result<Reply> {
    let data = ctx.body_record()?;
    if let Some(owner) = data.get("createdBy").and_then(Value::as_str) {
        if ctx.context.internal.find_by_id("user", owner).await?.is_none() {
            return Err(ApiError::not_found("User not found").into());
        }
    }
    let campaign = ctx.context.adapter.create("campaign", data, None, false).await?;
    Ok(Reply::json(Value::Object(campaign)))
}

async fn get(ctx: EndpointContext) -> Result<Reply> {
    let campaign = ctx.context.internal.require("campaign", ctx.param("id")?).await?;
    Ok(Reply::json(Value::Object(campaign)))
}

async fn update(ctx: EndpointContext) -> Result<Reply> {
    let mut data = ctx.body_record()?;
    data.remove("id");
    let campaign = ctx
        .context
        .internal
        .update_by_id("campaign", ctx.param("id")?, data)
        .await?;
    Ok(Reply::json(Value::Object(campaign)))
}

async fn delete(ctx: EndpointContext) -> Result<Reply> {
    ctx.context.internal.delete_by_id("campaign", ctx.param("id")?).await?;
    Ok(Reply::json(json!({ "success": true })))
}

async fn list(ctx: EndpointContext) -> Result<Reply> {
    let where_: Vec<Where> = ["status", "channel"]
        .into_iter()
        .filter_map(|f| ctx.query_str(f).map(|v| Where::eq(f, v)))
        .collect();
    let campaigns = ctx
        .context
        .internal
        .list("campaign", where_, ctx.query_usize("limit"), ctx.query_usize("offset"))
        .await?;
    Ok(Reply::json(Value::Array(campaigns.into_iter().map(Value::Object).collect())))
}
