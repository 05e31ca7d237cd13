//! Built-in tables every instance carries.

use crate::schema::{DefaultValue, FieldAttribute, ModelSchema, OnDelete, Schema};

pub fn user_model() -> ModelSchema {
    ModelSchema::new("user")
        .field("email", FieldAttribute::string().required().unique())
        .field("firstName", FieldAttribute::string())
        .field("lastName", FieldAttribute::string())
        .field("phone", FieldAttribute::string())
        .field("emailVerified", FieldAttribute::boolean().default_value(false))
        .field("properties", FieldAttribute::json())
        .field("createdAt", FieldAttribute::date().required().default_with(DefaultValue::Now))
        .field(
            "updatedAt",
            FieldAttribute::date()
                .required()
                .default_with(DefaultValue::Now)
                .on_update(DefaultValue::Now),
        )
        .order(1)
}

pub fn campaign_model() -> ModelSchema {
    ModelSchema::new("campaign")
        .field("name", FieldAttribute::string().required())
        .field("description", FieldAttribute::string())
        .field("channel", FieldAttribute::string().default_value("email"))
        .field("status", FieldAttribute::string().default_value("draft"))
        .field("content", FieldAttribute::json())
        .field("scheduledAt", FieldAttribute::date())
        .field(
            "createdBy",
            FieldAttribute::string().references("user", "id", OnDelete::SetNull),
        )
        .field("createdAt", FieldAttribute::date().required().default_with(DefaultValue::Now))
        .field(
            "updatedAt",
            FieldAttribute::date()
                .required()
                .default_with(DefaultValue::Now)
                .on_update(DefaultValue::Now),
        )
        .order(2)
}

pub fn core_schema() -> Schema {
    Schema::new()
        .model("user", user_model())
        .model("campaign", campaign_model())
}
