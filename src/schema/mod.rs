//! Declarative model definitions: field attributes, codecs, and schema merge.

mod builtin;
mod field;
mod model;

pub use builtin::{campaign_model, core_schema, user_model};
pub use field::{
    format_date, parse_date, DefaultValue, FieldAttribute, FieldCodec, FieldReference, FieldTransform,
    FieldType, OnDelete, StoreCapabilities,
};
pub use model::{ModelSchema, PluginModel, PluginSchema, Schema};
