//! Model schemas and the plugin schema fold.

use crate::schema::FieldAttribute;
use indexmap::IndexMap;

/// One storage table: logical field keys mapped to attributes. `id` is implicit.
#[derive(Clone, Debug)]
pub struct ModelSchema {
    /// Physical table name.
    pub model_name: String,
    pub fields: IndexMap<String, FieldAttribute>,
    /// Creation order for migrations; referenced tables come first.
    pub order: u32,
}

impl ModelSchema {
    pub fn new(model_name: &str) -> Self {
        ModelSchema {
            model_name: model_name.to_string(),
            fields: IndexMap::new(),
            order: u32::MAX,
        }
    }

    pub fn field(mut self, key: &str, attr: FieldAttribute) -> Self {
        self.fields.insert(key.to_string(), attr);
        self
    }

    pub fn order(mut self, order: u32) -> Self {
        self.order = order;
        self
    }
}

/// A plugin's contribution for one model: new fields and an optional table name.
#[derive(Clone, Debug, Default)]
pub struct PluginModel {
    pub model_name: Option<String>,
    pub fields: IndexMap<String, FieldAttribute>,
}

impl PluginModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model_name(mut self, name: &str) -> Self {
        self.model_name = Some(name.to_string());
        self
    }

    pub fn field(mut self, key: &str, attr: FieldAttribute) -> Self {
        self.fields.insert(key.to_string(), attr);
        self
    }
}

pub type PluginSchema = IndexMap<String, PluginModel>;

/// All models keyed by their logical table key.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    pub models: IndexMap<String, ModelSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, key: &str, model: ModelSchema) -> Self {
        self.models.insert(key.to_string(), model);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ModelSchema> {
        self.models.get(key)
    }

    /// Fold plugin schemas into this one in registration order.
    ///
    /// Fields are shallow-merged per model with later plugins winning on key
    /// collision. A model's table name comes from the base schema if it exists,
    /// else from the first plugin that names it, else the table key.
    pub fn merge_plugins<'a, I>(mut self, plugin_schemas: I) -> Self
    where
        I: IntoIterator<Item = &'a PluginSchema>,
    {
        let mut named_by_plugin: IndexMap<String, bool> = IndexMap::new();
        for schema in plugin_schemas {
            for (key, contribution) in schema {
                let entry = self.models.entry(key.clone()).or_insert_with(|| {
                    named_by_plugin.insert(key.clone(), false);
                    ModelSchema::new(key)
                });
                if let Some(name) = &contribution.model_name {
                    if named_by_plugin.get(key) == Some(&false) {
                        entry.model_name = name.clone();
                        named_by_plugin.insert(key.clone(), true);
                    }
                }
                for (field, attr) in &contribution.fields {
                    entry.fields.insert(field.clone(), attr.clone());
                }
            }
        }
        self
    }

    /// Models sorted by `order`, stable on ties.
    pub fn ordered(&self) -> Vec<(&String, &ModelSchema)> {
        let mut out: Vec<_> = self.models.iter().collect();
        out.sort_by_key(|(_, m)| m.order);
        out
    }
}
