//! Schema-aware wrapper over a concrete [`Store`]: name resolution, defaults,
//! id generation, and value transforms in both directions.

use crate::case::{pluralize, singularize};
use crate::db::{FindMany, Record, SortBy, Store, Where};
use crate::error::AdapterError;
use crate::schema::{ModelSchema, Schema, StoreCapabilities};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

const DEFAULT_FIND_MANY_LIMIT: usize = 50;

/// How new record ids are produced.
#[derive(Clone, Default)]
pub enum IdGeneration {
    #[default]
    Uuid,
    /// Let the store assign ids.
    Disabled,
    Custom(Arc<dyn Fn(&str) -> String + Send + Sync>),
}

impl fmt::Debug for IdGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdGeneration::Uuid => f.write_str("Uuid"),
            IdGeneration::Disabled => f.write_str("Disabled"),
            IdGeneration::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AdapterConfig {
    /// Table names are the plural of the model name, and plural names resolve back.
    pub use_plural: bool,
    /// Store ids are integers assigned by the store; ids are strings at the API.
    pub use_number_id: bool,
    pub id_generation: IdGeneration,
}

#[derive(Clone, Debug, Default)]
pub struct FindManyArgs {
    pub where_: Vec<Where>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort_by: Option<SortBy>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Action {
    Create,
    Update,
}

#[derive(Clone)]
pub struct Adapter {
    store: Arc<dyn Store>,
    schema: Arc<Schema>,
    config: AdapterConfig,
    caps: StoreCapabilities,
}

impl Adapter {
    pub fn new(store: Arc<dyn Store>, schema: Arc<Schema>, config: AdapterConfig) -> Self {
        let caps = store.capabilities();
        Adapter {
            store,
            schema,
            config,
            caps,
        }
    }

    pub fn id(&self) -> &'static str {
        self.store.id()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Resolve a caller-given model name to its schema key: direct key, then
    /// table name, then (with plural matching) the singular form.
    pub fn default_model_name(&self, model: &str) -> Result<String, AdapterError> {
        if let Some(key) = self.lookup_model(model) {
            return Ok(key);
        }
        if self.config.use_plural {
            if let Some(key) = self.lookup_model(&singularize(model)) {
                return Ok(key);
            }
        }
        Err(AdapterError::ModelNotFound(model.to_string()))
    }

    fn lookup_model(&self, model: &str) -> Option<String> {
        if self.schema.models.contains_key(model) {
            return Some(model.to_string());
        }
        self.schema
            .models
            .iter()
            .find(|(_, m)| m.model_name == model)
            .map(|(k, _)| k.clone())
    }

    /// Resolve a caller-given field name to its logical key within `model`.
    pub fn default_field_name(&self, model: &str, field: &str) -> Result<String, AdapterError> {
        if field == "id" {
            return Ok("id".into());
        }
        let key = self.default_model_name(model)?;
        let schema = self.model_schema(&key)?;
        if schema.fields.contains_key(field) {
            return Ok(field.to_string());
        }
        schema
            .fields
            .iter()
            .find(|(_, attr)| attr.field_name.as_deref() == Some(field))
            .map(|(k, _)| k.clone())
            .ok_or_else(|| AdapterError::FieldNotFound {
                model: model.to_string(),
                field: field.to_string(),
            })
    }

    /// Physical table name for a schema key.
    pub fn model_name(&self, key: &str) -> Result<String, AdapterError> {
        let schema = self.model_schema(key)?;
        Ok(if self.config.use_plural {
            pluralize(&schema.model_name)
        } else {
            schema.model_name.clone()
        })
    }

    /// Physical column name for a caller-given field.
    pub fn field_name(&self, model: &str, field: &str) -> Result<String, AdapterError> {
        let key = self.default_model_name(model)?;
        let field_key = self.default_field_name(&key, field)?;
        if field_key == "id" {
            return Ok(field_key);
        }
        let schema = self.model_schema(&key)?;
        Ok(schema.fields[&field_key].column(&field_key).to_string())
    }

    fn model_schema(&self, key: &str) -> Result<&ModelSchema, AdapterError> {
        self.schema
            .get(key)
            .ok_or_else(|| AdapterError::ModelNotFound(key.to_string()))
    }

    fn generate_id(&self, model: &str) -> Option<Value> {
        if self.config.use_number_id {
            return None;
        }
        match &self.config.id_generation {
            IdGeneration::Uuid => Some(Value::String(uuid::Uuid::new_v4().to_string())),
            IdGeneration::Disabled => None,
            IdGeneration::Custom(f) => Some(Value::String(f(model))),
        }
    }

    fn coerce_id(&self, value: Value) -> Value {
        if !self.config.use_number_id {
            return value;
        }
        match value {
            Value::String(s) => s.parse::<i64>().map(Value::from).unwrap_or(Value::String(s)),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.coerce_id(v)).collect()),
            other => other,
        }
    }

    fn transform_input(&self, key: &str, data: &Record, action: Action) -> Result<Record, AdapterError> {
        let schema = self.model_schema(key)?;
        let mut out = Record::new();
        for (field, attr) in &schema.fields {
            let value = match data.get(field) {
                Some(v) => Some(v.clone()),
                None => match action {
                    Action::Create => attr.default_value.as_ref().map(|d| d.resolve()),
                    Action::Update => attr.on_update.as_ref().map(|d| d.resolve()),
                },
            };
            if let Some(value) = value {
                let stored = attr.encode(field, value, &self.caps)?;
                out.insert(attr.column(field).to_string(), stored);
            }
        }
        Ok(out)
    }

    fn transform_output(&self, key: &str, row: Record, select: Option<&[String]>) -> Result<Record, AdapterError> {
        let schema = self.model_schema(key)?;
        let mut out = Record::new();
        let wanted = |field: &str| select.map(|s| s.iter().any(|f| f == field)).unwrap_or(true);
        if let Some(id) = row.get("id") {
            if wanted("id") {
                let id = match id {
                    Value::Number(n) => Value::String(n.to_string()),
                    other => other.clone(),
                };
                out.insert("id".into(), id);
            }
        }
        for (field, attr) in &schema.fields {
            if !attr.returned || !wanted(field) {
                continue;
            }
            if let Some(v) = row.get(attr.column(field)) {
                out.insert(field.clone(), attr.decode(v.clone()));
            }
        }
        Ok(out)
    }

    fn transform_where(&self, key: &str, where_: &[Where]) -> Result<Vec<Where>, AdapterError> {
        let schema = self.model_schema(key)?;
        where_
            .iter()
            .map(|w| {
                let field_key = self.default_field_name(key, &w.field)?;
                if field_key == "id" {
                    return Ok(Where {
                        field: "id".into(),
                        value: self.coerce_id(w.value.clone()),
                        ..w.clone()
                    });
                }
                let attr = &schema.fields[&field_key];
                let value = match &w.value {
                    Value::Array(items) => Value::Array(
                        items
                            .iter()
                            .map(|v| attr.encode(&field_key, v.clone(), &self.caps))
                            .collect::<Result<_, _>>()?,
                    ),
                    v => attr.encode(&field_key, v.clone(), &self.caps)?,
                };
                Ok(Where {
                    field: attr.column(&field_key).to_string(),
                    value,
                    ..w.clone()
                })
            })
            .collect()
    }

    fn select_columns(&self, key: &str, select: Option<&[String]>) -> Result<Option<Vec<String>>, AdapterError> {
        let Some(select) = select else { return Ok(None) };
        let mut cols = vec!["id".to_string()];
        for f in select {
            let col = self.field_name(key, f)?;
            if !cols.contains(&col) {
                cols.push(col);
            }
        }
        Ok(Some(cols))
    }

    /// Insert a record. A caller-supplied `id` is dropped (with a warning) unless
    /// `force_allow_id` is set.
    pub async fn create(
        &self,
        model: &str,
        data: Record,
        select: Option<&[String]>,
        force_allow_id: bool,
    ) -> Result<Record, AdapterError> {
        let key = self.default_model_name(model)?;
        let supplied_id = data.get("id").cloned();
        if supplied_id.is_some() && !force_allow_id {
            tracing::warn!(model = %key, "creating a record with a caller-supplied id is not allowed, generating a new one");
        }
        let mut row = self.transform_input(&key, &data, Action::Create)?;
        let id = match supplied_id {
            Some(id) if force_allow_id => Some(self.coerce_id(id)),
            _ => self.generate_id(&key),
        };
        if let Some(id) = id {
            row.insert("id".into(), id);
        }
        let table = self.model_name(&key)?;
        tracing::debug!(model = %table, store = self.store.id(), "create");
        let created = self.store.create(&table, row).await?;
        self.transform_output(&key, created, select)
    }

    pub async fn find_one(
        &self,
        model: &str,
        where_: &[Where],
        select: Option<&[String]>,
    ) -> Result<Option<Record>, AdapterError> {
        let key = self.default_model_name(model)?;
        let where_ = self.transform_where(&key, where_)?;
        let cols = self.select_columns(&key, select)?;
        let table = self.model_name(&key)?;
        tracing::debug!(model = %table, store = self.store.id(), "find_one");
        match self.store.find_one(&table, &where_, cols.as_deref()).await? {
            Some(row) => Ok(Some(self.transform_output(&key, row, select)?)),
            None => Ok(None),
        }
    }

    /// List records. `limit` defaults to 50.
    pub async fn find_many(&self, model: &str, args: FindManyArgs) -> Result<Vec<Record>, AdapterError> {
        let key = self.default_model_name(model)?;
        let sort_by = match args.sort_by {
            Some(s) => Some(SortBy {
                field: self.field_name(&key, &s.field)?,
                direction: s.direction,
            }),
            None => None,
        };
        let query = FindMany {
            where_: self.transform_where(&key, &args.where_)?,
            limit: Some(args.limit.unwrap_or(DEFAULT_FIND_MANY_LIMIT)),
            offset: args.offset,
            sort_by,
            select: None,
        };
        let table = self.model_name(&key)?;
        tracing::debug!(model = %table, store = self.store.id(), "find_many");
        let rows = self.store.find_many(&table, &query).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let record = self.transform_output(&key, row, None)?;
            if !record.is_empty() {
                out.push(record);
            }
        }
        Ok(out)
    }

    pub async fn count(&self, model: &str, where_: &[Where]) -> Result<u64, AdapterError> {
        let key = self.default_model_name(model)?;
        let where_ = self.transform_where(&key, where_)?;
        let table = self.model_name(&key)?;
        self.store.count(&table, &where_).await
    }

    /// Update every matching record and return the first one. `None` when nothing matched.
    pub async fn update(&self, model: &str, where_: &[Where], data: Record) -> Result<Option<Record>, AdapterError> {
        let key = self.default_model_name(model)?;
        let where_ = self.transform_where(&key, where_)?;
        let row = self.transform_input(&key, &data, Action::Update)?;
        let table = self.model_name(&key)?;
        tracing::debug!(model = %table, store = self.store.id(), "update");
        match self.store.update(&table, &where_, row).await? {
            Some(updated) => Ok(Some(self.transform_output(&key, updated, None)?)),
            None => Ok(None),
        }
    }

    /// Update every matching record, returning how many changed.
    pub async fn update_many(&self, model: &str, where_: &[Where], data: Record) -> Result<u64, AdapterError> {
        let key = self.default_model_name(model)?;
        let where_ = self.transform_where(&key, where_)?;
        let row = self.transform_input(&key, &data, Action::Update)?;
        let table = self.model_name(&key)?;
        tracing::debug!(model = %table, store = self.store.id(), "update_many");
        self.store.update_many(&table, &where_, row).await
    }

    pub async fn delete(&self, model: &str, where_: &[Where]) -> Result<(), AdapterError> {
        let key = self.default_model_name(model)?;
        let where_ = self.transform_where(&key, where_)?;
        let table = self.model_name(&key)?;
        tracing::debug!(model = %table, store = self.store.id(), "delete");
        self.store.delete(&table, &where_).await
    }

    pub async fn delete_many(&self, model: &str, where_: &[Where]) -> Result<u64, AdapterError> {
        let key = self.default_model_name(model)?;
        let where_ = self.transform_where(&key, where_)?;
        let table = self.model_name(&key)?;
        tracing::debug!(model = %table, store = self.store.id(), "delete_many");
        self.store.delete_many(&table, &where_).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::schema::{core_schema, FieldAttribute, ModelSchema};
    use async_trait::async_trait;
    use serde_json::json;

    /// A store without native json, date or boolean columns.
    struct TextOnly(Arc<MemoryStore>);

    #[async_trait]
    impl Store for TextOnly {
        fn id(&self) -> &'static str {
            "text-only"
        }

        fn capabilities(&self) -> StoreCapabilities {
            StoreCapabilities {
                supports_json: false,
                supports_dates: false,
                supports_booleans: false,
            }
        }

        async fn create(&self, model: &str, data: Record) -> Result<Record, AdapterError> {
            self.0.create(model, data).await
        }

        async fn find_one(
            &self,
            model: &str,
            where_: &[Where],
            select: Option<&[String]>,
        ) -> Result<Option<Record>, AdapterError> {
            self.0.find_one(model, where_, select).await
        }

        async fn find_many(&self, model: &str, query: &FindMany) -> Result<Vec<Record>, AdapterError> {
            self.0.find_many(model, query).await
        }

        async fn count(&self, model: &str, where_: &[Where]) -> Result<u64, AdapterError> {
            self.0.count(model, where_).await
        }

        async fn update(&self, model: &str, where_: &[Where], update: Record) -> Result<Option<Record>, AdapterError> {
            self.0.update(model, where_, update).await
        }

        async fn update_many(&self, model: &str, where_: &[Where], update: Record) -> Result<u64, AdapterError> {
            self.0.update_many(model, where_, update).await
        }

        async fn delete(&self, model: &str, where_: &[Where]) -> Result<(), AdapterError> {
            self.0.delete(model, where_).await
        }

        async fn delete_many(&self, model: &str, where_: &[Where]) -> Result<u64, AdapterError> {
            self.0.delete_many(model, where_).await
        }
    }

    fn record(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    fn adapter(config: AdapterConfig) -> Adapter {
        let schema = core_schema().model(
            "session",
            ModelSchema::new("session").field("token", FieldAttribute::string().field_name("session_token")),
        );
        Adapter::new(Arc::new(MemoryStore::new()), Arc::new(schema), config)
    }

    #[tokio::test]
    async fn create_then_find_round_trips() {
        let a = adapter(AdapterConfig::default());
        let created = a
            .create("user", record(json!({"email": "a@b.co", "firstName": "Ada"})), None, false)
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_string();
        assert!(!id.is_empty());
        assert_eq!(created["emailVerified"], json!(false));
        let found = a.find_one("user", &[Where::eq("id", id)], None).await.unwrap().unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn caller_id_is_replaced_unless_forced() {
        let a = adapter(AdapterConfig::default());
        let created = a
            .create("user", record(json!({"id": "mine", "email": "x@y.z"})), None, false)
            .await
            .unwrap();
        assert_ne!(created["id"], json!("mine"));
        let forced = a
            .create("user", record(json!({"id": "mine", "email": "q@y.z"})), None, true)
            .await
            .unwrap();
        assert_eq!(forced["id"], json!("mine"));
    }

    #[tokio::test]
    async fn numeric_ids_are_strings_at_the_api() {
        let a = adapter(AdapterConfig {
            use_number_id: true,
            ..Default::default()
        });
        let created = a.create("user", record(json!({"email": "n@b.co"})), None, false).await.unwrap();
        assert_eq!(created["id"], json!("1"));
        let found = a.find_one("user", &[Where::eq("id", "1")], None).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn custom_field_names_resolve_both_ways() {
        let a = adapter(AdapterConfig::default());
        a.create("session", record(json!({"token": "t1"})), None, false).await.unwrap();
        let by_logical = a.find_one("session", &[Where::eq("token", "t1")], None).await.unwrap();
        let by_physical = a.find_one("session", &[Where::eq("session_token", "t1")], None).await.unwrap();
        assert_eq!(by_logical, by_physical);
        assert_eq!(by_logical.unwrap()["token"], json!("t1"));
    }

    #[tokio::test]
    async fn plural_names_resolve_when_enabled() {
        let a = adapter(AdapterConfig {
            use_plural: true,
            ..Default::default()
        });
        assert_eq!(a.default_model_name("users").unwrap(), "user");
        assert_eq!(a.model_name("user").unwrap(), "users");
        let strict = adapter(AdapterConfig::default());
        assert!(matches!(strict.default_model_name("users"), Err(AdapterError::ModelNotFound(_))));
    }

    #[tokio::test]
    async fn unknown_field_is_an_error() {
        let a = adapter(AdapterConfig::default());
        let err = a.find_one("user", &[Where::eq("nope", 1)], None).await.unwrap_err();
        assert!(matches!(err, AdapterError::FieldNotFound { .. }));
    }

    #[tokio::test]
    async fn update_missing_returns_none_and_zero() {
        let a = adapter(AdapterConfig::default());
        let none = a
            .update("user", &[Where::eq("id", "missing")], record(json!({"firstName": "x"})))
            .await
            .unwrap();
        assert!(none.is_none());
        let zero = a
            .update_many("user", &[Where::eq("id", "missing")], record(json!({"firstName": "x"})))
            .await
            .unwrap();
        assert_eq!(zero, 0);
    }

    #[tokio::test]
    async fn update_preserves_fields_and_refreshes_timestamp() {
        let a = adapter(AdapterConfig::default());
        let created = a
            .create(
                "user",
                record(json!({"email": "u@b.co", "lastName": "Lovelace", "updatedAt": "2000-01-01T00:00:00.000Z"})),
                None,
                false,
            )
            .await
            .unwrap();
        let id = created["id"].clone();
        let updated = a
            .update("user", &[Where::eq("id", id)], record(json!({"firstName": "Ada"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["lastName"], json!("Lovelace"));
        assert_eq!(updated["firstName"], json!("Ada"));
        assert_eq!(updated["createdAt"], created["createdAt"]);
        assert_ne!(updated["updatedAt"], json!("2000-01-01T00:00:00.000Z"));
    }

    #[tokio::test]
    async fn find_many_defaults_to_fifty() {
        let a = adapter(AdapterConfig::default());
        for i in 0..60 {
            a.create("user", record(json!({"email": format!("{}@b.co", i)})), None, false)
                .await
                .unwrap();
        }
        let page = a.find_many("user", FindManyArgs::default()).await.unwrap();
        assert_eq!(page.len(), 50);
        assert_eq!(a.count("user", &[]).await.unwrap(), 60);
    }

    #[tokio::test]
    async fn hidden_fields_are_not_returned() {
        let schema = Schema::new().model(
            "account",
            ModelSchema::new("account")
                .field("login", FieldAttribute::string())
                .field("password", FieldAttribute::string().hidden()),
        );
        let a = Adapter::new(Arc::new(MemoryStore::new()), Arc::new(schema), AdapterConfig::default());
        let created = a
            .create("account", record(json!({"login": "l", "password": "p"})), None, false)
            .await
            .unwrap();
        assert!(created.get("password").is_none());
    }

    #[tokio::test]
    async fn limited_stores_get_encoded_values() {
        let inner = Arc::new(MemoryStore::new());
        let schema = Schema::new().model(
            "event",
            ModelSchema::new("event")
                .field("flag", FieldAttribute::boolean())
                .field("at", FieldAttribute::date())
                .field("payload", FieldAttribute::json()),
        );
        let a = Adapter::new(Arc::new(TextOnly(inner.clone())), Arc::new(schema), AdapterConfig::default());
        let input = json!({"flag": true, "at": "2024-01-02T03:04:05.000Z", "payload": {"a": [1, 2]}});
        let created = a.create("event", record(input.clone()), None, false).await.unwrap();

        let raw = inner.find_one("event", &[], None).await.unwrap().unwrap();
        assert_eq!(raw["flag"], json!(1));
        assert_eq!(raw["at"], json!(1704164645000i64));
        assert_eq!(raw["payload"], json!(r#"{"a":[1,2]}"#));

        for key in ["flag", "at", "payload"] {
            assert_eq!(created[key], input[key], "{}", key);
        }
        let found = a.find_one("event", &[Where::eq("flag", true)], None).await.unwrap();
        assert_eq!(found.unwrap()["payload"], input["payload"]);
    }
}
