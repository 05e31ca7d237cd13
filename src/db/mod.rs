//! Storage seam: the minimal store contract, where-clauses, and the schema-aware adapter.

mod adapter;
mod memory;
mod postgres;

pub use adapter::{Adapter, AdapterConfig, FindManyArgs, IdGeneration};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::error::AdapterError;
use crate::schema::StoreCapabilities;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row as the store sees it: physical column name -> value.
pub type Record = Map<String, Value>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    #[serde(alias = "nin")]
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Connector {
    #[default]
    And,
    Or,
}

/// A single filter condition. A query is an ordered list of these: every
/// `And` entry must hold, and when any `Or` entries exist at least one must hold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Where {
    pub field: String,
    #[serde(default)]
    pub operator: Operator,
    pub value: Value,
    #[serde(default)]
    pub connector: Connector,
}

impl Where {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Where {
            field: field.to_string(),
            operator: Operator::Eq,
            value: value.into(),
            connector: Connector::And,
        }
    }

    pub fn op(field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        Where {
            operator,
            ..Where::eq(field, value)
        }
    }

    pub fn or(mut self) -> Self {
        self.connector = Connector::Or;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortBy {
    pub field: String,
    pub direction: SortDirection,
}

/// Arguments for [`Store::find_many`] with physical names already resolved.
#[derive(Clone, Debug, Default)]
pub struct FindMany {
    pub where_: Vec<Where>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub sort_by: Option<SortBy>,
    pub select: Option<Vec<String>>,
}

/// The contract a concrete backend satisfies. Model and field names are physical;
/// the [`Adapter`] does name resolution and value transforms around it.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name, e.g. "memory" or "postgres".
    fn id(&self) -> &'static str;

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::default()
    }

    /// Insert a row. When `data` has no `id` the store assigns one.
    async fn create(&self, model: &str, data: Record) -> Result<Record, AdapterError>;

    async fn find_one(
        &self,
        model: &str,
        where_: &[Where],
        select: Option<&[String]>,
    ) -> Result<Option<Record>, AdapterError>;

    async fn find_many(&self, model: &str, query: &FindMany) -> Result<Vec<Record>, AdapterError>;

    async fn count(&self, model: &str, where_: &[Where]) -> Result<u64, AdapterError>;

    /// Update matching rows, returning the first updated row.
    async fn update(&self, model: &str, where_: &[Where], update: Record) -> Result<Option<Record>, AdapterError>;

    async fn update_many(&self, model: &str, where_: &[Where], update: Record) -> Result<u64, AdapterError>;

    async fn delete(&self, model: &str, where_: &[Where]) -> Result<(), AdapterError>;

    async fn delete_many(&self, model: &str, where_: &[Where]) -> Result<u64, AdapterError>;
}
