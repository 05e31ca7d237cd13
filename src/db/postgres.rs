//! PostgreSQL store over a sqlx pool. Statements come from [`crate::sql`];
//! bind casts follow the live column types, introspected once per table.

use crate::db::{FindMany, Record, Store, Where};
use crate::error::AdapterError;
use crate::sql::{self, ColumnTypes, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

pub struct PostgresStore {
    pool: PgPool,
    columns: RwLock<HashMap<String, Arc<ColumnTypes>>>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        PostgresStore {
            pool,
            columns: RwLock::new(HashMap::new()),
        }
    }

    pub async fn connect(url: &str) -> Result<Self, AdapterError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Drop cached column types, e.g. after a migration changed a table.
    pub fn invalidate(&self) {
        if let Ok(mut cache) = self.columns.write() {
            cache.clear();
        }
    }

    async fn column_types(&self, table: &str) -> Result<Arc<ColumnTypes>, AdapterError> {
        if let Some(types) = self.columns.read().ok().and_then(|c| c.get(table).cloned()) {
            return Ok(types);
        }
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT column_name::text, udt_name::text FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        if rows.is_empty() {
            return Err(AdapterError::Store(format!("table {} does not exist", table)));
        }
        let types = Arc::new(rows.into_iter().collect::<ColumnTypes>());
        if let Ok(mut cache) = self.columns.write() {
            cache.insert(table.to_string(), types.clone());
        }
        Ok(types)
    }

    async fn fetch_rows(&self, q: &QueryBuf) -> Result<Vec<Record>, AdapterError> {
        tracing::debug!(sql = %q.sql, params = q.params.len(), "query");
        let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
        for p in &q.params {
            query = query.bind(p.text.clone());
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().filter_map(into_record).collect())
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, AdapterError> {
        tracing::debug!(sql = %q.sql, params = q.params.len(), "execute");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.text.clone());
        }
        Ok(query.execute(&self.pool).await?.rows_affected())
    }
}

fn into_record(v: Value) -> Option<Record> {
    match v {
        Value::Object(m) => Some(m),
        _ => None,
    }
}

#[async_trait]
impl Store for PostgresStore {
    fn id(&self) -> &'static str {
        "postgres"
    }

    async fn create(&self, model: &str, data: Record) -> Result<Record, AdapterError> {
        let types = self.column_types(model).await?;
        let q = sql::insert(model, &types, &data);
        self.fetch_rows(&q)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::Store(format!("insert into {} returned no row", model)))
    }

    async fn find_one(
        &self,
        model: &str,
        where_: &[Where],
        select: Option<&[String]>,
    ) -> Result<Option<Record>, AdapterError> {
        let types = self.column_types(model).await?;
        let q = sql::select(
            model,
            &types,
            &FindMany {
                where_: where_.to_vec(),
                limit: Some(1),
                select: select.map(|s| s.to_vec()),
                ..Default::default()
            },
        );
        Ok(self.fetch_rows(&q).await?.into_iter().next())
    }

    async fn find_many(&self, model: &str, query: &FindMany) -> Result<Vec<Record>, AdapterError> {
        let types = self.column_types(model).await?;
        self.fetch_rows(&sql::select(model, &types, query)).await
    }

    async fn count(&self, model: &str, where_: &[Where]) -> Result<u64, AdapterError> {
        let types = self.column_types(model).await?;
        let q = sql::count(model, &types, where_);
        tracing::debug!(sql = %q.sql, params = q.params.len(), "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(p.text.clone());
        }
        Ok(query.fetch_one(&self.pool).await?.max(0) as u64)
    }

    async fn update(&self, model: &str, where_: &[Where], update: Record) -> Result<Option<Record>, AdapterError> {
        let types = self.column_types(model).await?;
        if update.keys().all(|k| k == "id") {
            return self.find_one(model, where_, None).await;
        }
        let q = sql::update(model, &types, where_, &update, true);
        Ok(self.fetch_rows(&q).await?.into_iter().next())
    }

    async fn update_many(&self, model: &str, where_: &[Where], update: Record) -> Result<u64, AdapterError> {
        let types = self.column_types(model).await?;
        if update.keys().all(|k| k == "id") {
            return self.count(model, where_).await;
        }
        self.execute(&sql::update(model, &types, where_, &update, false)).await
    }

    async fn delete(&self, model: &str, where_: &[Where]) -> Result<(), AdapterError> {
        self.delete_many(model, where_).await.map(|_| ())
    }

    async fn delete_many(&self, model: &str, where_: &[Where]) -> Result<u64, AdapterError> {
        let types = self.column_types(model).await?;
        self.execute(&sql::delete(model, &types, where_)).await
    }
}
