//! In-memory reference store: one table-keyed map of row vectors.
//! Intended for development and tests; no isolation between concurrent updates.

use crate::db::{Connector, FindMany, Operator, Record, SortDirection, Store, Where};
use crate::error::AdapterError;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Record>>,
    next_id: HashMap<String, i64>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, AdapterError> {
        self.tables.read().map_err(|_| AdapterError::Store("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, AdapterError> {
        self.tables.write().map_err(|_| AdapterError::Store("memory store lock poisoned".into()))
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => as_f64(a)?.partial_cmp(&as_f64(b)?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        _ => None,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => as_f64(a) == as_f64(b),
        _ => a == b,
    }
}

fn condition_holds(record: &Record, w: &Where) -> bool {
    let actual = record.get(&w.field).unwrap_or(&Value::Null);
    let str_op = |f: fn(&str, &str) -> bool| match (actual, &w.value) {
        (Value::String(a), Value::String(b)) => f(a, b),
        _ => false,
    };
    match w.operator {
        Operator::Eq => loose_eq(actual, &w.value),
        Operator::Ne => !loose_eq(actual, &w.value),
        Operator::Gt => compare(actual, &w.value) == Some(Ordering::Greater),
        Operator::Gte => matches!(compare(actual, &w.value), Some(Ordering::Greater | Ordering::Equal)),
        Operator::Lt => compare(actual, &w.value) == Some(Ordering::Less),
        Operator::Lte => matches!(compare(actual, &w.value), Some(Ordering::Less | Ordering::Equal)),
        Operator::In => w
            .value
            .as_array()
            .map(|vs| vs.iter().any(|v| loose_eq(actual, v)))
            .unwrap_or(false),
        Operator::NotIn => w
            .value
            .as_array()
            .map(|vs| !vs.iter().any(|v| loose_eq(actual, v)))
            .unwrap_or(true),
        Operator::Contains => str_op(|a, b| a.contains(b)),
        Operator::StartsWith => str_op(|a, b| a.starts_with(b)),
        Operator::EndsWith => str_op(|a, b| a.ends_with(b)),
    }
}

/// AND conditions are mandatory; OR conditions add alternatives but never bypass them.
pub(crate) fn matches_where(record: &Record, where_: &[Where]) -> bool {
    let (ors, ands): (Vec<&Where>, Vec<&Where>) = where_.iter().partition(|w| w.connector == Connector::Or);
    let and_ok = ands.iter().all(|w| condition_holds(record, w));
    let or_ok = ors.is_empty() || ors.iter().any(|w| condition_holds(record, w));
    and_ok && or_ok
}

fn project(row: &Record, select: Option<&[String]>) -> Record {
    match select {
        Some(cols) => row
            .iter()
            .filter(|(k, _)| cols.iter().any(|c| c == *k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        None => row.clone(),
    }
}

fn merge(row: &mut Record, update: &Record) {
    for (k, v) in update {
        if k != "id" {
            row.insert(k.clone(), v.clone());
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn id(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, model: &str, mut data: Record) -> Result<Record, AdapterError> {
        let mut tables = self.write()?;
        if !data.contains_key("id") {
            let next = tables.next_id.entry(model.to_string()).or_insert(0);
            *next += 1;
            let id = *next;
            data.insert("id".into(), Value::from(id));
        }
        tables.rows.entry(model.to_string()).or_default().push(data.clone());
        Ok(data)
    }

    async fn find_one(
        &self,
        model: &str,
        where_: &[Where],
        select: Option<&[String]>,
    ) -> Result<Option<Record>, AdapterError> {
        let tables = self.read()?;
        Ok(tables
            .rows
            .get(model)
            .and_then(|rows| rows.iter().find(|r| matches_where(r, where_)))
            .map(|r| project(r, select)))
    }

    async fn find_many(&self, model: &str, query: &FindMany) -> Result<Vec<Record>, AdapterError> {
        let tables = self.read()?;
        let mut rows: Vec<&Record> = tables
            .rows
            .get(model)
            .map(|rows| rows.iter().filter(|r| matches_where(r, &query.where_)).collect())
            .unwrap_or_default();
        if let Some(sort) = &query.sort_by {
            rows.sort_by(|a, b| {
                let ord = compare(
                    a.get(&sort.field).unwrap_or(&Value::Null),
                    b.get(&sort.field).unwrap_or(&Value::Null),
                )
                .unwrap_or(Ordering::Equal);
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|r| project(r, query.select.as_deref()))
            .collect())
    }

    async fn count(&self, model: &str, where_: &[Where]) -> Result<u64, AdapterError> {
        let tables = self.read()?;
        Ok(tables
            .rows
            .get(model)
            .map(|rows| rows.iter().filter(|r| matches_where(r, where_)).count() as u64)
            .unwrap_or(0))
    }

    async fn update(&self, model: &str, where_: &[Where], update: Record) -> Result<Option<Record>, AdapterError> {
        let mut tables = self.write()?;
        let Some(rows) = tables.rows.get_mut(model) else {
            return Ok(None);
        };
        let mut first = None;
        for row in rows.iter_mut().filter(|r| matches_where(r, where_)) {
            merge(row, &update);
            if first.is_none() {
                first = Some(row.clone());
            }
        }
        Ok(first)
    }

    async fn update_many(&self, model: &str, where_: &[Where], update: Record) -> Result<u64, AdapterError> {
        let mut tables = self.write()?;
        let Some(rows) = tables.rows.get_mut(model) else {
            return Ok(0);
        };
        let mut count = 0;
        for row in rows.iter_mut().filter(|r| matches_where(r, where_)) {
            merge(row, &update);
            count += 1;
        }
        Ok(count)
    }

    async fn delete(&self, model: &str, where_: &[Where]) -> Result<(), AdapterError> {
        self.delete_many(model, where_).await.map(|_| ())
    }

    async fn delete_many(&self, model: &str, where_: &[Where]) -> Result<u64, AdapterError> {
        let mut tables = self.write()?;
        let Some(rows) = tables.rows.get_mut(model) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !matches_where(r, where_));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SortBy;
    use serde_json::json;

    fn row(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (a, b, c) in [(1, 2, 0), (1, 0, 3), (1, 0, 0), (2, 2, 3)] {
            store.create("t", row(json!({"a": a, "b": b, "c": c}))).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn or_group_never_bypasses_and_group() {
        let store = seeded().await;
        let where_ = vec![Where::eq("a", 1), Where::eq("b", 2).or(), Where::eq("c", 3).or()];
        let rows = store
            .find_many("t", &FindMany { where_, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["a"] == json!(1)));
    }

    #[tokio::test]
    async fn empty_where_matches_everything() {
        let store = seeded().await;
        assert_eq!(store.count("t", &[]).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn sort_then_offset_then_limit() {
        let store = seeded().await;
        let rows = store
            .find_many(
                "t",
                &FindMany {
                    sort_by: Some(SortBy {
                        field: "id".into(),
                        direction: SortDirection::Desc,
                    }),
                    offset: Some(1),
                    limit: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(3), json!(2)]);
    }

    #[tokio::test]
    async fn string_and_set_operators() {
        let store = MemoryStore::new();
        for name in ["alpha", "beta", "alphabet"] {
            store.create("w", row(json!({"name": name}))).await.unwrap();
        }
        let count = |w: Where| {
            let store = &store;
            async move { store.count("w", &[w]).await.unwrap() }
        };
        assert_eq!(count(Where::op("name", Operator::StartsWith, "alpha")).await, 2);
        assert_eq!(count(Where::op("name", Operator::EndsWith, "bet")).await, 1);
        assert_eq!(count(Where::op("name", Operator::Contains, "ph")).await, 2);
        assert_eq!(count(Where::op("name", Operator::In, json!(["beta", "gamma"]))).await, 1);
        assert_eq!(count(Where::op("name", Operator::NotIn, json!(["beta"]))).await, 2);
        assert_eq!(count(Where::op("name", Operator::Gt, "b")).await, 1);
    }

    #[tokio::test]
    async fn delete_many_reports_removed_rows() {
        let store = seeded().await;
        assert_eq!(store.delete_many("t", &[Where::eq("a", 1)]).await.unwrap(), 3);
        assert_eq!(store.count("t", &[]).await.unwrap(), 1);
    }
}
