//! Builds parameterized INSERT, SELECT, UPDATE, DELETE for the Postgres store.
//! Identifiers come from the schema only; values are always parameters.
//! Rows are returned as `row_to_json` so decoding is type-agnostic.

use crate::db::{Connector, FindMany, Operator, Record, SortDirection, Where};
use crate::sql::PgParam;
use serde_json::Value;
use std::collections::HashMap;

/// Column name -> Postgres type name (`udt_name`), as introspected from the live table.
pub type ColumnTypes = HashMap<String, String>;

/// Quote identifier for PostgreSQL.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgParam>,
}

impl QueryBuf {
    fn new() -> Self {
        Self::default()
    }

    /// Push a parameter and return its placeholder with cast, e.g. `$2::timestamptz`.
    fn push(&mut self, types: &ColumnTypes, column: &str, v: &Value) -> String {
        let param = match types.get(column) {
            Some(t) => PgParam::from_json(v, t),
            None => PgParam::inferred(v),
        };
        let placeholder = format!("${}::{}", self.params.len() + 1, param.cast);
        self.params.push(param);
        placeholder
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn condition(q: &mut QueryBuf, types: &ColumnTypes, w: &Where) -> String {
    let col = quoted(&w.field);
    let like = |q: &mut QueryBuf, pattern: String| {
        let ph = format!("${}", q.params.len() + 1);
        q.params.push(PgParam::from_json(&Value::String(pattern), "text"));
        format!("{}::text LIKE {}", col, ph)
    };
    match w.operator {
        Operator::Eq if w.value.is_null() => format!("{} IS NULL", col),
        Operator::Ne if w.value.is_null() => format!("{} IS NOT NULL", col),
        Operator::Eq => format!("{} = {}", col, q.push(types, &w.field, &w.value)),
        Operator::Ne => format!("{} <> {}", col, q.push(types, &w.field, &w.value)),
        Operator::Gt => format!("{} > {}", col, q.push(types, &w.field, &w.value)),
        Operator::Gte => format!("{} >= {}", col, q.push(types, &w.field, &w.value)),
        Operator::Lt => format!("{} < {}", col, q.push(types, &w.field, &w.value)),
        Operator::Lte => format!("{} <= {}", col, q.push(types, &w.field, &w.value)),
        Operator::In | Operator::NotIn => {
            let values = match &w.value {
                Value::Array(vs) => vs.clone(),
                other => vec![other.clone()],
            };
            let negate = w.operator == Operator::NotIn;
            if values.is_empty() {
                return if negate { "TRUE".into() } else { "FALSE".into() };
            }
            let phs: Vec<String> = values.iter().map(|v| q.push(types, &w.field, v)).collect();
            let op = if negate { "NOT IN" } else { "IN" };
            format!("{} {} ({})", col, op, phs.join(", "))
        }
        Operator::Contains => like(q, format!("%{}%", escape_like(&text_of(&w.value)))),
        Operator::StartsWith => like(q, format!("{}%", escape_like(&text_of(&w.value)))),
        Operator::EndsWith => like(q, format!("%{}", escape_like(&text_of(&w.value)))),
    }
}

fn text_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// ` WHERE (and-group) AND (or-group)`, or empty when there are no conditions.
pub fn where_clause(q: &mut QueryBuf, types: &ColumnTypes, where_: &[Where]) -> String {
    let mut ands = Vec::new();
    let mut ors = Vec::new();
    for w in where_ {
        let sql = condition(q, types, w);
        match w.connector {
            Connector::And => ands.push(sql),
            Connector::Or => ors.push(sql),
        }
    }
    let mut groups = Vec::new();
    if !ands.is_empty() {
        groups.push(format!("({})", ands.join(" AND ")));
    }
    if !ors.is_empty() {
        groups.push(format!("({})", ors.join(" OR ")));
    }
    if groups.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", groups.join(" AND "))
    }
}

fn returning_json(statement: String) -> String {
    format!("WITH t AS ({} RETURNING *) SELECT row_to_json(t) FROM t", statement)
}

pub fn insert(table: &str, types: &ColumnTypes, data: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let statement = if data.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES", quoted(table))
    } else {
        let mut cols = Vec::with_capacity(data.len());
        let mut phs = Vec::with_capacity(data.len());
        for (k, v) in data {
            cols.push(quoted(k));
            phs.push(q.push(types, k, v));
        }
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quoted(table),
            cols.join(", "),
            phs.join(", ")
        )
    };
    q.sql = returning_json(statement);
    q
}

pub fn select(table: &str, types: &ColumnTypes, query: &FindMany) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = match &query.select {
        Some(cols) if !cols.is_empty() => cols.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", "),
        _ => "*".to_string(),
    };
    let where_sql = where_clause(&mut q, types, &query.where_);
    let order = query
        .sort_by
        .as_ref()
        .map(|s| {
            let dir = match s.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!(" ORDER BY {} {}", quoted(&s.field), dir)
        })
        .unwrap_or_default();
    let limit = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset = query.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT row_to_json(t) FROM (SELECT {} FROM {}{}{}{}{}) t",
        cols,
        quoted(table),
        where_sql,
        order,
        limit,
        offset
    );
    q
}

pub fn count(table: &str, types: &ColumnTypes, where_: &[Where]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, types, where_);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", quoted(table), where_sql);
    q
}

/// UPDATE matching rows: SET only the columns present in `data`. `id` is never updated.
/// With `returning`, the statement yields the updated rows as JSON.
pub fn update(table: &str, types: &ColumnTypes, where_: &[Where], data: &Record, returning: bool) -> QueryBuf {
    let mut q = QueryBuf::new();
    let sets: Vec<String> = data
        .iter()
        .filter(|(k, _)| k.as_str() != "id")
        .map(|(k, v)| format!("{} = {}", quoted(k), q.push(types, k, v)))
        .collect();
    let where_sql = where_clause(&mut q, types, where_);
    let statement = format!("UPDATE {} SET {}{}", quoted(table), sets.join(", "), where_sql);
    q.sql = if returning { returning_json(statement) } else { statement };
    q
}

pub fn delete(table: &str, types: &ColumnTypes, where_: &[Where]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, types, where_);
    q.sql = format!("DELETE FROM {}{}", quoted(table), where_sql);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SortBy;
    use serde_json::json;

    fn types() -> ColumnTypes {
        [("id", "text"), ("a", "float8"), ("b", "float8"), ("createdAt", "timestamptz")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn and_group_then_or_group() {
        let mut q = QueryBuf::new();
        let w = vec![Where::eq("a", 1), Where::eq("b", 2).or(), Where::eq("c", 3).or()];
        let sql = where_clause(&mut q, &types(), &w);
        assert_eq!(sql, " WHERE (\"a\" = $1::float8) AND (\"b\" = $2::float8 OR \"c\" = $3::int8)");
        assert_eq!(q.params.len(), 3);
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let mut q = QueryBuf::new();
        let sql = where_clause(&mut q, &types(), &[Where::op("a", Operator::In, json!([]))]);
        assert_eq!(sql, " WHERE (FALSE)");
    }

    #[test]
    fn select_with_sort_and_paging() {
        let q = select(
            "user",
            &types(),
            &FindMany {
                where_: vec![Where::op("createdAt", Operator::Gt, "2024-01-01T00:00:00.000Z")],
                limit: Some(10),
                offset: Some(20),
                sort_by: Some(SortBy {
                    field: "createdAt".into(),
                    direction: SortDirection::Desc,
                }),
                select: None,
            },
        );
        assert_eq!(
            q.sql,
            "SELECT row_to_json(t) FROM (SELECT * FROM \"user\" WHERE (\"createdAt\" > $1::timestamptz) ORDER BY \"createdAt\" DESC LIMIT 10 OFFSET 20) t"
        );
    }

    #[test]
    fn insert_returns_row_json() {
        let data = json!({"id": "u1", "a": 5}).as_object().cloned().unwrap();
        let q = insert("t", &types(), &data);
        assert!(q.sql.starts_with("WITH t AS (INSERT INTO \"t\" (\"a\", \"id\") VALUES ($1::float8, $2::text) RETURNING *)"));
        assert_eq!(q.params[0].text.as_deref(), Some("5"));
    }

    #[test]
    fn update_skips_id_and_numbers_where_after_sets() {
        let data = json!({"id": "x", "a": 1}).as_object().cloned().unwrap();
        let q = update("t", &types(), &[Where::eq("id", "u1")], &data, false);
        assert_eq!(q.sql, "UPDATE \"t\" SET \"a\" = $1::float8 WHERE (\"id\" = $2::text)");
    }

    #[test]
    fn like_patterns_escape_wildcards() {
        let mut q = QueryBuf::new();
        where_clause(&mut q, &types(), &[Where::op("id", Operator::Contains, "50%")]);
        assert_eq!(q.params[0].text.as_deref(), Some("%50\\%%"));
    }
}
