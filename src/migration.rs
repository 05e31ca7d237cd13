//! Schema migrations: diff the merged schema against live tables, render DDL,
//! and apply it. Only additive changes are planned (new tables, new columns).

use crate::case::pluralize;
use crate::db::AdapterConfig;
use crate::error::MarketingError;
use crate::schema::{FieldAttribute, FieldType, OnDelete, Schema};
use crate::sql::quoted;
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};

/// Live table name -> column names.
pub type LiveColumns = HashMap<String, HashSet<String>>;

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnPlan {
    pub name: String,
    pub sql_type: &'static str,
    pub not_null: bool,
    pub unique: bool,
    /// (table, column, on delete)
    pub references: Option<(String, String, OnDelete)>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MigrationStep {
    CreateTable { table: String, columns: Vec<ColumnPlan> },
    AddColumn { table: String, column: ColumnPlan },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MigrationPlan {
    pub steps: Vec<MigrationStep>,
    use_number_id: bool,
}

fn table_name(schema: &Schema, key: &str, use_plural: bool) -> String {
    let name = schema.get(key).map(|m| m.model_name.as_str()).unwrap_or(key);
    if use_plural {
        pluralize(name)
    } else {
        name.to_string()
    }
}

fn sql_type(attr: &FieldAttribute, use_number_id: bool) -> &'static str {
    let references_id = attr.references.as_ref().map(|r| r.field == "id").unwrap_or(false);
    if references_id && use_number_id {
        return "BIGINT";
    }
    match attr.field_type {
        FieldType::String => "TEXT",
        FieldType::Number => "DOUBLE PRECISION",
        FieldType::Boolean => "BOOLEAN",
        FieldType::Date => "TIMESTAMPTZ",
        FieldType::Json => "JSONB",
    }
}

fn column_plan(schema: &Schema, key: &str, attr: &FieldAttribute, config: &AdapterConfig) -> ColumnPlan {
    let references = attr.references.as_ref().map(|r| {
        let column = schema
            .get(&r.model)
            .and_then(|m| m.fields.get(&r.field))
            .map(|f| f.column(&r.field).to_string())
            .unwrap_or_else(|| r.field.clone());
        (table_name(schema, &r.model, config.use_plural), column, r.on_delete)
    });
    ColumnPlan {
        name: attr.column(key).to_string(),
        sql_type: sql_type(attr, config.use_number_id),
        not_null: attr.required,
        unique: attr.unique,
        references,
    }
}

/// Plan the DDL needed for `schema` given the live columns. Models are visited
/// in their declared order so referenced tables are created first.
pub fn plan_migrations(schema: &Schema, config: &AdapterConfig, live: &LiveColumns) -> MigrationPlan {
    let mut steps = Vec::new();
    for (key, model) in schema.ordered() {
        let table = table_name(schema, key, config.use_plural);
        let columns = model
            .fields
            .iter()
            .map(|(k, attr)| column_plan(schema, k, attr, config));
        match live.get(&table) {
            None => steps.push(MigrationStep::CreateTable {
                table,
                columns: columns.collect(),
            }),
            Some(existing) => {
                for column in columns.filter(|c| !existing.contains(&c.name)) {
                    steps.push(MigrationStep::AddColumn {
                        table: table.clone(),
                        column,
                    });
                }
            }
        }
    }
    MigrationPlan {
        steps,
        use_number_id: config.use_number_id,
    }
}

fn column_def(c: &ColumnPlan, in_create: bool) -> String {
    let mut def = format!("{} {}", quoted(&c.name), c.sql_type);
    // Added columns stay nullable so existing rows remain valid.
    if c.not_null && in_create {
        def.push_str(" NOT NULL");
    }
    if c.unique {
        def.push_str(" UNIQUE");
    }
    if let Some((table, column, on_delete)) = &c.references {
        def.push_str(&format!(
            " REFERENCES {} ({}) ON DELETE {}",
            quoted(table),
            quoted(column),
            on_delete.as_sql()
        ));
    }
    def
}

impl MigrationPlan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// One SQL statement per step, without trailing semicolons.
    pub fn statements(&self) -> Vec<String> {
        self.steps
            .iter()
            .map(|step| match step {
                MigrationStep::CreateTable { table, columns } => {
                    let id = if self.use_number_id {
                        "\"id\" BIGSERIAL PRIMARY KEY".to_string()
                    } else {
                        "\"id\" TEXT PRIMARY KEY DEFAULT gen_random_uuid()::text".to_string()
                    };
                    let defs: Vec<String> = std::iter::once(id)
                        .chain(columns.iter().map(|c| column_def(c, true)))
                        .collect();
                    format!("CREATE TABLE {} (\n  {}\n)", quoted(table), defs.join(",\n  "))
                }
                MigrationStep::AddColumn { table, column } => {
                    format!("ALTER TABLE {} ADD COLUMN {}", quoted(table), column_def(column, false))
                }
            })
            .collect()
    }

    /// Render the plan as a migration file.
    pub fn compile(&self) -> String {
        self.statements()
            .into_iter()
            .map(|s| format!("{};\n", s))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Read the live columns of every table in the current schema.
pub async fn introspect(pool: &PgPool) -> Result<LiveColumns, MarketingError> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT table_name::text, column_name::text FROM information_schema.columns \
         WHERE table_schema = current_schema()",
    )
    .fetch_all(pool)
    .await?;
    let mut live = LiveColumns::new();
    for (table, column) in rows {
        live.entry(table).or_default().insert(column);
    }
    Ok(live)
}

/// Apply every statement of the plan in one transaction.
pub async fn apply(pool: &PgPool, plan: &MigrationPlan) -> Result<(), MarketingError> {
    let mut tx = pool.begin().await?;
    for sql in plan.statements() {
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(&sql).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    tracing::info!(steps = plan.steps.len(), "migrations applied");
    Ok(())
}
