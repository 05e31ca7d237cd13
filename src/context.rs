//! Process-wide context built once at init and shared with every endpoint call.

use crate::config::{MarketingOptions, ValidatedOptions};
use crate::db::{Adapter, AdapterConfig, FindManyArgs, Record, SortBy, SortDirection, Where};
use crate::error::{ApiError, Result};
use crate::schema::Schema;
use std::sync::Arc;

pub struct MarketingContext {
    pub app_name: String,
    pub base_path: String,
    pub base_url: Option<String>,
    pub secret: String,
    pub trusted_origins: Vec<String>,
    pub schema: Arc<Schema>,
    pub adapter: Adapter,
    pub internal: InternalAdapter,
    pub logger_disabled: bool,
}

impl MarketingContext {
    pub fn new(options: &MarketingOptions, validated: ValidatedOptions, schema: Schema) -> Self {
        let schema = Arc::new(schema);
        let adapter = Adapter::new(
            options.database.clone(),
            schema.clone(),
            AdapterConfig {
                use_plural: options.advanced.use_plural,
                use_number_id: options.advanced.use_number_id,
                id_generation: options.advanced.id_generation.clone(),
            },
        );
        MarketingContext {
            app_name: options.app_name.clone(),
            base_path: validated.base_path,
            base_url: options.base_url.clone(),
            secret: validated.secret,
            trusted_origins: options.trusted_origins.clone(),
            schema,
            internal: InternalAdapter::new(adapter.clone()),
            adapter,
            logger_disabled: options.logger.disabled,
        }
    }

    pub fn is_trusted_origin(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.trusted_origins.iter().any(|o| o.trim_end_matches('/') == origin)
            || self
                .base_url
                .as_deref()
                .map(|u| u.trim_end_matches('/') == origin)
                .unwrap_or(false)
    }
}

/// Typed helpers over the adapter for the built-in tables.
#[derive(Clone)]
pub struct InternalAdapter {
    adapter: Adapter,
}

impl InternalAdapter {
    pub fn new(adapter: Adapter) -> Self {
        InternalAdapter { adapter }
    }

    pub async fn find_by_id(&self, model: &str, id: &str) -> Result<Option<Record>> {
        Ok(self.adapter.find_one(model, &[Where::eq("id", id)], None).await?)
    }

    /// Like [`find_by_id`](Self::find_by_id) but a missing record is a 404.
    pub async fn require(&self, model: &str, id: &str) -> Result<Record> {
        self.find_by_id(model, id)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("{} not found", capitalize(model))).into())
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<Record>> {
        let email = email.to_lowercase();
        Ok(self.adapter.find_one("user", &[Where::eq("email", email)], None).await?)
    }

    /// Emails are stored lowercased and must be unique.
    pub async fn create_user(&self, mut data: Record) -> Result<Record> {
        if let Some(email) = data.get("email").and_then(|v| v.as_str()).map(str::to_lowercase) {
            if self.find_user_by_email(&email).await?.is_some() {
                return Err(ApiError::conflict("User with this email already exists").into());
            }
            data.insert("email".into(), email.into());
        }
        Ok(self.adapter.create("user", data, None, false).await?)
    }

    pub async fn update_by_id(&self, model: &str, id: &str, data: Record) -> Result<Record> {
        self.adapter
            .update(model, &[Where::eq("id", id)], data)
            .await?
            .ok_or_else(|| ApiError::not_found(format!("{} not found", capitalize(model))).into())
    }

    pub async fn delete_by_id(&self, model: &str, id: &str) -> Result<()> {
        self.require(model, id).await?;
        Ok(self.adapter.delete(model, &[Where::eq("id", id)]).await?)
    }

    /// Newest first.
    pub async fn list(&self, model: &str, where_: Vec<Where>, limit: Option<usize>, offset: Option<usize>) -> Result<Vec<Record>> {
        Ok(self
            .adapter
            .find_many(
                model,
                FindManyArgs {
                    where_,
                    limit,
                    offset,
                    sort_by: Some(SortBy {
                        field: "createdAt".into(),
                        direction: SortDirection::Desc,
                    }),
                },
            )
            .await?)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
