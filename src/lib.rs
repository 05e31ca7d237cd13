//! Better Marketing: pluggable, typed HTTP API over a pluggable database
//! adapter, with plugins, hooks, a migration CLI, and a route-mirroring client.

pub mod case;
pub mod cli;
pub mod client;
pub mod config;
pub mod context;
pub mod db;
pub mod endpoint;
pub mod error;
pub mod handlers;
pub mod marketing;
pub mod migration;
pub mod plugin;
pub mod plugins;
pub mod rate_limit;
pub mod response;
pub mod routes;
pub mod schema;
pub mod sql;
pub mod validation;

pub use client::Client;
pub use config::{MarketingOptions, ProjectConfig};
pub use context::MarketingContext;
pub use db::{Adapter, MemoryStore, PostgresStore, Store, Where};
pub use endpoint::{CallOptions, ContextPatch, Endpoint, EndpointContext, EndpointOutput, Hook, HookOutcome, Middleware, Reply};
pub use error::{AdapterError, ApiError, ClientError, ConfigError, MarketingError, Result};
pub use marketing::{CallInput, Marketing};
pub use migration::{plan_migrations, MigrationPlan};
pub use plugin::{Plugin, RouteTable};
pub use routes::router;
