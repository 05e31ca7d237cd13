//! Instance options. Two presets exist: `marketing()` and `framework()`.

use crate::db::{IdGeneration, MemoryStore, Store};
use crate::endpoint::{Hook, HookSet};
use crate::error::MarketingError;
use crate::plugin::Plugin;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SECRET: &str = "better-marketing-secret-change-me-in-production-0000";
pub const MIN_SECRET_LENGTH: usize = 32;

#[derive(Clone, Debug, Default)]
pub struct AdvancedOptions {
    pub use_number_id: bool,
    pub use_plural: bool,
    pub id_generation: IdGeneration,
}

#[derive(Clone, Debug)]
pub struct RateLimitOptions {
    pub enabled: bool,
    pub window: Duration,
    pub max: u32,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        RateLimitOptions {
            enabled: false,
            window: Duration::from_secs(10),
            max: 100,
        }
    }
}

pub type ErrorCallback = Arc<dyn Fn(&MarketingError) + Send + Sync>;

#[derive(Clone, Default)]
pub struct OnApiErrorOptions {
    /// Return unexpected errors to the caller of `Marketing::handler` instead of answering 500.
    pub throw: bool,
    pub on_error: Option<ErrorCallback>,
    pub disable_logging: bool,
}

impl fmt::Debug for OnApiErrorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnApiErrorOptions")
            .field("throw", &self.throw)
            .field("on_error", &self.on_error.is_some())
            .field("disable_logging", &self.disable_logging)
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
pub struct LoggerOptions {
    pub disabled: bool,
}

#[derive(Clone)]
pub struct MarketingOptions {
    pub app_name: String,
    pub base_path: String,
    pub base_url: Option<String>,
    pub secret: Option<String>,
    /// Prefix for environment lookups, e.g. `MARKETING_`.
    pub env_prefix: String,
    pub trusted_origins: Vec<String>,
    pub disabled_paths: Vec<String>,
    pub plugins: Vec<Plugin>,
    /// Applied to every endpoint call, before plugin hooks.
    pub hooks: HookSet,
    pub advanced: AdvancedOptions,
    pub rate_limit: RateLimitOptions,
    pub on_api_error: OnApiErrorOptions,
    pub logger: LoggerOptions,
    pub database: Arc<dyn Store>,
}

impl MarketingOptions {
    pub fn marketing() -> Self {
        MarketingOptions {
            app_name: "Better Marketing".into(),
            base_path: "/api/marketing".into(),
            base_url: None,
            secret: None,
            env_prefix: "MARKETING_".into(),
            trusted_origins: Vec::new(),
            disabled_paths: Vec::new(),
            plugins: Vec::new(),
            hooks: HookSet::default(),
            advanced: AdvancedOptions::default(),
            rate_limit: RateLimitOptions::default(),
            on_api_error: OnApiErrorOptions::default(),
            logger: LoggerOptions::default(),
            database: Arc::new(MemoryStore::new()),
        }
    }

    pub fn framework() -> Self {
        MarketingOptions {
            app_name: "Better Framework".into(),
            base_path: "/api/framework".into(),
            env_prefix: "FRAMEWORK_".into(),
            ..Self::marketing()
        }
    }

    pub fn database(mut self, store: Arc<dyn Store>) -> Self {
        self.database = store;
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    pub fn trusted_origin(mut self, origin: impl Into<String>) -> Self {
        self.trusted_origins.push(origin.into());
        self
    }

    pub fn disable_path(mut self, path: impl Into<String>) -> Self {
        self.disabled_paths.push(path.into());
        self
    }

    pub fn before_hook(mut self, hook: Hook) -> Self {
        self.hooks.before.push(hook);
        self
    }

    pub fn after_hook(mut self, hook: Hook) -> Self {
        self.hooks.after.push(hook);
        self
    }

    pub fn advanced(mut self, advanced: AdvancedOptions) -> Self {
        self.advanced = advanced;
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimitOptions) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn on_api_error(mut self, on_api_error: OnApiErrorOptions) -> Self {
        self.on_api_error = on_api_error;
        self
    }

    pub fn logger(mut self, logger: LoggerOptions) -> Self {
        self.logger = logger;
        self
    }
}

impl fmt::Debug for MarketingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketingOptions")
            .field("app_name", &self.app_name)
            .field("base_path", &self.base_path)
            .field("base_url", &self.base_url)
            .field("trusted_origins", &self.trusted_origins)
            .field("disabled_paths", &self.disabled_paths)
            .field("plugins", &self.plugins.iter().map(|p| p.id.as_str()).collect::<Vec<_>>())
            .field("advanced", &self.advanced)
            .field("rate_limit", &self.rate_limit)
            .field("database", &self.database.id())
            .finish()
    }
}
