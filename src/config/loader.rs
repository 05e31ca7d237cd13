//! Project config file (`marketing.json` / `framework.json`) used by the CLI and demo.

use crate::config::options::AdvancedOptions;
use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAMES: [&str; 2] = ["marketing.json", "framework.json"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Postgres,
    #[default]
    Memory,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub provider: Provider,
    /// Connection string; falls back to `DATABASE_URL`.
    pub url: Option<String>,
}

impl DatabaseConfig {
    pub fn resolved_url(&self) -> Option<String> {
        self.url.clone().or_else(|| std::env::var("DATABASE_URL").ok())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedConfig {
    #[serde(default)]
    pub use_number_id: bool,
    #[serde(default)]
    pub use_plural: bool,
}

impl From<&AdvancedConfig> for AdvancedOptions {
    fn from(c: &AdvancedConfig) -> Self {
        AdvancedOptions {
            use_number_id: c.use_number_id,
            use_plural: c.use_plural,
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Bundled plugin names, e.g. `["notifications"]`.
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default)]
    pub advanced: AdvancedConfig,
    pub base_path: Option<String>,
}

/// Locate the config file: an explicit path (relative to `cwd`), else the
/// known file names in `cwd`, then in `cwd/config`.
pub fn find_config(cwd: &Path, explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        let path = cwd.join(path);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(ConfigError::Load(format!("config file {} not found", path.display())))
        };
    }
    for dir in [cwd.to_path_buf(), cwd.join("config")] {
        for name in CONFIG_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }
    Err(ConfigError::Load(format!(
        "no {} found in {} or its config/ directory",
        CONFIG_FILE_NAMES.join(" or "),
        cwd.display()
    )))
}

pub fn load_project_config(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_config_in_nested_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("config")).unwrap();
        std::fs::write(
            dir.path().join("config/framework.json"),
            r#"{"database": {"provider": "postgres", "url": "postgres://x"}, "plugins": ["notifications"], "advanced": {"useNumberId": true}}"#,
        )
        .unwrap();
        let path = find_config(dir.path(), None).unwrap();
        let config = load_project_config(&path).unwrap();
        assert_eq!(config.database.provider, Provider::Postgres);
        assert_eq!(config.plugins, vec!["notifications"]);
        assert!(config.advanced.use_number_id);
    }

    #[test]
    fn missing_config_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(find_config(dir.path(), None), Err(ConfigError::Load(_))));
        assert!(find_config(dir.path(), Some(Path::new("nope.json"))).is_err());
    }

    #[test]
    fn empty_object_defaults_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marketing.json");
        std::fs::write(&path, "{}").unwrap();
        let config = load_project_config(&path).unwrap();
        assert_eq!(config.database.provider, Provider::Memory);
        assert!(config.plugins.is_empty());
    }
}
