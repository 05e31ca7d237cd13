//! `better-marketing migrate`: diff the configured schema against a live
//! Postgres database, write the SQL to a timestamped file, and apply it.

use crate::config::{find_config, load_project_config, AdvancedOptions, ProjectConfig, Provider};
use crate::db::AdapterConfig;
use crate::error::{ConfigError, MarketingError, Result};
use crate::migration::{apply, introspect, plan_migrations};
use crate::plugins;
use crate::schema::{core_schema, Schema};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub const MIGRATIONS_DIR: &str = "better-marketing_migrations";

#[derive(Parser, Debug)]
#[command(name = "better-marketing")]
#[command(about = "Better Marketing command line tools", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or alter tables to match the configured schema.
    Migrate(MigrateArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct MigrateArgs {
    /// Config file, relative to the working directory.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Working directory to search for the config file.
    #[arg(long)]
    pub cwd: Option<PathBuf>,
    /// Apply without asking.
    #[arg(short = 'y', long)]
    pub yes: bool,
}

#[derive(Debug, PartialEq)]
pub enum MigrateOutcome {
    UpToDate,
    Cancelled,
    Applied(PathBuf),
}

/// Core tables plus the schemas of the bundled plugins the config enables.
pub fn build_schema(config: &ProjectConfig) -> Result<Schema, ConfigError> {
    let mut enabled = Vec::new();
    for name in &config.plugins {
        let plugin = plugins::by_name(name).ok_or_else(|| {
            ConfigError::Load(format!(
                "unknown plugin {}; bundled plugins: {}",
                name,
                plugins::BUNDLED.join(", ")
            ))
        })?;
        enabled.push(plugin);
    }
    Ok(core_schema().merge_plugins(enabled.iter().filter_map(|p| p.schema.as_ref())))
}

pub fn migration_file_name(now: DateTime<Utc>) -> String {
    format!("{}_migration.sql", now.format("%Y%m%d%H%M%S"))
}

pub fn write_migration(cwd: &Path, now: DateTime<Utc>, sql: &str) -> Result<PathBuf> {
    let dir = cwd.join(MIGRATIONS_DIR);
    let io = |e: std::io::Error| MarketingError::internal(format!("{}: {}", dir.display(), e));
    std::fs::create_dir_all(&dir).map_err(io)?;
    let path = dir.join(migration_file_name(now));
    std::fs::write(&path, sql).map_err(io)?;
    Ok(path)
}

/// `y`/`yes`, case-insensitive, accepts.
pub fn confirm_from<R: BufRead>(mut input: R, question: &str) -> bool {
    print!("{} [y/N] ", question);
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if input.read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub async fn migrate<F>(args: &MigrateArgs, confirm: F) -> Result<MigrateOutcome>
where
    F: FnOnce(&str) -> bool,
{
    let cwd = match &args.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().map_err(|e| MarketingError::internal(e.to_string()))?,
    };
    let path = find_config(&cwd, args.config.as_deref())?;
    let config = load_project_config(&path)?;
    if config.database.provider != Provider::Postgres {
        return Err(ConfigError::Load(format!(
            "{}: migrate needs database.provider \"postgres\", got {:?}",
            path.display(),
            config.database.provider
        ))
        .into());
    }
    let url = config
        .database
        .resolved_url()
        .ok_or_else(|| ConfigError::Load("database.url or DATABASE_URL must be set".into()))?;

    let schema = build_schema(&config)?;
    let advanced = AdvancedOptions::from(&config.advanced);
    let adapter_config = AdapterConfig {
        use_plural: advanced.use_plural,
        use_number_id: advanced.use_number_id,
        id_generation: advanced.id_generation,
    };

    let pool = PgPoolOptions::new().max_connections(2).connect(&url).await?;
    let live = introspect(&pool).await?;
    let plan = plan_migrations(&schema, &adapter_config, &live);
    if plan.is_empty() {
        println!("no migrations needed");
        return Ok(MigrateOutcome::UpToDate);
    }

    let sql = plan.compile();
    println!("{}", sql);
    if !args.yes && !confirm("Apply these migrations?") {
        println!("migration cancelled");
        return Ok(MigrateOutcome::Cancelled);
    }
    let file = write_migration(&cwd, Utc::now(), &sql)?;
    apply(&pool, &plan).await?;
    tracing::info!(file = %file.display(), steps = plan.steps.len(), "migration applied");
    Ok(MigrateOutcome::Applied(file))
}

pub async fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Migrate(args) => {
            let stdin = std::io::stdin();
            match migrate(&args, |q| confirm_from(stdin.lock(), q)).await {
                Ok(MigrateOutcome::Applied(file)) => {
                    println!("migration written to {} and applied", file.display());
                    ExitCode::SUCCESS
                }
                Ok(_) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!(error = %e, "migrate failed");
                    eprintln!("error: {}", e);
                    ExitCode::from(1)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_migrate_flags() {
        let cli = Cli::parse_from(["better-marketing", "migrate", "--config", "m.json", "-y"]);
        let Command::Migrate(args) = cli.command;
        assert_eq!(args.config, Some(PathBuf::from("m.json")));
        assert!(args.yes);
        assert!(args.cwd.is_none());
    }

    #[test]
    fn file_name_is_timestamped() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(migration_file_name(now), "20240309070501_migration.sql");
    }

    #[test]
    fn confirm_accepts_yes_only() {
        assert!(confirm_from("y\n".as_bytes(), "ok?"));
        assert!(confirm_from("YES\n".as_bytes(), "ok?"));
        assert!(!confirm_from("\n".as_bytes(), "ok?"));
        assert!(!confirm_from("nope\n".as_bytes(), "ok?"));
    }

    #[test]
    fn unknown_plugin_names_are_rejected() {
        let config = ProjectConfig {
            plugins: vec!["notifications".into()],
            ..Default::default()
        };
        assert!(build_schema(&config).unwrap().get("notification").is_some());
        let config = ProjectConfig {
            plugins: vec!["nope".into()],
            ..Default::default()
        };
        assert!(build_schema(&config).is_err());
    }

    #[tokio::test]
    async fn memory_provider_cannot_migrate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marketing.json"), "{}").unwrap();
        let args = MigrateArgs {
            cwd: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let err = migrate(&args, |_| true).await.unwrap_err();
        assert!(matches!(err, MarketingError::Config(ConfigError::Load(_))));
    }

    #[tokio::test]
    async fn missing_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = MigrateArgs {
            cwd: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        assert!(migrate(&args, |_| true).await.is_err());
    }

    #[test]
    fn writes_sql_under_migrations_dir() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let path = write_migration(dir.path(), now, "SELECT 1;").unwrap();
        assert!(path.ends_with("better-marketing_migrations/20240102030405_migration.sql"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "SELECT 1;");
    }
}
