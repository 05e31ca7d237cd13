//! Startup validation: secret resolution, base path, rate-limit bounds.

use crate::config::options::{MarketingOptions, DEFAULT_SECRET, MIN_SECRET_LENGTH};
use crate::error::ConfigError;

/// Values derived from options once, at startup.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedOptions {
    pub secret: String,
    pub base_path: String,
}

fn is_production(lookup: &dyn Fn(&str) -> Option<String>) -> bool {
    lookup("APP_ENV").as_deref() == Some("production")
}

/// Explicit option, then `<PREFIX>SECRET`, then `BETTER_MARKETING_SECRET`, then the
/// built-in default. The default is rejected in production.
pub fn resolve_secret(options: &MarketingOptions, lookup: &dyn Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
    let env_key = format!("{}SECRET", options.env_prefix);
    let secret = options
        .secret
        .clone()
        .or_else(|| lookup(&env_key))
        .or_else(|| lookup("BETTER_MARKETING_SECRET"))
        .filter(|s| !s.is_empty());
    let secret = match secret {
        Some(s) => s,
        None if is_production(lookup) => return Err(ConfigError::MissingSecret(env_key)),
        None => {
            if !options.logger.disabled {
                tracing::warn!(
                    "using the default secret; set {} or pass `secret` before deploying",
                    env_key
                );
            }
            DEFAULT_SECRET.to_string()
        }
    };
    if secret == DEFAULT_SECRET && is_production(lookup) {
        return Err(ConfigError::MissingSecret(env_key));
    }
    if secret.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::SecretTooShort {
            min: MIN_SECRET_LENGTH,
            len: secret.len(),
        });
    }
    Ok(secret)
}

/// Leading slash, no trailing slash. `/` and empty normalize to empty (mount at root).
pub fn normalize_base_path(path: &str) -> Result<String, ConfigError> {
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if !trimmed.starts_with('/') {
        return Err(ConfigError::BasePath(format!("{} must start with '/'", path)));
    }
    if trimmed.contains(char::is_whitespace) || trimmed.contains('?') || trimmed.contains('#') {
        return Err(ConfigError::BasePath(format!("{} is not a plain path", path)));
    }
    Ok(trimmed.to_string())
}

pub fn validate_rate_limit(options: &MarketingOptions) -> Result<(), ConfigError> {
    let rl = &options.rate_limit;
    if rl.window.is_zero() {
        return Err(ConfigError::RateLimit("window must be greater than zero".into()));
    }
    if rl.max == 0 {
        return Err(ConfigError::RateLimit("max must be greater than zero".into()));
    }
    Ok(())
}

pub fn validate_with(
    options: &MarketingOptions,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> Result<ValidatedOptions, ConfigError> {
    validate_rate_limit(options)?;
    let base_path = normalize_base_path(&options.base_path)?;
    let secret = resolve_secret(options, lookup)?;
    Ok(ValidatedOptions { secret, base_path })
}

/// Validate against the process environment.
pub fn validate(options: &MarketingOptions) -> Result<ValidatedOptions, ConfigError> {
    validate_with(options, &|key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitOptions;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn explicit_secret_wins_over_env() {
        let opts = MarketingOptions::marketing().secret("x".repeat(40));
        let secret = resolve_secret(&opts, &env(&[("MARKETING_SECRET", &"y".repeat(40))])).unwrap();
        assert_eq!(secret, "x".repeat(40));
    }

    #[test]
    fn prefixed_env_then_shared_env() {
        let opts = MarketingOptions::framework();
        let lookup = env(&[("FRAMEWORK_SECRET", &"f".repeat(32)), ("BETTER_MARKETING_SECRET", &"b".repeat(32))]);
        assert_eq!(resolve_secret(&opts, &lookup).unwrap(), "f".repeat(32));
        let lookup = env(&[("BETTER_MARKETING_SECRET", &"b".repeat(32))]);
        assert_eq!(resolve_secret(&opts, &lookup).unwrap(), "b".repeat(32));
    }

    #[test]
    fn default_secret_is_rejected_in_production() {
        let opts = MarketingOptions::marketing();
        assert_eq!(resolve_secret(&opts, &env(&[])).unwrap(), DEFAULT_SECRET);
        let err = resolve_secret(&opts, &env(&[("APP_ENV", "production")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSecret(k) if k == "MARKETING_SECRET"));
    }

    #[test]
    fn short_secret_is_rejected() {
        let opts = MarketingOptions::marketing().secret("short");
        assert!(matches!(
            resolve_secret(&opts, &env(&[])),
            Err(ConfigError::SecretTooShort { min: 32, len: 5 })
        ));
    }

    #[test]
    fn base_path_is_normalized() {
        assert_eq!(normalize_base_path("/api/marketing/").unwrap(), "/api/marketing");
        assert_eq!(normalize_base_path("/").unwrap(), "");
        assert!(normalize_base_path("api").is_err());
    }

    #[test]
    fn rate_limit_bounds() {
        let opts = MarketingOptions::marketing().rate_limit(RateLimitOptions {
            enabled: true,
            window: Duration::ZERO,
            max: 10,
        });
        assert!(matches!(validate_rate_limit(&opts), Err(ConfigError::RateLimit(_))));
    }
}
