//! Counter subsystem configuration.
//!
//! # Responsibility
//! - Hold cache, marker and default-value settings.
//! - Load settings from JSON and apply `COUNTER_*` environment overrides.
//!
//! # Invariants
//! - Every field has a default, so an empty document is a valid config.
//! - Override values that fail to parse are rejected, never ignored.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_CACHE_PREFIX: &str = "counters:";
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_COOKIE_PREFIX: &str = "counters-cookie-";
const DEFAULT_COOKIE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 365;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Prepended to a counter key to form its cache entry name.
    pub prefix: String,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: DEFAULT_CACHE_PREFIX.to_string(),
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Prepended to a counter key to form its marker name.
    pub prefix: String,
    pub max_age_secs: u64,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_COOKIE_PREFIX.to_string(),
            max_age_secs: DEFAULT_COOKIE_MAX_AGE_SECS,
        }
    }
}

impl CookieConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub initial_value: i64,
    pub step: i64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            initial_value: 0,
            step: 1,
        }
    }
}

/// Top-level configuration for `Counters`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountersConfig {
    pub cache: CacheConfig,
    pub cookies: CookieConfig,
    pub defaults: DefaultsConfig,
}

impl CountersConfig {
    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(source).map_err(ConfigError::Parse)
    }

    /// Reads a JSON config file and applies process environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.display().to_string(),
            source: err,
        })?;
        let mut config = Self::from_json_str(&source)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Defaults plus process environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies `COUNTER_*` overrides resolved through `lookup`.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup("COUNTER_CACHE_ENABLED") {
            self.cache.enabled = parse_bool("COUNTER_CACHE_ENABLED", &value)?;
        }
        if let Some(value) = lookup("COUNTER_CACHE_PREFIX") {
            self.cache.prefix = value;
        }
        if let Some(value) = lookup("COUNTER_CACHE_TTL") {
            self.cache.ttl_secs = parse_number("COUNTER_CACHE_TTL", &value)?;
        }
        if let Some(value) = lookup("COUNTER_COOKIE_PREFIX") {
            self.cookies.prefix = value;
        }
        if let Some(value) = lookup("COUNTER_COOKIE_LIFETIME") {
            self.cookies.max_age_secs = parse_number("COUNTER_COOKIE_LIFETIME", &value)?;
        }
        if let Some(value) = lookup("COUNTER_DEFAULT_INITIAL_VALUE") {
            self.defaults.initial_value = parse_number("COUNTER_DEFAULT_INITIAL_VALUE", &value)?;
        }
        if let Some(value) = lookup("COUNTER_DEFAULT_STEP") {
            self.defaults.step = parse_number("COUNTER_DEFAULT_STEP", &value)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: String,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    InvalidOverride {
        variable: &'static str,
        value: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "failed to read config `{path}`: {source}"),
            Self::Parse(err) => write!(f, "invalid counters config: {err}"),
            Self::InvalidOverride { variable, value } => {
                write!(f, "invalid value `{value}` for {variable}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidOverride { .. } => None,
        }
    }
}

fn parse_bool(variable: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidOverride {
            variable,
            value: value.to_string(),
        }),
    }
}

fn parse_number<T: FromStr>(variable: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOverride {
            variable,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CountersConfig};
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn empty_document_yields_defaults() {
        let config = CountersConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CountersConfig::default());
        assert!(config.cache.enabled);
        assert_eq!(config.cache.prefix, "counters:");
        assert_eq!(config.cache.ttl(), Duration::from_secs(3600));
        assert_eq!(config.cookies.prefix, "counters-cookie-");
        assert_eq!(config.cookies.max_age(), Duration::from_secs(31_536_000));
        assert_eq!(config.defaults.step, 1);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let config =
            CountersConfig::from_json_str(r#"{"cache": {"ttl_secs": 30}, "defaults": {"step": 5}}"#)
                .unwrap();
        assert_eq!(config.cache.ttl_secs, 30);
        assert_eq!(config.cache.prefix, "counters:");
        assert_eq!(config.defaults.step, 5);
        assert_eq!(config.defaults.initial_value, 0);
    }

    #[test]
    fn env_overrides_replace_document_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("COUNTER_CACHE_ENABLED", "false"),
            ("COUNTER_CACHE_PREFIX", "app:counters:"),
            ("COUNTER_COOKIE_LIFETIME", "60"),
            ("COUNTER_DEFAULT_INITIAL_VALUE", "-4"),
        ]);
        let mut config = CountersConfig::default();
        config
            .apply_env_overrides(|name| env.get(name).map(|value| value.to_string()))
            .unwrap();

        assert!(!config.cache.enabled);
        assert_eq!(config.cache.prefix, "app:counters:");
        assert_eq!(config.cookies.max_age_secs, 60);
        assert_eq!(config.defaults.initial_value, -4);
    }

    #[test]
    fn unparseable_override_is_rejected() {
        let mut config = CountersConfig::default();
        let err = config
            .apply_env_overrides(|name| (name == "COUNTER_CACHE_TTL").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidOverride {
                variable: "COUNTER_CACHE_TTL",
                ..
            }
        ));
    }
}
