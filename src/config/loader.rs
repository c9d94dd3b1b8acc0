// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration sources.
//!
//! Reads explicit values from the runtime environment and baked-in defaults
//! from a JSON or YAML file shipped inside the image.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

use super::types::{DEFAULT_INIT_TIMEOUT, INIT_TIMEOUT_MS};

/// Environment variable naming the baked defaults file.
pub const BAKED_DEFAULTS_ENV: &str = "ACTIVATION_BAKED_DEFAULTS";

/// Baked defaults file location when [`BAKED_DEFAULTS_ENV`] is unset.
pub const DEFAULT_BAKED_DEFAULTS_PATH: &str = "/deps/activation-defaults.json";

/// A source of explicitly provided runtime values.
pub trait EnvSource {
    /// Look up a key. Empty values are treated as unset.
    fn get(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).filter(|v| !v.trim().is_empty()).cloned()
    }
}

/// Defaults baked into the image at build time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BakedDefaults {
    values: BTreeMap<String, String>,
}

impl BakedDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Path of the baked defaults file for this environment.
pub fn baked_defaults_path(env: &dyn EnvSource) -> PathBuf {
    env.get(BAKED_DEFAULTS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BAKED_DEFAULTS_PATH))
}

/// Load baked defaults. A missing file means the image baked nothing.
pub fn load_baked_defaults(path: &Path) -> Result<BakedDefaults, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No baked defaults file");
        return Ok(BakedDefaults::default());
    }

    let content = std::fs::read_to_string(path)?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let raw: BTreeMap<String, serde_json::Value> = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };

    let mut values = BTreeMap::new();
    for (key, value) in raw {
        let value = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(s) => s,
            serde_json::Value::Bool(b) => b.to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(ConfigError::InvalidValue {
                    field: key,
                    message: format!("expected a scalar, got {}", other),
                })
            }
        };
        values.insert(key, value);
    }

    tracing::debug!(path = %path.display(), count = values.len(), "Loaded baked defaults");
    Ok(BakedDefaults { values })
}

/// Initialization budget: runtime environment, then baked defaults, then the default.
pub fn init_timeout(env: &dyn EnvSource, baked: &BakedDefaults) -> Result<Duration, ConfigError> {
    let raw = match env.get(INIT_TIMEOUT_MS) {
        Some(raw) => raw,
        None => match baked.get(INIT_TIMEOUT_MS) {
            Some(raw) => raw.to_string(),
            None => return Ok(DEFAULT_INIT_TIMEOUT),
        },
    };
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| ConfigError::InvalidValue {
            field: INIT_TIMEOUT_MS.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_map_env_treats_empty_as_unset() {
        let env = env(&[("A", "1"), ("B", ""), ("C", "   ")]);
        assert_eq!(EnvSource::get(&env, "A"), Some("1".to_string()));
        assert_eq!(EnvSource::get(&env, "B"), None);
        assert_eq!(EnvSource::get(&env, "C"), None);
        assert_eq!(EnvSource::get(&env, "D"), None);
    }

    #[test]
    fn test_baked_defaults_path() {
        assert_eq!(
            baked_defaults_path(&env(&[])),
            PathBuf::from(DEFAULT_BAKED_DEFAULTS_PATH)
        );
        assert_eq!(
            baked_defaults_path(&env(&[(BAKED_DEFAULTS_ENV, "/tmp/x.yaml")])),
            PathBuf::from("/tmp/x.yaml")
        );
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let defaults = load_baked_defaults(&temp.path().join("nope.json")).unwrap();
        assert!(defaults.is_empty());
    }

    #[test]
    fn test_load_json_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("defaults.json");
        std::fs::write(
            &path,
            r#"{"NEW_RELIC_APP_NAME": "billing", "ACTIVATION_INIT_TIMEOUT_MS": 5000, "X": null}"#,
        )
        .unwrap();

        let defaults = load_baked_defaults(&path).unwrap();
        assert_eq!(defaults.get("NEW_RELIC_APP_NAME"), Some("billing"));
        assert_eq!(defaults.get("ACTIVATION_INIT_TIMEOUT_MS"), Some("5000"));
        assert_eq!(defaults.get("X"), None);
        assert_eq!(defaults.len(), 2);
    }

    #[test]
    fn test_load_yaml_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("defaults.yaml");
        std::fs::write(&path, "NEW_RELIC_ENVIRONMENT: staging\nNEW_RELIC_LOG_LEVEL: debug\n").unwrap();

        let defaults = load_baked_defaults(&path).unwrap();
        assert_eq!(defaults.get("NEW_RELIC_ENVIRONMENT"), Some("staging"));
        assert_eq!(defaults.get("NEW_RELIC_LOG_LEVEL"), Some("debug"));
    }

    #[test]
    fn test_load_malformed_defaults_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("defaults.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_baked_defaults(&path), Err(ConfigError::JsonError(_))));

        std::fs::write(&path, r#"{"NEW_RELIC_APP_NAME": ["a", "b"]}"#).unwrap();
        assert!(matches!(
            load_baked_defaults(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_init_timeout() {
        let none = BakedDefaults::new();
        assert_eq!(init_timeout(&env(&[]), &none).unwrap(), DEFAULT_INIT_TIMEOUT);
        assert_eq!(
            init_timeout(&env(&[(INIT_TIMEOUT_MS, "250")]), &none).unwrap(),
            Duration::from_millis(250)
        );
        assert!(init_timeout(&env(&[(INIT_TIMEOUT_MS, "soon")]), &none).is_err());
    }

    #[test]
    fn test_init_timeout_honors_baked_value() {
        let baked = BakedDefaults::new().with(INIT_TIMEOUT_MS, "5000");
        assert_eq!(
            init_timeout(&env(&[]), &baked).unwrap(),
            Duration::from_millis(5000)
        );
        assert_eq!(
            init_timeout(&env(&[(INIT_TIMEOUT_MS, "750")]), &baked).unwrap(),
            Duration::from_millis(750)
        );

        let bad = BakedDefaults::new().with(INIT_TIMEOUT_MS, "later");
        assert!(matches!(
            init_timeout(&env(&[]), &bad),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
