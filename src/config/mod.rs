// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module for activation.
//!
//! Handles resolving the recognized options from multiple sources:
//! - Runtime environment: deployment secrets injected by the platform
//! - Baked defaults: a JSON/YAML map shipped inside the image
//! - Hard-coded defaults compiled into this crate
//!
//! Values are resolved with precedence (runtime > baked > hard-coded). A missing
//! required option is reported, not raised, so callers can decide policy.

mod loader;
mod resolver;
mod types;

// Re-export public types
pub use loader::{
    baked_defaults_path, init_timeout, load_baked_defaults, BakedDefaults, EnvSource, ProcessEnv,
    BAKED_DEFAULTS_ENV, DEFAULT_BAKED_DEFAULTS_PATH,
};

pub use resolver::ConfigResolver;

pub use types::{
    ActivationSettings, ConfigEntry, ConfigSource, Credential, LogLevel, OptionSpec, Requirement,
    Resolution, ResolvedConfig, APP_NAME, CONFIG_FILE, DEFAULT_APP_NAME, DEFAULT_CONFIG_FILE,
    DEFAULT_ENVIRONMENT, DEFAULT_INIT_TIMEOUT, ENVIRONMENT, INIT_TIMEOUT_MS, LICENSE_KEY,
    LOG_LEVEL, RECOGNIZED_OPTIONS,
};

use crate::error::ConfigError;

/// Resolve the recognized options from an environment and its baked defaults file.
///
/// This is the main entry point for configuration loading. Only I/O and parse
/// problems with the baked defaults are errors.
pub fn load_config(env: &dyn EnvSource) -> Result<Resolution, ConfigError> {
    let baked = load_baked_defaults(&baked_defaults_path(env))?;
    Ok(ConfigResolver::default().resolve(env, &baked))
}

/// Resolve options and build the typed settings view, including the init budget.
///
/// The baked defaults file is read once and feeds both the options and the budget.
pub fn load_settings(env: &dyn EnvSource) -> Result<(Resolution, ActivationSettings), ConfigError> {
    let baked = load_baked_defaults(&baked_defaults_path(env))?;
    let resolution = ConfigResolver::default().resolve(env, &baked);
    let settings =
        ActivationSettings::from_resolution(&resolution).with_init_timeout(init_timeout(env, &baked)?);
    Ok((resolution, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_with_baked_file() {
        let temp = TempDir::new().unwrap();
        let baked = temp.path().join("defaults.json");
        std::fs::write(&baked, r#"{"NEW_RELIC_ENVIRONMENT": "prod"}"#).unwrap();

        let mut env = HashMap::new();
        env.insert(BAKED_DEFAULTS_ENV.to_string(), baked.display().to_string());
        env.insert(LICENSE_KEY.to_string(), "secret-license-key".to_string());

        let resolution = load_config(&env).unwrap();
        assert!(resolution.is_complete());
        let entry = resolution.config().get(ENVIRONMENT).unwrap();
        assert_eq!(entry.value, "prod");
        assert_eq!(entry.source, ConfigSource::BakedImageDefault);
    }

    #[test]
    fn test_load_settings_timeout_override() {
        let temp = TempDir::new().unwrap();
        let mut env = HashMap::new();
        env.insert(
            BAKED_DEFAULTS_ENV.to_string(),
            temp.path().join("absent.json").display().to_string(),
        );
        env.insert(INIT_TIMEOUT_MS.to_string(), "1500".to_string());

        let (resolution, settings) = load_settings(&env).unwrap();
        assert!(!resolution.is_complete());
        assert!(!settings.monitoring_enabled());
        assert_eq!(settings.init_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_load_settings_baked_timeout() {
        let temp = TempDir::new().unwrap();
        let baked = temp.path().join("defaults.json");
        std::fs::write(&baked, r#"{"ACTIVATION_INIT_TIMEOUT_MS": 5000}"#).unwrap();

        let mut env = HashMap::new();
        env.insert(BAKED_DEFAULTS_ENV.to_string(), baked.display().to_string());
        let (_, settings) = load_settings(&env).unwrap();
        assert_eq!(settings.init_timeout, Duration::from_millis(5000));

        env.insert(INIT_TIMEOUT_MS.to_string(), "1200".to_string());
        let (_, settings) = load_settings(&env).unwrap();
        assert_eq!(settings.init_timeout, Duration::from_millis(1200));
    }

    #[test]
    fn test_load_config_malformed_baked_file() {
        let temp = TempDir::new().unwrap();
        let baked = temp.path().join("defaults.yaml");
        std::fs::write(&baked, "- 1\n- 2\n").unwrap();

        let mut env = HashMap::new();
        env.insert(BAKED_DEFAULTS_ENV.to_string(), baked.display().to_string());
        assert!(load_config(&env).is_err());
    }
}
