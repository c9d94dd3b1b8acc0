// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration type definitions.
//!
//! Defines the recognized options, resolved entries with their provenance,
//! and the typed settings view consumed by the activation state machine.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// License/credential for the telemetry backend.
pub const LICENSE_KEY: &str = "NEW_RELIC_LICENSE_KEY";

/// Application display name shown in the backend UI.
pub const APP_NAME: &str = "NEW_RELIC_APP_NAME";

/// Free-form deployment environment tag.
pub const ENVIRONMENT: &str = "NEW_RELIC_ENVIRONMENT";

/// Log verbosity for the agent and this process.
pub const LOG_LEVEL: &str = "NEW_RELIC_LOG_LEVEL";

/// Path to the agent's static configuration artifact.
pub const CONFIG_FILE: &str = "NEW_RELIC_CONFIG_FILE";

/// Host knob bounding workload initialization, in milliseconds.
pub const INIT_TIMEOUT_MS: &str = "ACTIVATION_INIT_TIMEOUT_MS";

/// Default application display name.
pub const DEFAULT_APP_NAME: &str = "LangGraph Agent";

/// Default deployment environment tag.
pub const DEFAULT_ENVIRONMENT: &str = "unspecified";

/// Default static configuration artifact path inside the image.
pub const DEFAULT_CONFIG_FILE: &str = "/deps/newrelic.ini";

/// Default initialization budget.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether an option must be supplied by some source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Required,
    Optional { fallback: &'static str },
}

/// A recognized option name and how to fill it when nothing provides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub key: &'static str,
    pub requirement: Requirement,
}

impl OptionSpec {
    pub const fn required(key: &'static str) -> Self {
        Self {
            key,
            requirement: Requirement::Required,
        }
    }

    pub const fn optional(key: &'static str, fallback: &'static str) -> Self {
        Self {
            key,
            requirement: Requirement::Optional { fallback },
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self.requirement, Requirement::Required)
    }
}

/// The option set consumed by activation, in resolution order.
pub const RECOGNIZED_OPTIONS: &[OptionSpec] = &[
    OptionSpec::required(LICENSE_KEY),
    OptionSpec::optional(APP_NAME, DEFAULT_APP_NAME),
    OptionSpec::optional(ENVIRONMENT, DEFAULT_ENVIRONMENT),
    OptionSpec::optional(LOG_LEVEL, "info"),
    OptionSpec::optional(CONFIG_FILE, DEFAULT_CONFIG_FILE),
];

/// Where a resolved value came from. Ordered from highest to lowest precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigSource {
    /// Set explicitly in the runtime environment (deployment secret).
    DeploymentSecret,
    /// Baked into the image's defaults file.
    BakedImageDefault,
    /// Compiled into this crate.
    HardCodedDefault,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::DeploymentSecret => write!(f, "explicit-deployment-secret"),
            ConfigSource::BakedImageDefault => write!(f, "baked-image-default"),
            ConfigSource::HardCodedDefault => write!(f, "hard-coded-default"),
        }
    }
}

/// A resolved (key, value, source) triple.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub source: ConfigSource,
}

impl ConfigEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>, source: ConfigSource) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            source,
        }
    }

    /// Value safe to print: the credential is masked.
    pub fn display_value(&self) -> String {
        if self.key == LICENSE_KEY {
            redact(&self.value)
        } else {
            self.value.clone()
        }
    }
}

impl fmt::Debug for ConfigEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigEntry")
            .field("key", &self.key)
            .field("value", &self.display_value())
            .field("source", &self.source)
            .finish()
    }
}

/// Mapping from option name to its resolved entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    entries: BTreeMap<String, ConfigEntry>,
}

impl ResolvedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: ConfigEntry) {
        self.entries.insert(entry.key.clone(), entry);
    }

    pub fn get(&self, key: &str) -> Option<&ConfigEntry> {
        self.entries.get(key)
    }

    /// Get just the value for a key.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.value.as_str())
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of resolving the recognized option set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Every required option has a value.
    Complete(ResolvedConfig),
    /// One or more required options had no value from any source.
    /// Optional options are still resolved in `config`.
    Incomplete {
        config: ResolvedConfig,
        missing: Vec<&'static str>,
    },
}

impl Resolution {
    pub fn config(&self) -> &ResolvedConfig {
        match self {
            Resolution::Complete(config) => config,
            Resolution::Incomplete { config, .. } => config,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Resolution::Complete(_))
    }

    /// Required keys nothing provided.
    pub fn missing(&self) -> &[&'static str] {
        match self {
            Resolution::Complete(_) => &[],
            Resolution::Incomplete { missing, .. } => missing,
        }
    }
}

/// Log verbosity, ordered from least to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    /// Parse a verbosity, falling back to `Info` for anything unrecognized.
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(value = %value, "Unrecognized log level, using info");
            LogLevel::Info
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Telemetry backend credential. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the raw secret. Only the agent should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential({})", redact(&self.0))
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&redact(&self.0))
    }
}

fn redact(secret: &str) -> String {
    let tail: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if secret.chars().count() <= 8 {
        "****".to_string()
    } else {
        format!("****{}", tail)
    }
}

/// Typed view of a resolution, as consumed by activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationSettings {
    /// `None` when the credential is missing and monitoring must stay inactive.
    pub license_key: Option<Credential>,
    pub app_name: String,
    pub environment: String,
    pub log_level: LogLevel,
    pub config_file: PathBuf,
    pub init_timeout: Duration,
}

impl ActivationSettings {
    /// Build settings from a resolution. Optional keys always have a value after
    /// resolution; the hard-coded defaults cover any gap.
    pub fn from_resolution(resolution: &Resolution) -> Self {
        let config = resolution.config();
        let value_or = |key: &str, fallback: &str| {
            config.value(key).map(str::to_string).unwrap_or_else(|| fallback.to_string())
        };

        Self {
            license_key: config.value(LICENSE_KEY).map(Credential::new),
            app_name: value_or(APP_NAME, DEFAULT_APP_NAME),
            environment: value_or(ENVIRONMENT, DEFAULT_ENVIRONMENT),
            log_level: LogLevel::parse_lenient(&value_or(LOG_LEVEL, "info")),
            config_file: PathBuf::from(value_or(CONFIG_FILE, DEFAULT_CONFIG_FILE)),
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Monitoring is active only when a credential was resolved.
    pub fn monitoring_enabled(&self) -> bool {
        self.license_key.is_some()
    }
}
