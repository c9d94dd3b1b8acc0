// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Agent settings from the static configuration artifact.
//!
//! The artifact is normally the agent's own INI file: a `[newrelic]` section,
//! optionally followed by `[newrelic:<environment>]` overrides. JSON and YAML
//! files with the same keys are accepted by extension.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigSource, ResolvedConfig, APP_NAME, DEFAULT_APP_NAME, DEFAULT_ENVIRONMENT, ENVIRONMENT};
use crate::error::AgentError;

/// Contents of the artifact file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentArtifact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub distributed_tracing: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_monitoring: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_tracer: Option<bool>,
}

/// Effective agent settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSettings {
    pub artifact_path: PathBuf,
    pub app_name: String,
    pub environment: String,
    pub distributed_tracing: bool,
    pub ai_monitoring: bool,
    pub transaction_tracer: bool,
}

impl AgentSettings {
    /// Read the artifact at `path` and merge it with the resolved options.
    ///
    /// An app name set in the environment or baked defaults beats the
    /// artifact's; the artifact beats the hard-coded fallback.
    pub fn load(path: &Path, resolved: &ResolvedConfig) -> Result<Self, AgentError> {
        let environment = resolved
            .value(ENVIRONMENT)
            .unwrap_or(DEFAULT_ENVIRONMENT)
            .to_string();
        let artifact = load_artifact(path, &environment)?;

        let app_name = match resolved.get(APP_NAME) {
            Some(entry) if entry.source != ConfigSource::HardCodedDefault => entry.value.clone(),
            fallback => artifact
                .app_name
                .clone()
                .or_else(|| fallback.map(|e| e.value.clone()))
                .unwrap_or_else(|| DEFAULT_APP_NAME.to_string()),
        };

        Ok(Self {
            artifact_path: path.to_path_buf(),
            app_name,
            environment,
            distributed_tracing: artifact.distributed_tracing.unwrap_or(true),
            ai_monitoring: artifact.ai_monitoring.unwrap_or(true),
            transaction_tracer: artifact.transaction_tracer.unwrap_or(true),
        })
    }
}

/// Load the artifact file for `environment`.
///
/// `.json`, `.yaml` and `.yml` files are parsed as such; anything else is
/// read as the agent's INI format.
pub fn load_artifact(path: &Path, environment: &str) -> Result<AgentArtifact, AgentError> {
    let content = std::fs::read_to_string(path).map_err(|e| AgentError::ArtifactUnreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if content.trim().is_empty() {
        return Ok(AgentArtifact::default());
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "json" => serde_json::from_str(&content).map_err(|e| AgentError::InvalidArtifact(e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| AgentError::InvalidArtifact(e.to_string())),
        _ => parse_ini(&content, environment),
    }
}

const INI_SECTION: &str = "newrelic";

/// Read the `[newrelic]` section, then apply `[newrelic:<environment>]`.
///
/// Keys the agent reads for itself (the license key, log settings) are ignored.
fn parse_ini(content: &str, environment: &str) -> Result<AgentArtifact, AgentError> {
    let env_section = format!("{}:{}", INI_SECTION, environment);
    let mut base = AgentArtifact::default();
    let mut overrides = AgentArtifact::default();
    let mut target: Option<&mut AgentArtifact> = None;

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(section) = line.strip_prefix('[') {
            let name = section
                .strip_suffix(']')
                .ok_or_else(|| ini_error(index, "unterminated section header"))?
                .trim();
            target = if name == INI_SECTION {
                Some(&mut base)
            } else if name == env_section {
                Some(&mut overrides)
            } else {
                None
            };
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| ini_error(index, "expected key = value"))?;
        let Some(artifact) = target.as_deref_mut() else {
            continue;
        };

        let value = value.trim();
        match key.trim() {
            "app_name" => artifact.app_name = Some(value.to_string()),
            "distributed_tracing.enabled" => artifact.distributed_tracing = Some(ini_bool(index, value)?),
            "ai_monitoring.enabled" => artifact.ai_monitoring = Some(ini_bool(index, value)?),
            "transaction_tracer.enabled" => artifact.transaction_tracer = Some(ini_bool(index, value)?),
            _ => {}
        }
    }

    Ok(AgentArtifact {
        app_name: overrides.app_name.or(base.app_name),
        distributed_tracing: overrides.distributed_tracing.or(base.distributed_tracing),
        ai_monitoring: overrides.ai_monitoring.or(base.ai_monitoring),
        transaction_tracer: overrides.transaction_tracer.or(base.transaction_tracer),
    })
}

fn ini_bool(index: usize, value: &str) -> Result<bool, AgentError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => Err(ini_error(index, &format!("expected a boolean, got {:?}", other))),
    }
}

fn ini_error(index: usize, message: &str) -> AgentError {
    AgentError::InvalidArtifact(format!("line {}: {}", index + 1, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigEntry;
    use tempfile::TempDir;

    fn resolved(app: Option<(&str, ConfigSource)>) -> ResolvedConfig {
        let mut config = ResolvedConfig::new();
        if let Some((value, source)) = app {
            config.insert(ConfigEntry::new(APP_NAME, value, source));
        }
        config.insert(ConfigEntry::new(ENVIRONMENT, "staging", ConfigSource::DeploymentSecret));
        config
    }

    #[test]
    fn test_missing_artifact_is_unreadable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("newrelic.yml");
        let err = AgentSettings::load(&path, &resolved(None)).unwrap_err();
        assert!(matches!(err, AgentError::ArtifactUnreadable { .. }));
    }

    #[test]
    fn test_empty_artifact_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("newrelic.yml");
        std::fs::write(&path, "").unwrap();

        let settings = AgentSettings::load(&path, &resolved(None)).unwrap();
        assert_eq!(settings.app_name, DEFAULT_APP_NAME);
        assert_eq!(settings.environment, "staging");
        assert!(settings.distributed_tracing);
        assert!(settings.ai_monitoring);
        assert!(settings.transaction_tracer);
    }

    #[test]
    fn test_artifact_beats_hard_coded_app_name() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("newrelic.yml");
        std::fs::write(&path, "app_name: from-artifact\nai_monitoring: false\n").unwrap();

        let settings = AgentSettings::load(
            &path,
            &resolved(Some((DEFAULT_APP_NAME, ConfigSource::HardCodedDefault))),
        )
        .unwrap();
        assert_eq!(settings.app_name, "from-artifact");
        assert!(!settings.ai_monitoring);
    }

    #[test]
    fn test_explicit_app_name_beats_artifact() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("newrelic.json");
        std::fs::write(&path, r#"{"app_name": "from-artifact"}"#).unwrap();

        let settings = AgentSettings::load(
            &path,
            &resolved(Some(("from-env", ConfigSource::DeploymentSecret))),
        )
        .unwrap();
        assert_eq!(settings.app_name, "from-env");
    }

    #[test]
    fn test_malformed_artifact() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("newrelic.json");
        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            load_artifact(&path, "staging"),
            Err(AgentError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn test_ini_artifact_reads_newrelic_section() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("newrelic.ini");
        std::fs::write(
            &path,
            "# agent config\n[newrelic]\nlicense_key = abc\napp_name = My App\n\
             distributed_tracing.enabled = true\nai_monitoring.enabled = false\n\
             \n[import-hook:other]\napp_name = ignored\n",
        )
        .unwrap();

        let settings = AgentSettings::load(
            &path,
            &resolved(Some((DEFAULT_APP_NAME, ConfigSource::HardCodedDefault))),
        )
        .unwrap();
        assert_eq!(settings.app_name, "My App");
        assert!(settings.distributed_tracing);
        assert!(!settings.ai_monitoring);
        assert!(settings.transaction_tracer);
    }

    #[test]
    fn test_ini_environment_section_overrides() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("newrelic.ini");
        std::fs::write(
            &path,
            "[newrelic]\napp_name = base\ntransaction_tracer.enabled = on\n\
             [newrelic:staging]\ntransaction_tracer.enabled = off\n\
             [newrelic:production]\napp_name = prod-only\n",
        )
        .unwrap();

        let artifact = load_artifact(&path, "staging").unwrap();
        assert_eq!(artifact.app_name.as_deref(), Some("base"));
        assert_eq!(artifact.transaction_tracer, Some(false));

        let artifact = load_artifact(&path, "production").unwrap();
        assert_eq!(artifact.app_name.as_deref(), Some("prod-only"));
        assert_eq!(artifact.transaction_tracer, Some(true));
    }

    #[test]
    fn test_malformed_ini_artifact() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("newrelic.ini");

        std::fs::write(&path, "[newrelic\napp_name = x\n").unwrap();
        assert!(matches!(
            load_artifact(&path, "staging"),
            Err(AgentError::InvalidArtifact(m)) if m.starts_with("line 1")
        ));

        std::fs::write(&path, "[newrelic]\nai_monitoring.enabled = maybe\n").unwrap();
        assert!(matches!(
            load_artifact(&path, "staging"),
            Err(AgentError::InvalidArtifact(m)) if m.starts_with("line 2")
        ));
    }
}
