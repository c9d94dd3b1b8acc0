// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for agent activation.
//!
//! This module provides strongly-typed errors for each stage of startup,
//! using `thiserror` for ergonomic error definitions and `anyhow` for error propagation
//! in the binary.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while resolving activation configuration.
///
/// A missing required option is *not* an error: it is reported as
/// [`crate::config::Resolution::Incomplete`] so callers can degrade.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("IO error reading baked defaults: {0}")]
    IoError(String),

    #[error("YAML parsing error: {0}")]
    YamlError(String),

    #[error("JSON parsing error: {0}")]
    JsonError(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}

/// Errors raised by hook modules when one of their attributes is invoked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("Server already bootstrapped by the platform: {0}")]
    ServerAlreadyBootstrapped(String),

    #[error("Module {module} has no attribute {attr}")]
    UnknownAttribute { module: String, attr: String },
}

/// Errors that can occur while installing a hook suppression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShimError {
    #[error("Module resolution cannot be intercepted for {0}")]
    InterceptionUnavailable(String),

    #[error("Invalid module identity: {0:?}")]
    InvalidIdentity(String),
}

/// Errors that can occur while bringing up the telemetry agent.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Agent configuration artifact {path} is unreadable: {message}")]
    ArtifactUnreadable { path: PathBuf, message: String },

    #[error("Invalid agent configuration artifact: {0}")]
    InvalidArtifact(String),

    #[error("Hook error: {0}")]
    Hook(#[from] HookError),
}

/// Errors produced by the workload's initialization function.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Initialization failed: {0}")]
    Failed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Initialization panicked: {0}")]
    Panicked(String),
}

impl InitError {
    /// Wrap any error returned by an init function, keeping it as the source.
    pub fn failed<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Failed(err.into())
    }
}

/// Errors that can occur inside the monitored workload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkloadError {
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Node {node} failed: {message}")]
    NodeFailed { node: String, message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using anyhow for flexible error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_from_json() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("invalid json");
        let json_err = result.unwrap_err();
        let config_err: ConfigError = json_err.into();
        assert!(matches!(config_err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_agent_error_from_hook() {
        let hook_err = HookError::ServerAlreadyBootstrapped("config".to_string());
        let agent_err: AgentError = hook_err.into();
        assert!(matches!(agent_err, AgentError::Hook(_)));
    }

    #[test]
    fn test_init_error_keeps_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "graph exploded");
        let err = InitError::failed(io_err);
        let source = std::error::Error::source(&err).expect("source preserved");
        assert_eq!(source.to_string(), "graph exploded");
    }

    #[test]
    fn test_error_display() {
        let err = AgentError::ArtifactUnreadable {
            path: PathBuf::from("/deps/newrelic.ini"),
            message: "No such file".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("/deps/newrelic.ini"));
        assert!(display.contains("No such file"));
    }

    #[test]
    fn test_hook_error_display() {
        let errors = [
            HookError::ServerAlreadyBootstrapped("run".to_string()),
            HookError::UnknownAttribute {
                module: "newrelic.hooks.adapter_uvicorn".to_string(),
                attr: "instrument".to_string(),
            },
        ];
        for err in errors {
            let display = err.to_string();
            match err {
                HookError::ServerAlreadyBootstrapped(_) => assert!(display.contains("already bootstrapped")),
                HookError::UnknownAttribute { .. } => assert!(display.contains("no attribute instrument")),
            }
        }
    }

    #[test]
    fn test_config_error_invalid_value_display() {
        let err = ConfigError::InvalidValue {
            field: "ACTIVATION_INIT_TIMEOUT_MS".to_string(),
            message: "invalid digit found in string".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for ACTIVATION_INIT_TIMEOUT_MS: invalid digit found in string"
        );
    }
}
