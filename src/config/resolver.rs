// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Option resolution.
//!
//! Resolves each recognized option with precedence
//! explicit deployment secret > baked image default > hard-coded default.

use super::loader::{BakedDefaults, EnvSource};
use super::types::{
    ConfigEntry, ConfigSource, OptionSpec, Requirement, Resolution, ResolvedConfig,
    RECOGNIZED_OPTIONS,
};

/// Resolves a fixed set of recognized options against the available sources.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    specs: Vec<OptionSpec>,
}

impl ConfigResolver {
    /// Create a resolver for an arbitrary option set.
    pub fn new(specs: impl IntoIterator<Item = OptionSpec>) -> Self {
        Self {
            specs: specs.into_iter().collect(),
        }
    }

    /// The options this resolver knows about.
    pub fn specs(&self) -> &[OptionSpec] {
        &self.specs
    }

    /// Resolve every option. Never fails: a required option nothing provides
    /// is reported through [`Resolution::Incomplete`].
    pub fn resolve(&self, env: &dyn EnvSource, baked: &BakedDefaults) -> Resolution {
        let mut config = ResolvedConfig::new();
        let mut missing = Vec::new();

        for spec in &self.specs {
            match resolve_one(spec, env, baked) {
                Some(entry) => {
                    tracing::trace!(key = spec.key, source = %entry.source, "Resolved option");
                    config.insert(entry);
                }
                None => {
                    tracing::debug!(key = spec.key, "Required option has no value");
                    missing.push(spec.key);
                }
            }
        }

        if missing.is_empty() {
            Resolution::Complete(config)
        } else {
            Resolution::Incomplete { config, missing }
        }
    }
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(RECOGNIZED_OPTIONS.iter().copied())
    }
}

fn resolve_one(spec: &OptionSpec, env: &dyn EnvSource, baked: &BakedDefaults) -> Option<ConfigEntry> {
    if let Some(value) = env.get(spec.key) {
        return Some(ConfigEntry::new(spec.key, value, ConfigSource::DeploymentSecret));
    }

    if let Some(value) = baked.get(spec.key) {
        return Some(ConfigEntry::new(spec.key, value, ConfigSource::BakedImageDefault));
    }

    match spec.requirement {
        Requirement::Optional { fallback } => {
            Some(ConfigEntry::new(spec.key, fallback, ConfigSource::HardCodedDefault))
        }
        Requirement::Required => None,
    }
}
