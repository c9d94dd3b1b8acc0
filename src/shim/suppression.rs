// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Idempotent hook suppression.
//!
//! Installing a suppression puts a [`NoopHook`] in front of a hook module's
//! future lazy loads. Each identity is suppressed at most once per process;
//! repeat and concurrent installs return the first installation's record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ShimError;

use super::module::{ModuleIdentity, ModuleRegistry, NoopHook};

/// Proof that a suppression was installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuppressionRecord {
    /// Module whose future loads resolve to the stand-in.
    pub target: ModuleIdentity,
    /// When the stand-in was installed.
    pub installed_at: DateTime<Utc>,
    /// Unique per installation; repeat installs return the same token.
    pub token: Uuid,
}

/// Installs and remembers hook suppressions for one module registry.
#[derive(Debug)]
pub struct HookSuppressionShim {
    modules: Arc<ModuleRegistry>,
    records: Mutex<HashMap<ModuleIdentity, SuppressionRecord>>,
}

impl HookSuppressionShim {
    pub fn new(modules: Arc<ModuleRegistry>) -> Self {
        Self {
            modules,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// The registry stand-ins are installed into.
    pub fn modules(&self) -> &Arc<ModuleRegistry> {
        &self.modules
    }

    /// Suppress future lazy loads of `target`.
    ///
    /// The check, the installation, and the bookkeeping all happen under one
    /// lock, so concurrent callers converge on a single record and nobody sees
    /// a half-installed stand-in. Fails if the registry cannot intercept
    /// resolution; nothing is recorded in that case.
    pub fn install(&self, target: &str) -> Result<SuppressionRecord, ShimError> {
        let identity = ModuleIdentity::new(target)?;
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = records.get(&identity) {
            tracing::debug!(module = %identity, token = %existing.token, "Suppression already installed");
            return Ok(existing.clone());
        }

        if self.modules.is_loaded(&identity) {
            tracing::warn!(
                module = %identity,
                "Hook module already loaded; suppression only affects future loads"
            );
        }

        self.modules
            .intercept(&identity, Arc::new(NoopHook::new(identity.clone())))?;

        let record = SuppressionRecord {
            target: identity.clone(),
            installed_at: Utc::now(),
            token: Uuid::new_v4(),
        };
        records.insert(identity, record.clone());

        tracing::info!(module = %record.target, token = %record.token, "Installed hook suppression");
        Ok(record)
    }

    /// The record for `target`, if it has been suppressed.
    pub fn record(&self, target: &str) -> Option<SuppressionRecord> {
        let identity = ModuleIdentity::new(target).ok()?;
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.get(&identity).cloned()
    }

    /// All suppressions installed so far, ordered by target.
    pub fn records(&self) -> Vec<SuppressionRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by(|a, b| a.target.cmp(&b.target));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;

    const TARGET: &str = "newrelic.hooks.adapter_uvicorn";

    #[test]
    fn test_install_is_idempotent() {
        let shim = HookSuppressionShim::new(Arc::new(ModuleRegistry::new()));

        let first = shim.install(TARGET).unwrap();
        for _ in 0..5 {
            let again = shim.install(TARGET).unwrap();
            assert_eq!(again, first);
            assert_eq!(again.token, first.token);
            assert_eq!(again.installed_at, first.installed_at);
        }

        assert_eq!(shim.modules().interceptions(), 1);
        assert_eq!(shim.record(TARGET), Some(first));
        assert_eq!(shim.records().len(), 1);
    }

    #[test]
    fn test_distinct_targets_get_distinct_records() {
        let shim = HookSuppressionShim::new(Arc::new(ModuleRegistry::new()));
        let a = shim.install("hooks.a").unwrap();
        let b = shim.install("hooks.b").unwrap();
        assert_ne!(a.token, b.token);
        assert_eq!(shim.modules().interceptions(), 2);

        let targets: Vec<_> = shim.records().into_iter().map(|r| r.target.to_string()).collect();
        assert_eq!(targets, vec!["hooks.a", "hooks.b"]);
    }

    #[test]
    fn test_concurrent_installs_converge() {
        let shim = Arc::new(HookSuppressionShim::new(Arc::new(ModuleRegistry::new())));
        let workers = 16;
        let barrier = Arc::new(Barrier::new(workers));

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let shim = Arc::clone(&shim);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let record = shim.install(TARGET).unwrap();
                    let identity = ModuleIdentity::new(TARGET).unwrap();
                    let module = shim.modules().resolve(&identity).unwrap();
                    assert!(module.is_stand_in());
                    record
                })
            })
            .collect();

        let records: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(records.iter().all(|r| r == &records[0]));
        assert_eq!(shim.modules().interceptions(), 1);
    }

    #[test]
    fn test_install_fails_without_interception() {
        let shim = HookSuppressionShim::new(Arc::new(ModuleRegistry::sealed()));
        let err = shim.install(TARGET).unwrap_err();
        assert!(matches!(err, ShimError::InterceptionUnavailable(_)));
        assert!(shim.record(TARGET).is_none());
    }

    #[test]
    fn test_install_rejects_bad_identity() {
        let shim = HookSuppressionShim::new(Arc::new(ModuleRegistry::new()));
        assert!(matches!(shim.install(""), Err(ShimError::InvalidIdentity(_))));
        assert!(shim.record("").is_none());
    }
}
