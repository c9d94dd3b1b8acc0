// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Hook modules and the registry the agent resolves them through.
//!
//! The telemetry agent loads its instrumentation hooks lazily, by identity,
//! the first time a library it instruments starts up. [`ModuleRegistry`] is
//! that resolution table. It supports installing stand-ins ahead of a load,
//! which is what the suppression shim builds on.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{HookError, ShimError};
use crate::telemetry::metrics::GLOBAL_METRICS;

/// Dotted identity of a hook module, e.g. `newrelic.hooks.adapter_uvicorn`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleIdentity(String);

impl ModuleIdentity {
    /// Validate and create an identity. Segments must be non-empty and made of
    /// ASCII alphanumerics or underscores.
    pub fn new(raw: impl Into<String>) -> Result<Self, ShimError> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && raw.split('.').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_')
            });

        if valid {
            Ok(Self(raw))
        } else {
            Err(ShimError::InvalidIdentity(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Values passed to and returned from hook attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HookValue {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Str(String),
}

/// An instrumentation hook module, accessed by attribute name.
pub trait HookModule: Send + Sync + fmt::Debug {
    /// The identity this module was loaded under.
    fn identity(&self) -> &ModuleIdentity;

    /// Whether accessing `attr` would succeed.
    fn has_attr(&self, attr: &str) -> bool;

    /// Invoke the callable stored under `attr`.
    fn invoke(&self, attr: &str, args: &[HookValue]) -> Result<HookValue, HookError>;

    /// True for stand-ins installed by suppression.
    fn is_stand_in(&self) -> bool {
        false
    }
}

/// Stand-in whose every attribute is a callable that does nothing.
///
/// Satisfies any capability surface the agent or platform touches, so no path
/// ever sees a missing attribute.
#[derive(Debug)]
pub struct NoopHook {
    identity: ModuleIdentity,
    calls: AtomicU64,
}

impl NoopHook {
    pub fn new(identity: ModuleIdentity) -> Self {
        Self {
            identity,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of attribute invocations swallowed so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl HookModule for NoopHook {
    fn identity(&self) -> &ModuleIdentity {
        &self.identity
    }

    fn has_attr(&self, _attr: &str) -> bool {
        true
    }

    fn invoke(&self, attr: &str, _args: &[HookValue]) -> Result<HookValue, HookError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        GLOBAL_METRICS.record_suppressed_call();
        tracing::trace!(module = %self.identity, attr = %attr, "Suppressed hook call");
        Ok(HookValue::Unit)
    }

    fn is_stand_in(&self) -> bool {
        true
    }
}

/// Lazily constructs the real module for an identity.
pub type HookLoader = Arc<dyn Fn() -> Arc<dyn HookModule> + Send + Sync>;

#[derive(Default)]
struct ModuleTable {
    loaded: HashMap<ModuleIdentity, Arc<dyn HookModule>>,
    stand_ins: HashMap<ModuleIdentity, Arc<dyn HookModule>>,
    loaders: HashMap<ModuleIdentity, HookLoader>,
}

/// Resolution table for hook modules.
///
/// Resolution order: an already loaded module, then an installed stand-in,
/// then the registered loader (whose result is cached as loaded).
pub struct ModuleRegistry {
    interceptable: bool,
    table: RwLock<ModuleTable>,
    interceptions: AtomicUsize,
}

impl ModuleRegistry {
    /// A registry that allows stand-ins to be installed.
    pub fn new() -> Self {
        Self {
            interceptable: true,
            table: RwLock::new(ModuleTable::default()),
            interceptions: AtomicUsize::new(0),
        }
    }

    /// A registry with no interception mechanism. Every
    /// [`intercept`](Self::intercept) fails.
    pub fn sealed() -> Self {
        Self {
            interceptable: false,
            ..Self::new()
        }
    }

    pub fn supports_interception(&self) -> bool {
        self.interceptable
    }

    /// Register the loader for an identity, replacing any previous loader.
    pub fn register_loader(&self, identity: ModuleIdentity, loader: HookLoader) {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table.loaders.insert(identity, loader);
    }

    /// Install a stand-in that future resolutions of `identity` will return.
    ///
    /// A module that is already loaded keeps its identity and state.
    pub fn intercept(
        &self,
        identity: &ModuleIdentity,
        stand_in: Arc<dyn HookModule>,
    ) -> Result<(), ShimError> {
        if !self.interceptable {
            return Err(ShimError::InterceptionUnavailable(identity.to_string()));
        }

        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table.stand_ins.insert(identity.clone(), stand_in);
        self.interceptions.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Resolve a module, loading it on first access.
    pub fn resolve(&self, identity: &ModuleIdentity) -> Option<Arc<dyn HookModule>> {
        {
            let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(module) = table.loaded.get(identity) {
                return Some(Arc::clone(module));
            }
            if let Some(stand_in) = table.stand_ins.get(identity) {
                return Some(Arc::clone(stand_in));
            }
        }

        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        // Re-check under the write lock; another resolver may have won.
        if let Some(module) = table.loaded.get(identity) {
            return Some(Arc::clone(module));
        }
        if let Some(stand_in) = table.stand_ins.get(identity) {
            return Some(Arc::clone(stand_in));
        }

        let loader = table.loaders.get(identity).cloned()?;
        let module = loader();
        tracing::debug!(module = %identity, "Loaded hook module");
        table.loaded.insert(identity.clone(), Arc::clone(&module));
        Some(module)
    }

    /// Whether the real module for `identity` has been loaded.
    pub fn is_loaded(&self, identity: &ModuleIdentity) -> bool {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.loaded.contains_key(identity)
    }

    /// Whether a stand-in is installed for `identity`.
    pub fn is_intercepted(&self, identity: &ModuleIdentity) -> bool {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.stand_ins.contains_key(identity)
    }

    /// Total stand-in installations performed on this registry.
    pub fn interceptions(&self) -> usize {
        self.interceptions.load(Ordering::SeqCst)
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("ModuleRegistry")
            .field("interceptable", &self.interceptable)
            .field("loaded", &table.loaded.keys().collect::<Vec<_>>())
            .field("stand_ins", &table.stand_ins.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct RealHook {
        identity: ModuleIdentity,
    }

    impl HookModule for RealHook {
        fn identity(&self) -> &ModuleIdentity {
            &self.identity
        }

        fn has_attr(&self, attr: &str) -> bool {
            attr == "instrument"
        }

        fn invoke(&self, attr: &str, _args: &[HookValue]) -> Result<HookValue, HookError> {
            if self.has_attr(attr) {
                Ok(HookValue::Bool(true))
            } else {
                Err(HookError::UnknownAttribute {
                    module: self.identity.to_string(),
                    attr: attr.to_string(),
                })
            }
        }
    }

    fn id(raw: &str) -> ModuleIdentity {
        ModuleIdentity::new(raw).unwrap()
    }

    fn real_loader(identity: ModuleIdentity) -> HookLoader {
        Arc::new(move || Arc::new(RealHook { identity: identity.clone() }) as Arc<dyn HookModule>)
    }

    #[test]
    fn test_identity_validation() {
        assert!(ModuleIdentity::new("newrelic.hooks.adapter_uvicorn").is_ok());
        assert!(ModuleIdentity::new("single").is_ok());
        assert!(ModuleIdentity::new("").is_err());
        assert!(ModuleIdentity::new("a..b").is_err());
        assert!(ModuleIdentity::new("a.b-c").is_err());
    }

    #[test]
    fn test_noop_hook_answers_everything() {
        let hook = NoopHook::new(id("x.y"));
        assert!(hook.has_attr("anything"));
        assert_eq!(hook.invoke("instrument", &[]).unwrap(), HookValue::Unit);
        assert_eq!(
            hook.invoke("wrap", &[HookValue::Str("cfg".into())]).unwrap(),
            HookValue::Unit
        );
        assert_eq!(hook.calls(), 2);
        assert!(hook.is_stand_in());
    }

    #[test]
    fn test_resolve_loads_lazily_once() {
        let registry = ModuleRegistry::new();
        let identity = id("hooks.real");
        assert!(registry.resolve(&identity).is_none());

        registry.register_loader(identity.clone(), real_loader(identity.clone()));
        assert!(!registry.is_loaded(&identity));

        let first = registry.resolve(&identity).unwrap();
        let second = registry.resolve(&identity).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(registry.is_loaded(&identity));
        assert!(!first.is_stand_in());
    }

    #[test]
    fn test_stand_in_preempts_future_load() {
        let registry = ModuleRegistry::new();
        let identity = id("hooks.real");
        registry.register_loader(identity.clone(), real_loader(identity.clone()));

        registry
            .intercept(&identity, Arc::new(NoopHook::new(identity.clone())))
            .unwrap();

        let module = registry.resolve(&identity).unwrap();
        assert!(module.is_stand_in());
        assert!(!registry.is_loaded(&identity));
        assert!(registry.is_intercepted(&identity));
        assert_eq!(registry.interceptions(), 1);
    }

    #[test]
    fn test_stand_in_leaves_loaded_module_alone() {
        let registry = ModuleRegistry::new();
        let identity = id("hooks.real");
        registry.register_loader(identity.clone(), real_loader(identity.clone()));
        let loaded = registry.resolve(&identity).unwrap();

        registry
            .intercept(&identity, Arc::new(NoopHook::new(identity.clone())))
            .unwrap();

        let after = registry.resolve(&identity).unwrap();
        assert!(Arc::ptr_eq(&loaded, &after));
        assert!(!after.is_stand_in());
    }

    #[test]
    fn test_sealed_registry_rejects_interception() {
        let registry = ModuleRegistry::sealed();
        let identity = id("hooks.real");
        assert!(!registry.supports_interception());

        let err = registry
            .intercept(&identity, Arc::new(NoopHook::new(identity.clone())))
            .unwrap_err();
        assert_eq!(err, ShimError::InterceptionUnavailable("hooks.real".to_string()));
        assert_eq!(registry.interceptions(), 0);
    }
}
