// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Hook suppression shim.
//!
//! The hosting platform bootstraps its network server itself. When the agent's
//! server-adapter hook is lazily loaded during that bootstrap, it expects to own
//! the server's initialization object and breaks. Suppressing the hook before
//! anything can load it avoids the conflict, at the permanent cost of
//! server-level metrics.
//!
//! - [`ModuleRegistry`]: where hook modules are resolved by identity
//! - [`HookSuppressionShim`]: idempotent, thread-safe stand-in installation
//! - [`global`]: the process-wide shim bound to [`global_modules`]

mod module;
mod suppression;

pub use module::{HookLoader, HookModule, HookValue, ModuleIdentity, ModuleRegistry, NoopHook};
pub use suppression::{HookSuppressionShim, SuppressionRecord};

use std::sync::Arc;

use once_cell::sync::Lazy;

/// Identity of the agent's server-adapter hook, the unit that conflicts with
/// the platform's server bootstrap.
pub const SERVER_ADAPTER_HOOK: &str = "newrelic.hooks.adapter_uvicorn";

static GLOBAL_MODULES: Lazy<Arc<ModuleRegistry>> = Lazy::new(|| Arc::new(ModuleRegistry::new()));

static GLOBAL_SHIM: Lazy<Arc<HookSuppressionShim>> =
    Lazy::new(|| Arc::new(HookSuppressionShim::new(Arc::clone(&GLOBAL_MODULES))));

/// The process-wide module registry.
pub fn global_modules() -> Arc<ModuleRegistry> {
    Arc::clone(&GLOBAL_MODULES)
}

/// The process-wide suppression shim. Lives until process exit.
pub fn global() -> Arc<HookSuppressionShim> {
    Arc::clone(&GLOBAL_SHIM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_shim_shares_global_modules() {
        assert!(Arc::ptr_eq(global().modules(), &global_modules()));
        assert!(Arc::ptr_eq(&global(), &global()));
    }

    #[test]
    fn test_server_adapter_identity_is_valid() {
        assert!(ModuleIdentity::new(SERVER_ADAPTER_HOOK).is_ok());
    }
}
