// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Telemetry agent facade.
//!
//! Brings the agent up from its static configuration artifact, registers the
//! hooks it loads lazily, and records transactions and function traces.
//! Recording goes to `tracing` and in-process metrics; exporting to a backend
//! is the agent vendor's business and is not done here.
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_activate::agent::{AgentSettings, PlatformServer, TelemetryAgent};
//!
//! let settings = AgentSettings::load(&path, resolution.config())?;
//! let agent = TelemetryAgent::initialize(settings, credential, modules, server);
//! agent.set_transaction_name("LangGraph/agent/invoke", "Function");
//! ```

mod hooks;
mod settings;

pub use hooks::{PlatformServer, ServerAdapterHook, INSTRUMENT_SERVER};
pub use settings::{load_artifact, AgentArtifact, AgentSettings};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::config::Credential;
use crate::error::AgentError;
use crate::shim::{HookModule, HookValue, ModuleIdentity, ModuleRegistry, SERVER_ADAPTER_HOOK};
use crate::telemetry::metrics::GLOBAL_METRICS;

/// A running telemetry agent.
#[derive(Debug)]
pub struct TelemetryAgent {
    settings: AgentSettings,
    credential: Credential,
    modules: Arc<ModuleRegistry>,
    started_at: DateTime<Utc>,
}

impl TelemetryAgent {
    /// Start the agent and register its lazy hook loaders.
    ///
    /// Nothing is loaded yet; the server-adapter hook loads on first
    /// [`on_server_bootstrap`](Self::on_server_bootstrap).
    pub fn initialize(
        settings: AgentSettings,
        credential: Credential,
        modules: Arc<ModuleRegistry>,
        server: Arc<PlatformServer>,
    ) -> Result<Self, AgentError> {
        let identity = ModuleIdentity::new(SERVER_ADAPTER_HOOK)
            .map_err(|e| AgentError::InvalidArtifact(e.to_string()))?;
        let loader_identity = identity.clone();
        modules.register_loader(
            identity,
            Arc::new(move || {
                Arc::new(ServerAdapterHook::new(loader_identity.clone(), Arc::clone(&server)))
                    as Arc<dyn HookModule>
            }),
        );

        tracing::info!(
            app = %settings.app_name,
            environment = %settings.environment,
            config = %settings.artifact_path.display(),
            license = %credential,
            "Telemetry agent initialized"
        );
        tracing::info!(
            distributed_tracing = settings.distributed_tracing,
            ai_monitoring = settings.ai_monitoring,
            transaction_tracer = settings.transaction_tracer,
            "Agent capabilities"
        );

        Ok(Self {
            settings,
            credential,
            modules,
            started_at: Utc::now(),
        })
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Whether the agent holds a non-empty credential.
    pub fn is_licensed(&self) -> bool {
        !self.credential.expose().is_empty()
    }

    /// Run the lazy hook load the platform's server bootstrap triggers.
    ///
    /// With the server-adapter hook suppressed this resolves to a no-op
    /// stand-in. Unsuppressed, it fails once the platform owns the server.
    pub fn on_server_bootstrap(&self) -> Result<HookValue, AgentError> {
        let identity = ModuleIdentity::new(SERVER_ADAPTER_HOOK)
            .map_err(|e| AgentError::InvalidArtifact(e.to_string()))?;

        let Some(hook) = self.modules.resolve(&identity) else {
            tracing::debug!(module = %identity, "No server hook registered");
            return Ok(HookValue::Unit);
        };

        if hook.is_stand_in() {
            tracing::debug!(module = %identity, "Server hook suppressed; server-level metrics unavailable");
        }

        let value = hook.invoke(
            INSTRUMENT_SERVER,
            &[HookValue::Str(self.settings.app_name.clone())],
        )?;
        Ok(value)
    }

    /// Name the current transaction.
    pub fn set_transaction_name(&self, name: &str, group: &str) {
        if !self.settings.transaction_tracer {
            return;
        }
        let key = format!("{}/{}", group, name);
        GLOBAL_METRICS.record_transaction(&key);
        tracing::debug!(transaction = %key, "Transaction named");
    }

    /// Run `f` inside a function trace.
    pub fn function_trace<T>(&self, name: &str, group: &str, f: impl FnOnce() -> T) -> T {
        let key = format!("{}/{}", group, name);
        let span = tracing::info_span!("function_trace", trace = %key);
        let _entered = span.enter();

        let start = Instant::now();
        let result = f();
        GLOBAL_METRICS.record_trace(&key, start.elapsed());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::shim::HookSuppressionShim;
    use std::path::PathBuf;

    fn settings(app: &str) -> AgentSettings {
        AgentSettings {
            artifact_path: PathBuf::from("/deps/newrelic.ini"),
            app_name: app.to_string(),
            environment: "test".to_string(),
            distributed_tracing: true,
            ai_monitoring: true,
            transaction_tracer: true,
        }
    }

    fn agent(modules: Arc<ModuleRegistry>, server: Arc<PlatformServer>) -> TelemetryAgent {
        TelemetryAgent::initialize(settings("agent-test"), Credential::new("license-key-1234"), modules, server)
            .unwrap()
    }

    #[test]
    fn test_initialize_registers_lazy_hook() {
        let modules = Arc::new(ModuleRegistry::new());
        let agent = agent(Arc::clone(&modules), Arc::new(PlatformServer::new()));
        let identity = ModuleIdentity::new(SERVER_ADAPTER_HOOK).unwrap();

        assert!(agent.is_licensed());
        assert!(!modules.is_loaded(&identity));
        assert_eq!(agent.on_server_bootstrap().unwrap(), HookValue::Bool(true));
        assert!(modules.is_loaded(&identity));
    }

    #[test]
    fn test_unsuppressed_bootstrap_conflicts() {
        let modules = Arc::new(ModuleRegistry::new());
        let server = Arc::new(PlatformServer::new());
        let agent = agent(modules, Arc::clone(&server));

        server.begin_bootstrap();
        let err = agent.on_server_bootstrap().unwrap_err();
        assert!(matches!(
            err,
            AgentError::Hook(HookError::ServerAlreadyBootstrapped(_))
        ));
    }

    #[test]
    fn test_suppressed_bootstrap_is_noop() {
        let modules = Arc::new(ModuleRegistry::new());
        let shim = HookSuppressionShim::new(Arc::clone(&modules));
        shim.install(SERVER_ADAPTER_HOOK).unwrap();

        let server = Arc::new(PlatformServer::new());
        let agent = agent(Arc::clone(&modules), Arc::clone(&server));

        server.begin_bootstrap();
        assert_eq!(agent.on_server_bootstrap().unwrap(), HookValue::Unit);
        assert!(!modules.is_loaded(&ModuleIdentity::new(SERVER_ADAPTER_HOOK).unwrap()));
    }

    #[test]
    fn test_transactions_and_traces_recorded() {
        let agent = agent(Arc::new(ModuleRegistry::new()), Arc::new(PlatformServer::new()));
        let before = GLOBAL_METRICS.transaction_count("Function/agent-test/txn");

        agent.set_transaction_name("agent-test/txn", "Function");
        assert_eq!(
            GLOBAL_METRICS.transaction_count("Function/agent-test/txn"),
            before + 1
        );

        let value = agent.function_trace("agent_test_tool", "Tool", || 41 + 1);
        assert_eq!(value, 42);
        assert!(GLOBAL_METRICS.trace_metrics("Tool/agent_test_tool").is_some());
    }

    #[test]
    fn test_transaction_tracer_disabled() {
        let mut settings = settings("agent-test-off");
        settings.transaction_tracer = false;
        let agent = TelemetryAgent::initialize(
            settings,
            Credential::new("license-key-1234"),
            Arc::new(ModuleRegistry::new()),
            Arc::new(PlatformServer::new()),
        )
        .unwrap();

        agent.set_transaction_name("agent-test-off/txn", "Function");
        assert_eq!(GLOBAL_METRICS.transaction_count("Function/agent-test-off/txn"), 0);
    }
}
