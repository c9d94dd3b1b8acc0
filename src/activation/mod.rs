// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Activation orchestration.
//!
//! [`ActivationStateMachine`] drives the stages in a fixed order:
//!
//! 1. Resolve configuration. A missing credential degrades to serving
//!    without monitoring; nothing below that needs the credential runs.
//! 2. Install the server-adapter hook suppression. This completes before
//!    anything else is spawned.
//! 3. Start the telemetry agent from its configuration artifact.
//! 4. Compile the workload on an isolated context, bounded by a timeout.
//!
//! The result is a single [`ActivationOutcome`]: ready with the workload
//! handle, or failed with a stage-tagged reason.
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_activate::activation::ActivationStateMachine;
//! use agent_activate::workload::demo_graph;
//!
//! let outcome = ActivationStateMachine::new()
//!     .activate(|ctx| demo_graph(ctx.agent).compile())
//!     .await;
//! ```

mod markers;
mod state;

pub use markers::{Marker, MarkerSink, RecordingMarkers, StderrMarkers};
pub use state::{ActivationState, FailureKind, FailureReason, Stage};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::agent::{AgentSettings, PlatformServer, TelemetryAgent};
use crate::config::{self, ActivationSettings, EnvSource, ProcessEnv, Resolution};
use crate::initializer::{IsolatedInitializer, TaskOutcome};
use crate::shim::{self, HookSuppressionShim, SERVER_ADAPTER_HOOK};
use crate::telemetry::StageSpan;

/// What the init function gets to build the workload with.
#[derive(Debug, Clone)]
pub struct InitContext {
    /// The running agent, or `None` when monitoring is inactive.
    pub agent: Option<Arc<TelemetryAgent>>,
    pub settings: ActivationSettings,
}

/// Terminal result of [`ActivationStateMachine::activate`].
#[derive(Debug)]
pub enum ActivationOutcome<W> {
    Ready {
        handle: W,
        monitoring_active: bool,
        agent: Option<Arc<TelemetryAgent>>,
    },
    Failed(FailureReason),
}

impl<W> ActivationOutcome<W> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn monitoring_active(&self) -> bool {
        matches!(self, Self::Ready { monitoring_active: true, .. })
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Failed(reason) => Some(reason),
            Self::Ready { .. } => None,
        }
    }

    /// The workload handle, or the failure.
    pub fn into_result(self) -> Result<W, FailureReason> {
        match self {
            Self::Ready { handle, .. } => Ok(handle),
            Self::Failed(reason) => Err(reason),
        }
    }
}

/// Orchestrates configuration, suppression, agent start, and isolated init.
pub struct ActivationStateMachine {
    env: Box<dyn EnvSource + Send + Sync>,
    shim: Arc<HookSuppressionShim>,
    server: Arc<PlatformServer>,
    markers: Arc<dyn MarkerSink>,
    initializer: IsolatedInitializer,
    timeout: Option<Duration>,
    preloaded: Option<(Resolution, ActivationSettings)>,
    state: watch::Sender<ActivationState>,
}

impl ActivationStateMachine {
    /// A machine reading the process environment and using the process-wide shim.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ActivationState::NotStarted);
        Self {
            env: Box::new(ProcessEnv),
            shim: shim::global(),
            server: Arc::new(PlatformServer::new()),
            markers: Arc::new(StderrMarkers),
            initializer: IsolatedInitializer::default(),
            timeout: None,
            preloaded: None,
            state,
        }
    }

    pub fn with_env(mut self, env: impl EnvSource + Send + Sync + 'static) -> Self {
        self.env = Box::new(env);
        self
    }

    pub fn with_shim(mut self, shim: Arc<HookSuppressionShim>) -> Self {
        self.shim = shim;
        self
    }

    pub fn with_server(mut self, server: Arc<PlatformServer>) -> Self {
        self.server = server;
        self
    }

    pub fn with_markers(mut self, markers: Arc<dyn MarkerSink>) -> Self {
        self.markers = markers;
        self
    }

    pub fn with_initializer(mut self, initializer: IsolatedInitializer) -> Self {
        self.initializer = initializer;
        self
    }

    /// Override the init budget resolved from the environment.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use options the caller already resolved instead of reading the environment.
    pub fn with_settings(mut self, resolution: Resolution, settings: ActivationSettings) -> Self {
        self.preloaded = Some((resolution, settings));
        self
    }

    /// Watch state changes. Subscribe before calling [`activate`](Self::activate).
    pub fn subscribe(&self) -> watch::Receiver<ActivationState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ActivationState {
        self.state.borrow().clone()
    }

    pub fn server(&self) -> &Arc<PlatformServer> {
        &self.server
    }

    /// Run activation to a terminal state.
    ///
    /// `init_fn` compiles the workload. It runs on an isolated context after
    /// suppression is installed, never on the caller's path.
    pub async fn activate<W, E, F>(mut self, init_fn: F) -> ActivationOutcome<W>
    where
        F: FnOnce(InitContext) -> Result<W, E> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        W: Send + 'static,
    {
        tracing::info!("Starting activation");

        let span = StageSpan::start("config");
        let loaded = match self.preloaded.take() {
            Some(preloaded) => Ok(preloaded),
            None => config::load_settings(self.env.as_ref()),
        };
        span.finish_with_result(&loaded);
        let (resolution, settings) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                return self.fail(FailureReason::new(
                    FailureKind::InitializationFailure,
                    Stage::Config,
                    e.to_string(),
                ))
            }
        };

        let timeout = self.timeout.unwrap_or(settings.init_timeout);

        let agent = match settings.license_key.clone() {
            None => {
                tracing::warn!(
                    missing = ?resolution.missing(),
                    "Configuration incomplete; serving without monitoring"
                );
                None
            }
            Some(credential) => {
                let span = StageSpan::start("shim");
                let installed = self.shim.install(SERVER_ADAPTER_HOOK);
                span.finish_with_result(&installed);
                match installed {
                    Ok(record) => {
                        tracing::debug!(module = %record.target, token = %record.token, "Suppression in place")
                    }
                    Err(e) => {
                        return self.fail(FailureReason::new(
                            FailureKind::ShimInstallFailure,
                            Stage::Shim,
                            e.to_string(),
                        ))
                    }
                }
                self.transition(ActivationState::ShimInstalled);

                let span = StageSpan::start("agent");
                let started = AgentSettings::load(&settings.config_file, resolution.config()).and_then(
                    |agent_settings| {
                        TelemetryAgent::initialize(
                            agent_settings,
                            credential,
                            Arc::clone(self.shim.modules()),
                            Arc::clone(&self.server),
                        )
                    },
                );
                span.finish_with_result(&started);
                match started {
                    Ok(agent) => Some(Arc::new(agent)),
                    Err(e) => {
                        return self.fail(FailureReason::new(
                            FailureKind::InitializationFailure,
                            Stage::Agent,
                            e.to_string(),
                        ))
                    }
                }
            }
        };
        let monitoring_active = agent.is_some();

        self.transition(ActivationState::Initializing);

        let context = InitContext {
            agent: agent.clone(),
            settings,
        };
        let span = StageSpan::start("init");
        let task = self.initializer.run(move || init_fn(context), timeout).await;
        let elapsed = task.elapsed();

        let handle = match task.into_outcome() {
            TaskOutcome::Succeeded(handle) => {
                span.finish(true);
                handle
            }
            TaskOutcome::Failed(err) => {
                span.finish(false);
                return self.fail(FailureReason::new(
                    FailureKind::InitializationFailure,
                    Stage::Initializer,
                    err.to_string(),
                ));
            }
            TaskOutcome::TimedOut(budget) => {
                span.finish(false);
                return self.fail(FailureReason::new(
                    FailureKind::InitializationTimeout,
                    Stage::Initializer,
                    format!("workload did not initialize within {} ms", budget.as_millis()),
                ));
            }
            TaskOutcome::Pending => {
                span.finish(false);
                return self.fail(FailureReason::new(
                    FailureKind::InitializationFailure,
                    Stage::Orchestrator,
                    "initializer returned without an outcome",
                ));
            }
        };

        self.transition(ActivationState::Ready { monitoring_active });
        self.markers.emit(Marker::WorkloadCompiled);
        self.markers.emit(Marker::ReadyToServe);

        tracing::info!(
            monitoring_active,
            init_ms = elapsed.as_millis() as u64,
            "Activation complete"
        );

        ActivationOutcome::Ready {
            handle,
            monitoring_active,
            agent,
        }
    }

    fn fail<W>(&self, reason: FailureReason) -> ActivationOutcome<W> {
        tracing::error!(kind = %reason.kind, stage = %reason.stage, detail = %reason.detail, "Activation failed");
        self.transition(ActivationState::Failed {
            reason: reason.clone(),
        });
        ActivationOutcome::Failed(reason)
    }

    fn transition(&self, next: ActivationState) {
        let current = self.state.borrow().clone();
        if !current.can_transition_to(&next) {
            debug_assert!(false, "invalid activation transition {} -> {}", current, next);
            tracing::warn!(from = current.label(), to = next.label(), "Ignoring invalid transition");
            return;
        }
        tracing::debug!(from = current.label(), to = next.label(), "Activation state changed");
        self.state.send_replace(next);
    }
}

impl Default for ActivationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
