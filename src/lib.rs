// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! agent-activate - safe telemetry agent activation for platform-hosted workloads.
//!
//! The hosting platform owns the network server. The telemetry agent lazily
//! loads a server-adapter hook that wants to own that server too, and the two
//! collide during startup. This crate activates the agent without the collision.
//!
//! # Architecture
//!
//! - [`config`] - Option resolution from deployment secrets, baked and hard-coded defaults
//! - [`shim`] - Module registry and the idempotent hook suppression shim
//! - [`initializer`] - Isolated, time-bounded workload initialization
//! - [`activation`] - The state machine tying the stages together
//! - [`agent`] - Telemetry agent facade and its server-adapter hook
//! - [`workload`] - The served workload boundary and the demo graph
//! - [`telemetry`] - Logging, stage spans, and in-process metrics
//! - [`error`] - Error types and result aliases
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_activate::activation::{ActivationOutcome, ActivationStateMachine};
//! use agent_activate::workload::demo_graph;
//!
//! match ActivationStateMachine::new()
//!     .activate(|ctx| demo_graph(ctx.agent).compile())
//!     .await
//! {
//!     ActivationOutcome::Ready { handle, monitoring_active, .. } => serve(handle),
//!     ActivationOutcome::Failed(reason) => exit_unhealthy(reason),
//! }
//! ```

pub mod activation;
pub mod agent;
pub mod config;
pub mod error;
pub mod initializer;
pub mod shim;
pub mod telemetry;
pub mod workload;

// Re-export commonly used types at crate root
pub use activation::{
    ActivationOutcome, ActivationState, ActivationStateMachine, FailureKind, FailureReason,
    InitContext, Marker, MarkerSink, Stage,
};
pub use config::{ConfigResolver, Resolution};
pub use error::{AgentError, ConfigError, HookError, InitError, Result, ShimError, WorkloadError};
pub use initializer::{InitializationTask, IsolatedInitializer, TaskOutcome};
pub use shim::{HookSuppressionShim, SuppressionRecord};
pub use workload::{InstrumentedWorkload, Workload};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_public_exports() {
        let _resolver = ConfigResolver::default();
        let _initializer = IsolatedInitializer::default();
        assert_eq!(ActivationState::default(), ActivationState::NotStarted);
    }
}
