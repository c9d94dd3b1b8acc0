// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging, stage spans, and in-process metrics.
//!
//! This is this process's own observability, not the monitored agent's:
//!
//! - **Logging**: `tracing` with an env-filtered stderr subscriber
//! - **Stage spans**: one timed span per activation stage
//! - **Metrics**: stage timings and what the agent facade recorded
//!
//! # Usage
//!
//! ```rust,ignore
//! use agent_activate::telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::from_log_level(settings.log_level))?;
//! ```

mod init;
pub mod metrics;
mod spans;

pub use init::{init_telemetry, level_for, LogFormat, TelemetryConfig, TelemetryGuard};
pub use metrics::{
    Histogram, Metrics, MetricsSnapshot, OperationMetrics, StageMetrics, GLOBAL_METRICS,
};
pub use spans::StageSpan;
