// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Isolated workload initialization.
//!
//! Compiling the workload can trigger the agent's lazy hook loading. Doing that
//! on the path the platform uses for its own server bootstrap is what causes
//! the conflict, so the init function runs on its own named thread and the
//! caller awaits its result with a deadline.
//!
//! Timing out stops the caller from waiting. It does not stop the init
//! function, which is not assumed to be cancellation-safe. The thread is
//! detached: it never holds up runtime shutdown or process exit, and its late
//! result is dropped.

mod task;

pub use task::{ExecutionContext, InitializationTask, TaskOutcome};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tracing::{info_span, Instrument};

use crate::error::InitError;

/// Runs an init function off the calling path, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct IsolatedInitializer {
    label: String,
}

impl IsolatedInitializer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Run `init_fn` on a dedicated thread and wait up to `timeout`.
    ///
    /// Errors returned by `init_fn` are preserved as the source of
    /// [`InitError::Failed`]; a panic becomes [`InitError::Panicked`].
    pub async fn run<W, E, F>(&self, init_fn: F, timeout: Duration) -> InitializationTask<W>
    where
        F: FnOnce() -> Result<W, E> + Send + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        W: Send + 'static,
    {
        let context = ExecutionContext::new(self.label.as_str());
        let task = InitializationTask::pending(context.clone());
        let span = info_span!("isolated_init", context = %context, timeout_ms = timeout.as_millis() as u64);
        let start = Instant::now();

        let (tx, rx) = oneshot::channel::<Result<W, InitError>>();
        let worker_span = span.clone();
        let spawned = thread::Builder::new().name(self.label.clone()).spawn(move || {
            let _entered = worker_span.enter();
            let result = match panic::catch_unwind(AssertUnwindSafe(init_fn)) {
                Ok(result) => result.map_err(InitError::failed),
                Err(payload) => Err(InitError::Panicked(panic_message(payload))),
            };
            // The receiver is gone after a timeout; the late result is dropped.
            let _ = tx.send(result);
        });

        let outcome = match spawned {
            Err(e) => TaskOutcome::Failed(InitError::failed(e)),
            Ok(_detached) => match tokio::time::timeout(timeout, rx).instrument(span.clone()).await {
                Ok(Ok(Ok(ready))) => TaskOutcome::Succeeded(ready),
                Ok(Ok(Err(err))) => TaskOutcome::Failed(err),
                Ok(Err(_closed)) => TaskOutcome::Failed(InitError::Panicked(
                    "initialization thread exited without a result".to_string(),
                )),
                Err(_) => TaskOutcome::TimedOut(timeout),
            },
        };

        let elapsed = start.elapsed();
        span.in_scope(|| {
            tracing::debug!(
                outcome = outcome.label(),
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "Isolated initialization finished"
            );
        });

        task.complete(outcome, elapsed)
    }
}

impl Default for IsolatedInitializer {
    fn default() -> Self {
        Self::new("workload-init")
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
