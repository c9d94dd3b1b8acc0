// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Span helpers for activation stages.

use std::time::{Duration, Instant};
use tracing::{info_span, Span};

/// RAII guard for timing an activation stage.
///
/// Records the stage name, duration, and success/failure to metrics. A stage
/// dropped without [`finish`](Self::finish) counts as failed.
pub struct StageSpan {
    stage: &'static str,
    start: Instant,
    span: Span,
    finished: bool,
}

impl StageSpan {
    /// Start a new stage span.
    pub fn start(stage: &'static str) -> Self {
        let span = info_span!(
            "activation_stage",
            stage = %stage,
            duration_ms = tracing::field::Empty,
            success = tracing::field::Empty,
        );

        Self {
            stage,
            start: Instant::now(),
            span,
            finished: false,
        }
    }

    /// Get elapsed time so far.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Finish the span, recording duration and success.
    pub fn finish(mut self, success: bool) {
        self.record(success);
        tracing::debug!(parent: &self.span, success, "Stage complete");
    }

    /// Finish with a result, automatically determining success.
    pub fn finish_with_result<T, E>(self, result: &Result<T, E>) {
        self.finish(result.is_ok());
    }

    fn record(&mut self, success: bool) {
        if self.finished {
            return;
        }
        self.finished = true;

        let duration = self.start.elapsed();
        self.span.record("duration_ms", duration.as_secs_f64() * 1000.0);
        self.span.record("success", success);
        super::metrics::GLOBAL_METRICS.record_stage(self.stage, duration, success);
    }
}

impl Drop for StageSpan {
    fn drop(&mut self) {
        self.record(false);
    }
}
