// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Initialization task bookkeeping.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::InitError;

/// Identifies the isolated execution context an init function ran on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub id: Uuid,
    pub label: String,
}

impl ExecutionContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
        }
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.label, &self.id.to_string()[..8])
    }
}

/// Where an initialization attempt ended up.
#[derive(Debug)]
pub enum TaskOutcome<W> {
    Pending,
    /// The workload's ready handle.
    Succeeded(W),
    Failed(InitError),
    /// The caller stopped waiting. The init function may still be running.
    TimedOut(Duration),
}

impl<W> TaskOutcome<W> {
    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::Pending => "pending",
            TaskOutcome::Succeeded(_) => "succeeded",
            TaskOutcome::Failed(_) => "failed",
            TaskOutcome::TimedOut(_) => "timed-out",
        }
    }
}

/// One startup attempt's initialization. Discarded on failure; no retries.
#[derive(Debug)]
pub struct InitializationTask<W> {
    started_at: DateTime<Utc>,
    context: ExecutionContext,
    elapsed: Duration,
    outcome: TaskOutcome<W>,
}

impl<W> InitializationTask<W> {
    pub(crate) fn pending(context: ExecutionContext) -> Self {
        Self {
            started_at: Utc::now(),
            context,
            elapsed: Duration::ZERO,
            outcome: TaskOutcome::Pending,
        }
    }

    pub(crate) fn complete(mut self, outcome: TaskOutcome<W>, elapsed: Duration) -> Self {
        self.outcome = outcome;
        self.elapsed = elapsed;
        self
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Time the caller spent waiting.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn outcome(&self) -> &TaskOutcome<W> {
        &self.outcome
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Succeeded(_))
    }

    /// Hand the outcome, and with it any ready handle, to the caller.
    pub fn into_outcome(self) -> TaskOutcome<W> {
        self.outcome
    }
}
