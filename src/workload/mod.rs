// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The monitored workload, seen from the activation boundary.
//!
//! Activation treats the workload as opaque: something an init function
//! compiles and hands back. [`Workload`] is the serving surface the platform
//! calls; [`InstrumentedWorkload`] names each call's transaction when
//! monitoring is active.

mod graph;

pub use graph::{chatbot, demo_graph, get_weather, CompiledGraph, GraphBuilder, NodeFn, END, START};

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::TelemetryAgent;
use crate::error::WorkloadError;

/// Transaction group used for workload entry points.
pub const TRANSACTION_GROUP: &str = "Function";

/// Transaction name prefix for workload entry points.
pub const TRANSACTION_PREFIX: &str = "LangGraph/agent";

/// Serving surface of a ready workload.
#[async_trait]
pub trait Workload: Send + Sync {
    /// Run to completion.
    fn invoke(&self, input: Value) -> Result<Value, WorkloadError>;

    /// Run to completion, returning one update per executed step.
    fn stream(&self, input: Value) -> Result<Vec<Value>, WorkloadError>;

    async fn ainvoke(&self, input: Value) -> Result<Value, WorkloadError> {
        self.invoke(input)
    }

    async fn astream(&self, input: Value) -> Result<Vec<Value>, WorkloadError> {
        self.stream(input)
    }
}

/// Wraps a workload so every entry point names its transaction first.
pub struct InstrumentedWorkload<W> {
    inner: W,
    agent: Arc<TelemetryAgent>,
}

impl<W: Workload> InstrumentedWorkload<W> {
    pub fn new(inner: W, agent: Arc<TelemetryAgent>) -> Self {
        Self { inner, agent }
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }

    /// Unwrap, giving back the plain workload.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn name(&self, method: &str) {
        self.agent
            .set_transaction_name(&format!("{}/{}", TRANSACTION_PREFIX, method), TRANSACTION_GROUP);
    }
}

#[async_trait]
impl<W: Workload> Workload for InstrumentedWorkload<W> {
    fn invoke(&self, input: Value) -> Result<Value, WorkloadError> {
        self.name("invoke");
        self.inner.invoke(input)
    }

    fn stream(&self, input: Value) -> Result<Vec<Value>, WorkloadError> {
        self.name("stream");
        self.inner.stream(input)
    }

    async fn ainvoke(&self, input: Value) -> Result<Value, WorkloadError> {
        self.name("ainvoke");
        self.inner.ainvoke(input).await
    }

    async fn astream(&self, input: Value) -> Result<Vec<Value>, WorkloadError> {
        self.name("astream");
        self.inner.astream(input).await
    }
}
