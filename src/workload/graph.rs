// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! A small execution graph: named nodes between START and END.
//!
//! State is a list of messages; each node returns messages that are appended.
//! Compilation checks the wiring once so execution can just walk the edges.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::agent::TelemetryAgent;
use crate::error::WorkloadError;

use super::Workload;

/// Entry marker.
pub const START: &str = "__start__";

/// Exit marker.
pub const END: &str = "__end__";

/// A node: reads the messages so far, returns messages to append.
pub type NodeFn = Arc<dyn Fn(&[Value]) -> Result<Vec<Value>, WorkloadError> + Send + Sync>;

/// Collects nodes and edges before compilation.
#[derive(Default)]
pub struct GraphBuilder {
    nodes: HashMap<String, NodeFn>,
    edges: Vec<(String, String)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(mut self, name: impl Into<String>, node: NodeFn) -> Self {
        self.nodes.insert(name.into(), node);
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    /// Validate the wiring and produce a runnable graph.
    pub fn compile(self) -> Result<CompiledGraph, WorkloadError> {
        let mut next: HashMap<String, String> = HashMap::new();

        for (from, to) in &self.edges {
            for endpoint in [from, to] {
                if endpoint != START && endpoint != END && !self.nodes.contains_key(endpoint) {
                    return Err(WorkloadError::InvalidGraph(format!("unknown node: {}", endpoint)));
                }
            }
            if from == END {
                return Err(WorkloadError::InvalidGraph("edge leaves END".to_string()));
            }
            if to == START {
                return Err(WorkloadError::InvalidGraph("edge enters START".to_string()));
            }
            if next.insert(from.clone(), to.clone()).is_some() {
                return Err(WorkloadError::InvalidGraph(format!(
                    "node {} has more than one outgoing edge",
                    from
                )));
            }
        }

        // Walk from START; must reach END without revisiting a node.
        let mut order = Vec::new();
        let mut current = next
            .get(START)
            .ok_or_else(|| WorkloadError::InvalidGraph("no entry edge from START".to_string()))?
            .clone();

        while current != END {
            if order.contains(&current) {
                return Err(WorkloadError::InvalidGraph(format!("cycle at node {}", current)));
            }
            order.push(current.clone());
            current = next
                .get(&current)
                .ok_or_else(|| {
                    WorkloadError::InvalidGraph(format!("node {} has no path to END", current))
                })?
                .clone();
        }

        tracing::debug!(nodes = order.len(), "Graph compiled");
        Ok(CompiledGraph {
            nodes: self.nodes,
            order,
        })
    }
}

/// A validated graph, ready to serve.
pub struct CompiledGraph {
    nodes: HashMap<String, NodeFn>,
    order: Vec<String>,
}

impl CompiledGraph {
    /// Node names in execution order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    fn run(&self, input: Value, mut on_update: impl FnMut(&str, &[Value])) -> Result<Value, WorkloadError> {
        let mut messages = input_messages(input)?;

        for name in &self.order {
            let node = self
                .nodes
                .get(name)
                .ok_or_else(|| WorkloadError::InvalidGraph(format!("unknown node: {}", name)))?;
            let update = node(&messages)?;
            on_update(name, &update);
            messages.extend(update);
        }

        Ok(json!({ "messages": messages }))
    }
}

impl fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph").field("order", &self.order).finish()
    }
}

impl Workload for CompiledGraph {
    fn invoke(&self, input: Value) -> Result<Value, WorkloadError> {
        self.run(input, |_, _| {})
    }

    fn stream(&self, input: Value) -> Result<Vec<Value>, WorkloadError> {
        let mut updates = Vec::new();
        self.run(input, |node, messages| {
            updates.push(json!({ "node": node, "messages": messages }));
        })?;
        Ok(updates)
    }
}

fn input_messages(input: Value) -> Result<Vec<Value>, WorkloadError> {
    match input {
        Value::Object(mut map) => match map.remove("messages") {
            Some(Value::Array(messages)) => Ok(messages),
            Some(_) => Err(WorkloadError::InvalidInput("messages must be an array".to_string())),
            None => Ok(Vec::new()),
        },
        Value::String(text) => Ok(vec![json!({ "role": "user", "content": text })]),
        _ => Err(WorkloadError::InvalidInput(
            "expected an object with messages or a string".to_string(),
        )),
    }
}

fn message_content(message: &Value) -> String {
    match message {
        Value::String(s) => s.clone(),
        other => other
            .get("content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| other.to_string()),
    }
}

/// Weather lookup tool, traced when an agent is present.
pub fn get_weather(location: &str, agent: Option<&TelemetryAgent>) -> String {
    let lookup = || format!("The weather in {} is sunny and 72°F", location);
    match agent {
        Some(agent) => agent.function_trace("get_weather", "Tool", lookup),
        None => lookup(),
    }
}

/// Chat node in echo mode; answers weather questions with [`get_weather`].
pub fn chatbot(agent: Option<Arc<TelemetryAgent>>) -> NodeFn {
    Arc::new(move |messages: &[Value]| {
        let last = messages.last().map(message_content).unwrap_or_default();

        let lower = last.to_ascii_lowercase();
        let reply = match lower.find("weather in ") {
            Some(idx) => {
                let location = last[idx + "weather in ".len()..]
                    .trim()
                    .trim_end_matches('?')
                    .trim();
                get_weather(location, agent.as_deref())
            }
            None => format!("Echo: {}", last),
        };

        Ok(vec![json!({ "role": "assistant", "content": reply })])
    })
}

/// The demo workload: START -> chatbot -> END.
pub fn demo_graph(agent: Option<Arc<TelemetryAgent>>) -> GraphBuilder {
    GraphBuilder::new()
        .add_node("chatbot", chatbot(agent))
        .add_edge(START, "chatbot")
        .add_edge("chatbot", END)
}
