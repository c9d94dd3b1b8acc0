// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Readiness markers scraped by the platform's health check.

use std::fmt;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Terminal markers written to the diagnostic stream on readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    WorkloadCompiled,
    ReadyToServe,
}

impl Marker {
    pub fn text(&self) -> &'static str {
        match self {
            Self::WorkloadCompiled => "✅ workload compiled successfully",
            Self::ReadyToServe => "🚀 ready to serve",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Destination for readiness markers.
pub trait MarkerSink: Send + Sync {
    fn emit(&self, marker: Marker);
}

/// Writes markers to stderr, one per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrMarkers;

impl MarkerSink for StderrMarkers {
    fn emit(&self, marker: Marker) {
        let mut stderr = std::io::stderr().lock();
        if let Err(e) = writeln!(stderr, "{}", marker).and_then(|_| stderr.flush()) {
            tracing::warn!(error = %e, marker = marker.text(), "Failed to write readiness marker");
        }
    }
}

/// Keeps markers in memory.
#[derive(Debug, Default)]
pub struct RecordingMarkers {
    markers: Mutex<Vec<Marker>>,
}

impl RecordingMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markers emitted so far, in order.
    pub fn markers(&self) -> Vec<Marker> {
        self.markers.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl MarkerSink for RecordingMarkers {
    fn emit(&self, marker: Marker) {
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(marker);
    }
}
