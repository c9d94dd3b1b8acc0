// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-process metrics for activation and the agent facade.
//!
//! Tracks how long each activation stage took and what the agent recorded
//! (named transactions, function traces). Nothing here is exported over the
//! wire; the snapshot is for logs and diagnostics.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Process-wide metrics.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Keyed tables are ordered so reports come out stable.
type Table<T> = RwLock<BTreeMap<String, T>>;

fn read<T>(table: &Table<T>) -> RwLockReadGuard<'_, BTreeMap<String, T>> {
    table.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(table: &Table<T>) -> RwLockWriteGuard<'_, BTreeMap<String, T>> {
    table.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct Metrics {
    /// By stage name: config, shim, agent, init.
    stages: Table<StageMetrics>,
    /// By `group/name`.
    traces: Table<OperationMetrics>,
    /// By `group/name`.
    transactions: Table<u64>,
    /// Hook calls swallowed by suppression stand-ins.
    suppressed_calls: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            stages: RwLock::default(),
            traces: RwLock::default(),
            transactions: RwLock::default(),
            suppressed_calls: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_stage(&self, name: &str, duration: Duration, success: bool) {
        write(&self.stages)
            .entry(name.to_string())
            .or_default()
            .record(duration, success);
    }

    pub fn record_trace(&self, key: &str, duration: Duration) {
        write(&self.traces)
            .entry(key.to_string())
            .or_default()
            .record(duration);
    }

    pub fn record_transaction(&self, key: &str) {
        *write(&self.transactions).entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn record_suppressed_call(&self) {
        self.suppressed_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stage_metrics(&self, name: &str) -> Option<StageMetrics> {
        read(&self.stages).get(name).cloned()
    }

    pub fn trace_metrics(&self, key: &str) -> Option<OperationMetrics> {
        read(&self.traces).get(key).cloned()
    }

    /// How many times a transaction name was set.
    pub fn transaction_count(&self, key: &str) -> u64 {
        read(&self.transactions).get(key).copied().unwrap_or(0)
    }

    pub fn suppressed_calls(&self) -> u64 {
        self.suppressed_calls.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            stages: read(&self.stages).clone(),
            traces: read(&self.traces).clone(),
            transactions: read(&self.transactions).clone(),
            suppressed_calls: self.suppressed_calls(),
            uptime: self.uptime(),
        }
    }

    pub fn reset(&self) {
        write(&self.stages).clear();
        write(&self.traces).clear();
        write(&self.transactions).clear();
        self.suppressed_calls.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs of one activation stage. A process normally runs each stage once.
#[derive(Debug, Clone, Default)]
pub struct StageMetrics {
    pub runs: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, duration: Duration, success: bool) {
        self.runs += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        average(self.total_duration, self.runs)
    }
}

/// Timings of a repeated operation, such as one function trace.
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub count: u64,
    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub histogram: Histogram,
}

impl OperationMetrics {
    pub fn new() -> Self {
        Self {
            count: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        average(self.total_duration, self.count)
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn average(total: Duration, n: u64) -> Duration {
    match u32::try_from(n) {
        Ok(0) => Duration::ZERO,
        Ok(n) => total / n,
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / n as f64),
    }
}

/// Fixed-bucket latency histogram. Bounds are in microseconds; the last
/// count is the overflow bucket.
#[derive(Debug, Clone)]
pub struct Histogram {
    bounds: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    pub fn with_buckets(bounds: Vec<u64>) -> Self {
        let counts = vec![0; bounds.len() + 1];
        Self { bounds, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        let idx = self.bounds.partition_point(|&bound| bound < micros);
        self.counts[idx] += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Upper bound of the bucket holding the `p`th percentile. Overflow
    /// reports ten times the last bound.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut seen = 0u64;
        let idx = self
            .counts
            .iter()
            .position(|&count| {
                seen += count;
                seen >= target
            })
            .unwrap_or(self.bounds.len());

        let micros = self
            .bounds
            .get(idx)
            .copied()
            .unwrap_or_else(|| self.bounds.last().copied().unwrap_or(0) * 10);
        Duration::from_micros(micros)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 100us .. 10s, decades
        Self::with_buckets(vec![100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000])
    }
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub stages: BTreeMap<String, StageMetrics>,
    pub traces: BTreeMap<String, OperationMetrics>,
    pub transactions: BTreeMap<String, u64>,
    pub suppressed_calls: u64,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Human-readable report, sections sorted by key.
    pub fn format_report(&self) -> String {
        let mut report = String::from("=== Activation Metrics ===\n\n");
        let _ = writeln!(report, "Uptime: {:.2?}", self.uptime);
        let _ = writeln!(report, "Suppressed hook calls: {}", self.suppressed_calls);

        if !self.stages.is_empty() {
            report.push_str("\nStages:\n");
            for (name, stage) in &self.stages {
                let _ = writeln!(
                    report,
                    "  {}: {} runs, {} failed, avg {:.2?}",
                    name,
                    stage.runs,
                    stage.failures,
                    stage.avg_duration()
                );
            }
        }

        if !self.transactions.is_empty() {
            report.push_str("\nTransactions:\n");
            for (name, count) in &self.transactions {
                let _ = writeln!(report, "  {}: {}", name, count);
            }
        }

        if !self.traces.is_empty() {
            report.push_str("\nFunction Traces:\n");
            for (name, trace) in &self.traces {
                let _ = writeln!(
                    report,
                    "  {}: {} calls, avg {:.2?}, p99 {:.2?}",
                    name,
                    trace.count,
                    trace.avg_duration(),
                    trace.histogram.p99()
                );
            }
        }

        report
    }
}
