// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Log subscriber setup for the activation process.
//!
//! Everything goes to stderr. The platform's health check scrapes that stream
//! for the readiness markers, so the default output is plain compact lines
//! without ANSI escapes.

use std::io;

use tracing::Level;
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogLevel;

/// Line layout for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One short line per event.
    Compact,
    /// Full layout with span context.
    Full,
}

/// How this process logs.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Level used when neither `RUST_LOG` nor a directive is set.
    pub default_level: Level,

    /// Explicit filter directive; beats both `RUST_LOG` and `default_level`.
    pub filter_directive: Option<String>,

    pub format: LogFormat,

    /// Log span enter/close, which shows per-stage timing.
    pub span_events: bool,

    pub source_location: bool,

    pub ansi_colors: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self::from_log_level(LogLevel::default())
    }
}

impl TelemetryConfig {
    /// Settings for a platform-hosted run at the resolved verbosity.
    pub fn from_log_level(level: LogLevel) -> Self {
        Self {
            default_level: level_for(level),
            filter_directive: None,
            format: LogFormat::Compact,
            span_events: false,
            source_location: false,
            ansi_colors: false,
        }
    }

    /// Local runs: debug output with stage spans and colors.
    pub fn development() -> Self {
        Self {
            default_level: Level::DEBUG,
            format: LogFormat::Full,
            span_events: true,
            source_location: true,
            ansi_colors: true,
            ..Self::from_log_level(LogLevel::Debug)
        }
    }

    /// Quiet runs: warnings and errors only.
    pub fn production() -> Self {
        Self::from_log_level(LogLevel::Warn)
    }

    /// Trace everything this crate emits.
    pub fn testing() -> Self {
        Self {
            default_level: Level::TRACE,
            filter_directive: Some("agent_activate=trace".to_string()),
            format: LogFormat::Full,
            span_events: true,
            source_location: true,
            ansi_colors: false,
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_directive = Some(filter.into());
        self
    }

    pub fn with_ansi(mut self, ansi: bool) -> Self {
        self.ansi_colors = ansi;
        self
    }

    fn filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.default_level.to_string());
        match &self.filter_directive {
            Some(directive) => EnvFilter::try_new(directive).unwrap_or_else(|_| fallback()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback()),
        }
    }
}

/// Map the option's verbosity onto a tracing level.
pub fn level_for(level: LogLevel) -> Level {
    match level {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
    }
}

/// Keep alive for the process lifetime.
pub struct TelemetryGuard {
    _private: (),
}

/// Install the global subscriber. Call once, after options are resolved.
///
/// `RUST_LOG` wins over the resolved verbosity unless a directive is set.
pub fn init_telemetry(config: &TelemetryConfig) -> io::Result<TelemetryGuard> {
    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(config.ansi_colors)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(span_events);

    let registry = tracing_subscriber::registry().with(config.filter());
    let installed = match config.format {
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
        LogFormat::Full => registry.with(layer).try_init(),
    };
    installed.map_err(|e| io::Error::new(io::ErrorKind::AlreadyExists, e.to_string()))?;

    Ok(TelemetryGuard { _private: () })
}
