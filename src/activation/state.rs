// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Activation state and failure diagnostics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stage of activation a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Config,
    Shim,
    Agent,
    Initializer,
    Orchestrator,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Shim => "shim",
            Self::Agent => "agent",
            Self::Initializer => "initializer",
            Self::Orchestrator => "orchestrator",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-degradable failure classes.
///
/// A missing credential is not here: it degrades to unmonitored readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    ShimInstallFailure,
    InitializationFailure,
    InitializationTimeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShimInstallFailure => "ShimInstallFailure",
            Self::InitializationFailure => "InitializationFailure",
            Self::InitializationTimeout => "InitializationTimeout",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why activation failed, with enough context to log before exit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub stage: Stage,
    pub detail: String,
}

impl FailureReason {
    pub fn new(kind: FailureKind, stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.stage, self.detail)
    }
}

impl std::error::Error for FailureReason {}

/// Where activation currently stands.
///
/// Progression is one-way: `NotStarted -> ShimInstalled -> Initializing -> Ready`,
/// with `Failed` reachable from any non-terminal state. Without a credential the
/// shim is skipped and `NotStarted` goes straight to `Initializing`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ActivationState {
    #[default]
    NotStarted,
    ShimInstalled,
    Initializing,
    Ready {
        monitoring_active: bool,
    },
    Failed {
        reason: FailureReason,
    },
}

impl ActivationState {
    /// `Ready` and `Failed` are absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready { .. } | Self::Failed { .. })
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Whether moving to `next` keeps the progression one-way.
    pub fn can_transition_to(&self, next: &ActivationState) -> bool {
        match (self, next) {
            (current, _) if current.is_terminal() => false,
            (_, Self::Failed { .. }) => true,
            (Self::NotStarted, Self::ShimInstalled)
            | (Self::NotStarted, Self::Initializing)
            | (Self::ShimInstalled, Self::Initializing)
            | (Self::Initializing, Self::Ready { .. }) => true,
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::ShimInstalled => "shim_installed",
            Self::Initializing => "initializing",
            Self::Ready { .. } => "ready",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready { monitoring_active } => {
                write!(f, "ready (monitoring {})", if *monitoring_active { "active" } else { "inactive" })
            }
            Self::Failed { reason } => write!(f, "failed: {}", reason),
            other => f.write_str(other.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed() -> ActivationState {
        ActivationState::Failed {
            reason: FailureReason::new(FailureKind::InitializationTimeout, Stage::Initializer, "slow"),
        }
    }

    #[test]
    fn test_forward_transitions() {
        use ActivationState::*;
        assert!(NotStarted.can_transition_to(&ShimInstalled));
        assert!(NotStarted.can_transition_to(&Initializing));
        assert!(ShimInstalled.can_transition_to(&Initializing));
        assert!(Initializing.can_transition_to(&Ready { monitoring_active: true }));
    }

    #[test]
    fn test_no_state_is_revisited() {
        use ActivationState::*;
        assert!(!ShimInstalled.can_transition_to(&NotStarted));
        assert!(!Initializing.can_transition_to(&ShimInstalled));
        assert!(!Initializing.can_transition_to(&Initializing));
        assert!(!NotStarted.can_transition_to(&Ready { monitoring_active: false }));
        assert!(!ShimInstalled.can_transition_to(&Ready { monitoring_active: true }));
    }

    #[test]
    fn test_failed_reachable_from_non_terminal() {
        use ActivationState::*;
        for state in [NotStarted, ShimInstalled, Initializing] {
            assert!(state.can_transition_to(&failed()), "{}", state);
        }
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        let ready = ActivationState::Ready { monitoring_active: true };
        assert!(ready.is_terminal());
        assert!(!ready.can_transition_to(&failed()));
        assert!(!failed().can_transition_to(&ActivationState::Ready { monitoring_active: true }));
        assert!(!failed().can_transition_to(&failed()));
    }

    #[test]
    fn test_failure_reason_display() {
        let reason = FailureReason::new(
            FailureKind::ShimInstallFailure,
            Stage::Shim,
            "module interception is not available",
        );
        assert_eq!(
            reason.to_string(),
            "ShimInstallFailure at shim: module interception is not available"
        );
        assert_eq!(failed().failure().map(|r| r.stage), Some(Stage::Initializer));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(ActivationState::Ready { monitoring_active: false }).unwrap();
        assert_eq!(json["state"], "ready");
        assert_eq!(json["monitoring_active"], false);

        let json = serde_json::to_value(failed()).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["reason"]["kind"], "InitializationTimeout");
        assert_eq!(json["reason"]["stage"], "initializer");
    }
}
