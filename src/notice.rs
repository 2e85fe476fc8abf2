//! Inline notices emitted into the response stream

use std::fmt;

use serde::Serialize;

use crate::error::GatewayError;

/// A classified, user-facing notice.
///
/// Notices are rendered as markdown into the output port and also recorded
/// in the [`DispatchReport`](crate::orchestrator::DispatchReport).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Estimated input is close to the model's capacity
    CapacityWarning { utilization: u32 },
    /// Estimated input exceeds the admission threshold; no model call made
    CapacityExceeded { estimated: usize, allowed: usize },
    /// Automatic handoff target already dispatched on this path
    CycleAvoided { target: String },
    /// Automatic handoff target is not in the registry
    HandoffNotFound { target: String },
    /// Handoffs skipped because the depth limit was reached
    MaxDepthReached { depth: usize },
    /// The model gateway failed during a turn
    GatewayFailure { agent: String, error: GatewayError },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityWarning { utilization } => write!(
                f,
                "⚠️ *Context is {}% full. Consider starting a new conversation soon to avoid hitting limits.*\n\n",
                utilization
            ),
            Self::CapacityExceeded { estimated, allowed } => write!(
                f,
                "⚠️ Request is too large (estimated {} tokens). Maximum is {} tokens. \
                 Please start a new conversation or reduce the amount of context.",
                estimated, allowed
            ),
            Self::CycleAvoided { target } => {
                write!(f, "\n\n⚠️ *Skipping @{} to prevent circular handoff*\n", target)
            }
            Self::HandoffNotFound { target } => write!(f, "*Agent @{} not found*\n", target),
            Self::MaxDepthReached { .. } => write!(
                f,
                "\n\n⚠️ *Maximum handoff depth reached. Skipping additional agent consultations.*\n"
            ),
            Self::GatewayFailure { error, .. } => write!(f, "⚠️ {}", error.user_message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let warning = Notice::CapacityWarning { utilization: 86 };
        assert!(warning.to_string().contains("86% full"));

        let cycle = Notice::CycleAvoided { target: "a".into() };
        assert!(cycle.to_string().contains("Skipping @a"));

        let failure = Notice::GatewayFailure {
            agent: "A".into(),
            error: GatewayError::ContentBlocked,
        };
        assert!(failure.to_string().contains("content filters"));
    }
}
