//! Follow-up suggestions offered after a completed turn

use serde::{Deserialize, Serialize};

use crate::agent::AgentDescriptor;

/// Handoff-derived suggestions are capped at this many
pub const MAX_HANDOFF_FOLLOWUPS: usize = 3;

/// A prompt the user can pick for the next turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Followup {
    pub prompt: String,
    pub label: String,
}

/// Two generic suggestions, then up to three from declared handoffs
pub fn followups(descriptor: &AgentDescriptor) -> Vec<Followup> {
    let mut suggestions = vec![
        Followup {
            prompt: "Can you explain this in more detail?".into(),
            label: "Explain in detail".into(),
        },
        Followup {
            prompt: "What are the potential risks or issues?".into(),
            label: "Identify risks".into(),
        },
    ];

    suggestions.extend(
        descriptor
            .handoffs
            .iter()
            .take(MAX_HANDOFF_FOLLOWUPS)
            .map(|handoff| Followup {
                prompt: handoff.mention(),
                label: handoff.title(),
            }),
    );

    suggestions
}
