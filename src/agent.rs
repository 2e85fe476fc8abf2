//! Agent descriptors - one specialized assistant persona and its handoffs

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Prompt used when neither the handoff nor the request supplies one
pub const CONTINUATION_PROMPT: &str = "Please continue the analysis using the context above.";

/// Model hint used when a descriptor does not name one
pub const DEFAULT_MODEL: &str = "Claude Sonnet 4";

/// Where a descriptor was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorKind {
    /// Loaded from the agents directory
    Agent,
    /// Loaded from the prompts directory
    Prompt,
}

impl std::fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Agent => write!(f, "agent"),
            Self::Prompt => write!(f, "prompt"),
        }
    }
}

/// A declared edge from one descriptor to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handoff {
    /// Target descriptor id, resolved at dispatch time
    pub target: String,
    /// Display label
    pub label: Option<String>,
    /// Prompt sent to the target instead of the user's message
    pub prompt: Option<String>,
    /// Dispatch automatically (true) or only suggest (false)
    pub auto_send: bool,
}

impl Handoff {
    /// Create an automatic handoff to `target`
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            label: None,
            prompt: None,
            auto_send: true,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Turn this into a suggestion-only handoff
    pub fn manual(mut self) -> Self {
        self.auto_send = false;
        self
    }

    /// Label, falling back to the target id
    pub fn heading(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.target)
    }

    /// Label, falling back to "Consult <target>"
    pub fn title(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| format!("Consult {}", self.target))
    }

    /// Override prompt, falling back to the generic continuation prompt
    pub fn prompt_or_continuation(&self) -> &str {
        self.prompt.as_deref().unwrap_or(CONTINUATION_PROMPT)
    }

    /// Chat text that addresses the target directly
    pub fn mention(&self) -> String {
        format!("@{} {}", self.target, self.prompt_or_continuation())
    }
}

/// Validated, immutable record for one agent or prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Id derived from the file name, unique within a registry snapshot
    pub id: String,
    /// Display name
    pub name: String,
    /// What this agent specializes in
    pub description: String,
    /// Tool names requested by the agent
    pub tools: BTreeSet<String>,
    /// Preferred model
    pub model_hint: String,
    /// Handoffs in declaration order
    pub handoffs: Vec<Handoff>,
    /// Markdown body after the frontmatter
    pub instructions: String,
    /// File the descriptor came from
    pub source_path: PathBuf,
}

impl AgentDescriptor {
    /// System instruction block for a turn
    pub fn system_prompt(&self, environment: Option<&str>) -> String {
        let mut prompt = format!(
            "You are {}, an AI assistant specialized in the following:\n\n{}\n\n## Your Role and Instructions\n\n{}",
            self.name, self.description, self.instructions
        );
        if let Some(line) = environment.filter(|l| !l.trim().is_empty()) {
            prompt.push_str("\n\n## Workspace Context\n\n");
            prompt.push_str(line);
            prompt.push('\n');
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> AgentDescriptor {
        AgentDescriptor {
            id: "security-sentinel".into(),
            name: "Security Sentinel".into(),
            description: "Finds vulnerabilities".into(),
            tools: BTreeSet::new(),
            model_hint: DEFAULT_MODEL.into(),
            handoffs: vec![],
            instructions: "Audit everything.".into(),
            source_path: PathBuf::from("security-sentinel.agent.md"),
        }
    }

    #[test]
    fn test_system_prompt_layout() {
        let prompt = descriptor().system_prompt(None);
        assert!(prompt.starts_with("You are Security Sentinel, an AI assistant"));
        assert!(prompt.contains("Finds vulnerabilities\n\n## Your Role and Instructions\n\nAudit everything."));
        assert!(!prompt.contains("Workspace Context"));
    }

    #[test]
    fn test_system_prompt_with_environment() {
        let prompt = descriptor().system_prompt(Some("Current workspace: /src/app"));
        assert!(prompt.ends_with("## Workspace Context\n\nCurrent workspace: /src/app\n"));
    }

    #[test]
    fn test_handoff_fallbacks() {
        let handoff = Handoff::to("performance-oracle");
        assert!(handoff.auto_send);
        assert_eq!(handoff.heading(), "performance-oracle");
        assert_eq!(handoff.title(), "Consult performance-oracle");
        assert_eq!(handoff.mention(), format!("@performance-oracle {}", CONTINUATION_PROMPT));

        let handoff = handoff.with_label("Speed").with_prompt("Profile it").manual();
        assert!(!handoff.auto_send);
        assert_eq!(handoff.heading(), "Speed");
        assert_eq!(handoff.mention(), "@performance-oracle Profile it");
    }
}
