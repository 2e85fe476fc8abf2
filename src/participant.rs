//! Host-facing participants and the top-level facade

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::agent::{AgentDescriptor, DescriptorKind};
use crate::channel::OutputPort;
use crate::config::EngineConfig;
use crate::error::SwitchboardError;
use crate::followup::{self, Followup};
use crate::orchestrator::{DispatchReport, Invocation, OrchestrationEngine};
use crate::registry::{AgentRegistry, RegistryHandle};
use crate::session::DispatchContext;

/// A descriptor exposed to the host as an addressable chat participant
#[derive(Debug, Clone)]
pub struct Participant {
    /// Namespaced id, e.g. `switchboard.architect`
    pub id: String,
    pub kind: DescriptorKind,
    pub descriptor: Arc<AgentDescriptor>,
}

impl Participant {
    pub fn new(config: &EngineConfig, kind: DescriptorKind, descriptor: Arc<AgentDescriptor>) -> Self {
        Self {
            id: config.participant_id(&descriptor.id),
            kind,
            descriptor,
        }
    }

    /// Run a top-level request and offer follow-ups when it completes
    pub async fn handle(
        &self,
        engine: &OrchestrationEngine,
        registry: &AgentRegistry,
        invocation: Invocation<'_>,
        port: &mut dyn OutputPort,
    ) -> DispatchReport {
        let ctx = DispatchContext::root(self.descriptor.id.clone());
        let report = engine
            .dispatch(registry, Arc::clone(&self.descriptor), ctx, invocation, port)
            .await;

        if !report.cancelled {
            for choice in self.followups() {
                port.emit_choice(&choice);
            }
        }
        report
    }

    pub fn followups(&self) -> Vec<Followup> {
        followup::followups(&self.descriptor)
    }
}

/// Registry, engine and configuration wired together.
///
/// Cloning is cheap; clones share the registry handle, so a reload through
/// one is visible to all.
#[derive(Clone)]
pub struct Switchboard {
    config: Arc<RwLock<EngineConfig>>,
    engine: Arc<OrchestrationEngine>,
    registry: RegistryHandle,
}

impl Switchboard {
    /// Load both descriptor directories
    pub fn load(config: EngineConfig) -> Self {
        let registry = AgentRegistry::load(&config);
        Self::with_registry(config, registry)
    }

    /// Use an already-built registry
    pub fn with_registry(config: EngineConfig, registry: AgentRegistry) -> Self {
        info!(
            agents = registry.agent_count(),
            prompts = registry.prompt_count(),
            "Switchboard ready"
        );
        Self {
            engine: Arc::new(OrchestrationEngine::new(&config)),
            config: Arc::new(RwLock::new(config)),
            registry: RegistryHandle::new(registry),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    pub fn engine(&self) -> &OrchestrationEngine {
        &self.engine
    }

    /// Current registry snapshot
    pub fn registry(&self) -> Arc<AgentRegistry> {
        self.registry.snapshot()
    }

    /// Every descriptor in the current snapshot, agents first
    pub fn participants(&self) -> Vec<Participant> {
        let config = self.config.read();
        self.registry
            .snapshot()
            .entries()
            .map(|(kind, descriptor)| Participant::new(&config, kind, Arc::clone(descriptor)))
            .collect()
    }

    /// Re-read both directories. Requests already running keep their snapshot.
    pub fn reload(&self) -> Arc<AgentRegistry> {
        let config = self.config.read().clone();
        debug!(agents_dir = %config.agents_dir.display(), "Reloading descriptors");
        self.registry.reload(&config)
    }

    /// Dispatch a request addressed to `participant_id`.
    ///
    /// Accepts both the namespaced id and the bare descriptor id.
    pub async fn handle(
        &self,
        participant_id: &str,
        invocation: Invocation<'_>,
        port: &mut dyn OutputPort,
    ) -> Result<DispatchReport, SwitchboardError> {
        let registry = self.registry.snapshot();
        let participant = {
            let config = self.config.read();
            let id = config.descriptor_id(participant_id);
            let (kind, descriptor) = match (registry.agent(id), registry.prompt(id)) {
                (Some(d), _) => (DescriptorKind::Agent, d),
                (None, Some(d)) => (DescriptorKind::Prompt, d),
                (None, None) => {
                    warn!(participant = participant_id, "Unknown participant");
                    return Err(SwitchboardError::UnknownParticipant(participant_id.to_string()));
                }
            };
            Participant::new(&config, kind, Arc::clone(descriptor))
        };

        Ok(participant.handle(&self.engine, &registry, invocation, port).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::path::PathBuf;

    fn descriptor(id: &str) -> AgentDescriptor {
        AgentDescriptor {
            id: id.into(),
            name: id.to_uppercase(),
            description: "d".into(),
            tools: BTreeSet::new(),
            model_hint: "m".into(),
            handoffs: vec![],
            instructions: String::new(),
            source_path: PathBuf::new(),
        }
    }

    #[test]
    fn test_participants_are_namespaced() {
        let mut agents = BTreeMap::new();
        agents.insert("architect".to_string(), descriptor("architect"));
        let mut prompts = BTreeMap::new();
        prompts.insert("summary".to_string(), descriptor("summary"));

        let board = Switchboard::with_registry(
            EngineConfig::default(),
            AgentRegistry::new(agents, prompts),
        );
        let participants = board.participants();

        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].id, "switchboard.architect");
        assert_eq!(participants[0].kind, DescriptorKind::Agent);
        assert_eq!(participants[1].id, "switchboard.summary");
        assert_eq!(participants[1].kind, DescriptorKind::Prompt);
    }

    #[test]
    fn test_reload_swaps_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let agents_dir = dir.path().join("agents");
        std::fs::create_dir_all(&agents_dir).unwrap();

        let config = EngineConfig {
            agents_dir: agents_dir.clone(),
            prompts_dir: dir.path().join("prompts"),
            ..Default::default()
        };
        let board = Switchboard::load(config);
        let before = board.registry();
        assert!(before.is_empty());

        std::fs::write(
            agents_dir.join("tester.agent.md"),
            "---\nname: Tester\ndescription: Writes tests\n---\nTest everything.\n",
        )
        .unwrap();
        let after = board.reload();

        assert_eq!(after.agent_count(), 1);
        assert!(before.is_empty());
        assert_eq!(board.participants()[0].id, "switchboard.tester");
    }
}
