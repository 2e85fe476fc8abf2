//! Agent registry - immutable snapshots of loaded agents and prompts

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::agent::{AgentDescriptor, DescriptorKind};
use crate::config::EngineConfig;
use crate::loader::DescriptorLoader;

/// One load cycle's worth of agents and prompts.
///
/// Read-only once built. Reloading builds a new snapshot and swaps it in
/// through a [`RegistryHandle`].
#[derive(Debug, Default, Clone)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<AgentDescriptor>>,
    prompts: BTreeMap<String, Arc<AgentDescriptor>>,
}

impl AgentRegistry {
    /// Build a snapshot from already-parsed mappings
    pub fn new(
        agents: BTreeMap<String, AgentDescriptor>,
        prompts: BTreeMap<String, AgentDescriptor>,
    ) -> Self {
        for id in prompts.keys().filter(|id| agents.contains_key(*id)) {
            warn!(id = %id, "Prompt id shadows an agent; handoffs resolve to the agent");
        }

        Self {
            agents: agents.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
            prompts: prompts.into_iter().map(|(k, v)| (k, Arc::new(v))).collect(),
        }
    }

    /// Load both directories named by the config
    pub fn load(config: &EngineConfig) -> Self {
        let loader = DescriptorLoader::from_config(config);

        info!(dir = %config.agents_dir.display(), "Loading agents");
        let agents = loader.load_all(&config.agents_dir, &config.agent_suffix);
        info!(dir = %config.prompts_dir.display(), "Loading prompts");
        let prompts = loader.load_all(&config.prompts_dir, &config.prompt_suffix);

        let registry = Self::new(agents, prompts);
        info!(
            agents = registry.agents.len(),
            prompts = registry.prompts.len(),
            "Registry loaded"
        );
        registry
    }

    pub fn agent(&self, id: &str) -> Option<&Arc<AgentDescriptor>> {
        self.agents.get(id)
    }

    pub fn prompt(&self, id: &str) -> Option<&Arc<AgentDescriptor>> {
        self.prompts.get(id)
    }

    /// Resolve a handoff target against agents, then prompts
    pub fn resolve(&self, id: &str) -> Option<&Arc<AgentDescriptor>> {
        self.agents.get(id).or_else(|| self.prompts.get(id))
    }

    /// Every descriptor with its kind, agents first
    pub fn entries(&self) -> impl Iterator<Item = (DescriptorKind, &Arc<AgentDescriptor>)> {
        self.agents
            .values()
            .map(|d| (DescriptorKind::Agent, d))
            .chain(self.prompts.values().map(|d| (DescriptorKind::Prompt, d)))
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.len()
    }

    /// Total descriptor count
    pub fn len(&self) -> usize {
        self.agents.len() + self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.prompts.is_empty()
    }
}

/// Shared, swappable reference to the current registry snapshot
#[derive(Clone, Default)]
pub struct RegistryHandle {
    current: Arc<RwLock<Arc<AgentRegistry>>>,
}

impl RegistryHandle {
    pub fn new(registry: AgentRegistry) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(registry))),
        }
    }

    /// Capture the current snapshot. Callers keep it for a whole request.
    pub fn snapshot(&self) -> Arc<AgentRegistry> {
        self.current.read().clone()
    }

    /// Swap in a new snapshot; captured snapshots are untouched
    pub fn replace(&self, registry: AgentRegistry) -> Arc<AgentRegistry> {
        self.install(registry).1
    }

    /// Reload both directories and swap the result in
    pub fn reload(&self, config: &EngineConfig) -> Arc<AgentRegistry> {
        self.install(AgentRegistry::load(config)).0
    }

    /// Swap in `registry`, returning the installed and the previous snapshot
    fn install(&self, registry: AgentRegistry) -> (Arc<AgentRegistry>, Arc<AgentRegistry>) {
        let next = Arc::new(registry);
        let previous = std::mem::replace(&mut *self.current.write(), Arc::clone(&next));
        info!(
            previous = previous.len(),
            current = next.len(),
            "Registry replaced"
        );
        (next, previous)
    }
}
