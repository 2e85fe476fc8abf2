//! Handoff graph - static view of who hands off to whom

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::registry::AgentRegistry;

/// One declared handoff edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandoffEdge {
    pub source: String,
    pub target: String,
    /// Whether dispatch follows this edge without user action
    pub auto_send: bool,
}

/// Directed graph of declared handoffs in a registry snapshot.
///
/// Dispatch does not need this; it guards cycles per request. The graph
/// exists to report problems in a descriptor set before anyone chats with it.
#[derive(Debug, Default, Clone)]
pub struct HandoffGraph {
    /// Outgoing edges by source id, in declaration order
    edges: BTreeMap<String, Vec<HandoffEdge>>,
}

impl HandoffGraph {
    /// Build from every agent and prompt in the snapshot
    pub fn from_registry(registry: &AgentRegistry) -> Self {
        let mut edges = BTreeMap::new();
        for (_, descriptor) in registry.entries() {
            // Agents come first and shadow prompts with the same id.
            edges.entry(descriptor.id.clone()).or_insert_with(|| {
                descriptor
                    .handoffs
                    .iter()
                    .map(|h| HandoffEdge {
                        source: descriptor.id.clone(),
                        target: h.target.clone(),
                        auto_send: h.auto_send,
                    })
                    .collect()
            });
        }
        Self { edges }
    }

    /// Outgoing edges of `id`
    pub fn handoffs(&self, id: &str) -> &[HandoffEdge] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Edges whose target is not a known descriptor
    pub fn dangling(&self) -> Vec<&HandoffEdge> {
        self.edges
            .values()
            .flatten()
            .filter(|edge| !self.edges.contains_key(&edge.target))
            .collect()
    }

    /// Cycles made of automatic edges, one per back edge found.
    ///
    /// Each cycle starts at its smallest id, so results are stable across runs.
    pub fn auto_cycles(&self) -> Vec<Vec<String>> {
        let mut cycles = BTreeSet::new();
        let mut finished: BTreeSet<&str> = BTreeSet::new();

        for start in self.edges.keys() {
            if finished.contains(start.as_str()) {
                continue;
            }

            // Explicit stack of (node, next edge index) keeps deep chains off the call stack.
            let mut path: Vec<&str> = vec![start.as_str()];
            let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];

            while let Some((node, index)) = stack.pop() {
                let auto: Vec<&HandoffEdge> =
                    self.handoffs(node).iter().filter(|e| e.auto_send).collect();

                let Some(edge) = auto.get(index).copied() else {
                    finished.insert(node);
                    path.pop();
                    continue;
                };
                stack.push((node, index + 1));

                let target = edge.target.as_str();
                if let Some(pos) = path.iter().position(|n| *n == target) {
                    cycles.insert(canonical(&path[pos..]));
                } else if !finished.contains(target) && self.edges.contains_key(target) {
                    path.push(target);
                    stack.push((target, 0));
                }
            }
        }

        cycles.into_iter().collect()
    }

    /// Number of descriptors in the graph
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

fn canonical(cycle: &[&str]) -> Vec<String> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[start..]
        .iter()
        .chain(cycle[..start].iter())
        .map(|id| id.to_string())
        .collect()
}
