//! Candidate mechanisms: bounded upstream subgraphs around a target node.
//!
//! A [`Mechanism`] is built once per analysis request:
//!
//! 1. [`extract::extract_upstream_mechanism`] copies the causal neighbourhood
//!    up to two hops upstream of the target.
//! 2. [`consistency::remove_inconsistent_edges`] then
//!    [`consistency::collapse_consistent_edges`] leave at most one edge per
//!    ordered node pair.
//! 3. Optionally, [`prune::prune_mechanism_by_data`] trims unmeasured
//!    peripheral nodes.
//!
//! [`generate_mechanism`] runs the whole pipeline. Monte Carlo runs then
//! clone the finished mechanism; the source graph is never mutated.

pub mod consistency;
pub mod extract;
pub mod prune;

use petgraph::algo::is_cyclic_directed;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use npa_core::error::CoreError;
use npa_core::graph::KnowledgeGraph;
use npa_core::id::NodeId;
use npa_core::node::Entity;

pub use consistency::{
    collapse_consistent_edges, pair_has_contradiction, pair_is_consistent,
    remove_inconsistent_edges,
};
pub use extract::extract_upstream_mechanism;
pub use prune::{prune_mechanism_by_data, remove_unweighted_sources, remove_unweighted_upstream_leaves};

/// Errors raised while building a mechanism.
#[derive(Debug, Error)]
pub enum MechanismError {
    /// The requested target is not a node of the source graph.
    #[error("target NodeId({id}) is not in the graph", id = id.0)]
    TargetNotFound { id: NodeId },

    /// Data-driven pruning removed the target itself.
    #[error("target '{label}' was pruned from its own mechanism")]
    TargetPruned { label: String },

    /// An underlying graph operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// A subgraph rooted at a target node, the unit of NPA analysis.
///
/// The target is present when the mechanism is created. Callers holding
/// [`graph_mut`](Self::graph_mut) may remove it; the scoring engine checks
/// again before every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mechanism {
    graph: KnowledgeGraph,
    target: NodeId,
}

impl Mechanism {
    /// Wraps `graph` as a mechanism around `target`.
    pub fn new(graph: KnowledgeGraph, target: NodeId) -> Result<Self, MechanismError> {
        if !graph.contains_node(target) {
            return Err(MechanismError::TargetNotFound { id: target });
        }
        Ok(Mechanism { graph, target })
    }

    /// The mechanism's graph.
    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    /// The mechanism's graph, for in-place consistency resolution or pruning.
    pub fn graph_mut(&mut self) -> &mut KnowledgeGraph {
        &mut self.graph
    }

    /// The target, as a node ID of [`graph`](Self::graph).
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Returns `true` while the target is part of the graph.
    pub fn contains_target(&self) -> bool {
        self.graph.contains_node(self.target)
    }

    /// Returns `true` if the graph contains at least one directed cycle.
    ///
    /// Acyclic mechanisms score deterministically; cyclic ones need the
    /// randomized cycle breaking of the runner.
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(self.graph.inner())
    }
}

/// Builds the candidate mechanism of `target`.
///
/// Extraction, then consistency resolution, then (when `prune_key` is set)
/// data-driven pruning with that measurement key.
pub fn generate_mechanism(
    graph: &KnowledgeGraph,
    target: NodeId,
    prune_key: Option<&str>,
) -> Result<Mechanism, MechanismError> {
    let mut mechanism = extract_upstream_mechanism(graph, target)?;

    let removed = remove_inconsistent_edges(mechanism.graph_mut());
    let collapsed = collapse_consistent_edges(mechanism.graph_mut());

    let mut pruned = 0;
    if let Some(key) = prune_key {
        pruned = prune_mechanism_by_data(mechanism.graph_mut(), key);
        if !mechanism.contains_target() {
            let label = graph
                .node(target)
                .map(Entity::label)
                .unwrap_or_else(|| format!("NodeId({})", target.0));
            return Err(MechanismError::TargetPruned { label });
        }
    }

    debug!(
        node = %target,
        nodes = mechanism.graph().node_count(),
        edges = mechanism.graph().edge_count(),
        removed,
        collapsed,
        pruned,
        "generated mechanism"
    );

    Ok(mechanism)
}
