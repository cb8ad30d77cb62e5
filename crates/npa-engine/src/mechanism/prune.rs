//! Data-driven pruning of mechanism periphery.
//!
//! Upstream nodes without a measurement contribute nothing but the default
//! score, so they can be dropped before scoring. Each function makes exactly
//! one pass over the graph as it stands; nodes that become prunable because
//! of the pass are left for the next call.

use tracing::debug;

use npa_core::graph::KnowledgeGraph;
use npa_core::id::NodeId;

fn lacks_key(graph: &KnowledgeGraph, id: NodeId, key: &str) -> bool {
    graph.node(id).is_some_and(|entity| !entity.has_value(key))
}

/// Sources with exactly one outgoing edge and no value under `key`.
pub fn unweighted_upstream_leaves(graph: &KnowledgeGraph, key: &str) -> Vec<NodeId> {
    graph
        .node_ids()
        .filter(|&id| graph.in_degree(id) == 0 && graph.out_degree(id) == 1)
        .filter(|&id| lacks_key(graph, id, key))
        .collect()
}

/// Removes every [unweighted upstream leaf](unweighted_upstream_leaves).
/// Returns the number of nodes removed.
pub fn remove_unweighted_upstream_leaves(graph: &mut KnowledgeGraph, key: &str) -> usize {
    let leaves = unweighted_upstream_leaves(graph, key);
    graph.remove_nodes(leaves)
}

/// Sources (in-degree 0) with no value under `key`.
pub fn unweighted_sources(graph: &KnowledgeGraph, key: &str) -> Vec<NodeId> {
    graph
        .node_ids()
        .filter(|&id| graph.in_degree(id) == 0)
        .filter(|&id| lacks_key(graph, id, key))
        .collect()
}

/// Removes every [unweighted source](unweighted_sources). Returns the number
/// of nodes removed.
pub fn remove_unweighted_sources(graph: &mut KnowledgeGraph, key: &str) -> usize {
    let sources = unweighted_sources(graph, key);
    graph.remove_nodes(sources)
}

/// Removes unweighted upstream leaves, then unweighted sources.
pub fn prune_mechanism_by_data(graph: &mut KnowledgeGraph, key: &str) -> usize {
    let leaves = remove_unweighted_upstream_leaves(graph, key);
    let sources = remove_unweighted_sources(graph, key);
    debug!(key, leaves, sources, "pruned unmeasured nodes");
    leaves + sources
}
