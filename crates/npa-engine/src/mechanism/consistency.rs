//! Resolution of parallel edges between the same ordered node pair.
//!
//! A pair is *consistent* when all of its parallel edges carry one relation
//! label. Inconsistent pairs lose every edge (all or nothing, no partial
//! reconciliation); consistent bundles collapse to one evidence-free edge.
//! Apply [`remove_inconsistent_edges`] before [`collapse_consistent_edges`].

use std::collections::HashSet;

use npa_core::edge::{CausalEdge, RelationClass};
use npa_core::graph::KnowledgeGraph;
use npa_core::id::NodeId;

/// Returns `true` iff `u -> v` has at least one edge and all of them share
/// one relation.
pub fn pair_is_consistent(graph: &KnowledgeGraph, u: NodeId, v: NodeId) -> bool {
    let relations = graph.relations_between(u, v);
    match relations.split_first() {
        Some((first, rest)) => rest.iter().all(|r| r == first),
        None => false,
    }
}

/// Returns `true` iff the edges `u -> v` assert two or more of the mutually
/// exclusive increase / decrease / no-change classes.
pub fn pair_has_contradiction(graph: &KnowledgeGraph, u: NodeId, v: NodeId) -> bool {
    let classes: HashSet<RelationClass> = graph
        .relations_between(u, v)
        .iter()
        .map(|r| r.class())
        .filter(|class| *class != RelationClass::Inert)
        .collect();
    classes.len() >= 2
}

/// Ordered pairs whose parallel edges disagree on the relation label.
pub fn inconsistent_pairs(graph: &KnowledgeGraph) -> Vec<(NodeId, NodeId)> {
    graph
        .node_pairs()
        .into_iter()
        .filter(|&(u, v)| !pair_is_consistent(graph, u, v))
        .collect()
}

/// Ordered pairs whose parallel edges all share one relation label.
pub fn consistent_pairs(graph: &KnowledgeGraph) -> Vec<(NodeId, NodeId)> {
    graph
        .node_pairs()
        .into_iter()
        .filter(|&(u, v)| pair_is_consistent(graph, u, v))
        .collect()
}

/// Deletes every edge of every inconsistent pair. Returns the number of
/// edges removed.
pub fn remove_inconsistent_edges(graph: &mut KnowledgeGraph) -> usize {
    inconsistent_pairs(graph)
        .into_iter()
        .map(|(u, v)| graph.remove_edges_between(u, v).len())
        .sum()
}

/// Replaces each consistent bundle with a single edge carrying only the
/// shared relation. Evidence is dropped. Returns the number of edges removed
/// net of the replacements.
///
/// A pair already reduced to one evidence-free edge is left untouched, so
/// applying this twice changes nothing.
pub fn collapse_consistent_edges(graph: &mut KnowledgeGraph) -> usize {
    let mut removed = 0;
    for (u, v) in consistent_pairs(graph) {
        let bundle: Vec<&CausalEdge> = graph.edges_between(u, v).map(|e| e.edge).collect();
        let relation = match bundle.as_slice() {
            [single] if single.evidence.is_none() => continue,
            [first, ..] => first.relation,
            [] => continue,
        };

        removed += graph.remove_edges_between(u, v).len() - 1;
        // Both endpoints exist: they were just read from the graph.
        let _ = graph.add_edge(u, v, CausalEdge::new(relation));
    }
    removed
}
