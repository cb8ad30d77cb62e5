//! Bounded-depth upstream extraction.
//!
//! The mechanism of a target holds its direct causal predecessors (hop 1)
//! and their direct causal predecessors (hop 2). Hop 2 expands the hop-1
//! frontier as it stood before expansion; nodes discovered in hop 2 are not
//! expanded again, which keeps mechanisms small on dense knowledge graphs.

use std::collections::BTreeSet;

use npa_core::error::CoreError;
use npa_core::graph::KnowledgeGraph;
use npa_core::id::{EdgeId, NodeId};

use super::{Mechanism, MechanismError};

/// Copies the two-hop upstream causal neighbourhood of `target` out of
/// `graph`.
///
/// Every causal edge into the target and into each hop-1 node is copied with
/// its data, including parallel edges. A target without causal predecessors
/// yields a single-node mechanism.
pub fn extract_upstream_mechanism(
    graph: &KnowledgeGraph,
    target: NodeId,
) -> Result<Mechanism, MechanismError> {
    let entity = graph
        .node(target)
        .ok_or(MechanismError::TargetNotFound { id: target })?;

    let mut sub = KnowledgeGraph::new();
    let local_target = sub.add_entity(entity.clone());
    let mut copied: BTreeSet<EdgeId> = BTreeSet::new();

    let hop1 = import_upstream(graph, &mut sub, target, &mut copied)?;
    for node in hop1 {
        import_upstream(graph, &mut sub, node, &mut copied)?;
    }

    Mechanism::new(sub, local_target)
}

/// Copies the causal in-edges of `node` (and their sources) into `sub`,
/// skipping edges already copied. Returns the distinct causal predecessors.
fn import_upstream(
    graph: &KnowledgeGraph,
    sub: &mut KnowledgeGraph,
    node: NodeId,
    copied: &mut BTreeSet<EdgeId>,
) -> Result<Vec<NodeId>, CoreError> {
    let mut predecessors = BTreeSet::new();
    for edge in graph.in_edges(node).filter(|e| e.edge.is_causal()) {
        predecessors.insert(edge.source);
        if copied.insert(edge.id) {
            sub.import_edge(graph, edge)?;
        }
    }
    Ok(predecessors.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use npa_core::edge::Relation;
    use npa_core::node::{Entity, Function};

    fn protein(name: &str) -> Entity {
        Entity::new(Function::Protein, "HGNC", name)
    }

    fn labels(graph: &KnowledgeGraph) -> Vec<String> {
        let mut labels: Vec<String> = graph
            .node_ids()
            .filter_map(|id| graph.node(id).map(Entity::label))
            .collect();
        labels.sort();
        labels
    }

    #[test]
    fn chain_is_cut_after_two_hops() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_entity(protein("A"));
        let b = graph.add_entity(protein("B"));
        let c = graph.add_entity(protein("C"));
        let d = graph.add_entity(protein("D"));
        graph.add_edge(a, b, Relation::Increases).unwrap();
        graph.add_edge(b, c, Relation::Increases).unwrap();
        graph.add_edge(c, d, Relation::Increases).unwrap();

        let mechanism = extract_upstream_mechanism(&graph, d).unwrap();
        let m = mechanism.graph();

        assert_eq!(labels(m), vec!["p(HGNC:B)", "p(HGNC:C)", "p(HGNC:D)"]);
        assert_eq!(m.edge_count(), 2);
        let (mb, mc) = (m.lookup("p(HGNC:B)").unwrap(), m.lookup("p(HGNC:C)").unwrap());
        assert_eq!(m.edges_between(mb, mc).count(), 1);
        assert_eq!(m.edges_between(mc, mechanism.target()).count(), 1);
    }

    #[test]
    fn target_without_predecessors_is_a_singleton() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_entity(protein("A"));
        let b = graph.add_entity(protein("B"));
        graph.add_edge(a, b, Relation::Increases).unwrap();

        let mechanism = extract_upstream_mechanism(&graph, a).unwrap();
        assert_eq!(mechanism.graph().node_count(), 1);
        assert_eq!(mechanism.graph().edge_count(), 0);
        assert!(mechanism.contains_target());
    }

    #[test]
    fn inert_edges_are_not_followed() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_entity(protein("A"));
        let b = graph.add_entity(protein("B"));
        let t = graph.add_entity(protein("T"));
        graph.add_edge(a, t, Relation::PositiveCorrelation).unwrap();
        graph.add_edge(b, t, Relation::DirectlyDecreases).unwrap();

        let mechanism = extract_upstream_mechanism(&graph, t).unwrap();
        assert_eq!(labels(mechanism.graph()), vec!["p(HGNC:B)", "p(HGNC:T)"]);
    }

    #[test]
    fn parallel_edges_and_node_data_are_copied() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_entity(protein("A").with_value("weight", 2.5));
        let t = graph.add_entity(protein("T"));
        graph.add_edge(a, t, Relation::Increases).unwrap();
        graph.add_edge(a, t, Relation::Decreases).unwrap();

        let mechanism = extract_upstream_mechanism(&graph, t).unwrap();
        let m = mechanism.graph();
        let ma = m.lookup("p(HGNC:A)").unwrap();
        assert_eq!(m.edges_between(ma, mechanism.target()).count(), 2);
        assert_eq!(m.node(ma).unwrap().value("weight"), Some(2.5));
    }

    #[test]
    fn self_loop_on_target_is_copied_once() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_entity(protein("A"));
        let t = graph.add_entity(protein("T"));
        graph.add_edge(t, t, Relation::Increases).unwrap();
        graph.add_edge(a, t, Relation::Increases).unwrap();

        let mechanism = extract_upstream_mechanism(&graph, t).unwrap();
        assert_eq!(mechanism.graph().edge_count(), 2);
    }

    #[test]
    fn hop_two_edges_between_frontier_nodes_are_kept() {
        // A and B both feed T and feed each other: the mechanism keeps the
        // cycle between them.
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_entity(protein("A"));
        let b = graph.add_entity(protein("B"));
        let t = graph.add_entity(protein("T"));
        graph.add_edge(a, t, Relation::Increases).unwrap();
        graph.add_edge(b, t, Relation::Increases).unwrap();
        graph.add_edge(a, b, Relation::Increases).unwrap();
        graph.add_edge(b, a, Relation::Decreases).unwrap();

        let mechanism = extract_upstream_mechanism(&graph, t).unwrap();
        assert_eq!(mechanism.graph().edge_count(), 4);
        assert!(mechanism.has_cycles());
    }
}
