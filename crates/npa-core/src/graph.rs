//! KnowledgeGraph: the entity/relation container every analysis runs on.
//!
//! [`KnowledgeGraph`] wraps a petgraph `StableGraph<Entity, CausalEdge>` so
//! node and edge indices stay valid while nodes and edges are removed, and
//! keeps a label index so each entity appears at most once.
//!
//! Parallel edges between the same ordered pair are allowed: a curated
//! knowledge base routinely holds several assertions (with different
//! evidence) for the same pair of entities.
//!
//! The graph is private. All mutations go through `KnowledgeGraph` methods
//! so the label index never drifts from the graph. Read-only accessors are
//! provided for traversals.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::edge::{CausalEdge, Relation};
use crate::error::CoreError;
use crate::id::{EdgeId, NodeId};
use crate::node::{Entity, Function};

/// A borrowed view of one edge with its endpoints.
#[derive(Debug, Clone, Copy)]
pub struct EdgeView<'g> {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub edge: &'g CausalEdge,
}

impl EdgeView<'_> {
    /// Shorthand for `self.edge.relation`.
    pub fn relation(&self) -> Relation {
        self.edge.relation
    }
}

/// A directed multigraph of entities and relations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    graph: StableGraph<Entity, CausalEdge, Directed, u32>,
    /// Label -> node, in insertion order.
    index: IndexMap<String, NodeId>,
}

impl KnowledgeGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        KnowledgeGraph::default()
    }

    /// Wraps an existing petgraph graph, rebuilding the label index.
    fn from_graph(graph: StableGraph<Entity, CausalEdge, Directed, u32>) -> Self {
        let index = graph
            .node_indices()
            .map(|idx| (graph[idx].label(), NodeId::from(idx)))
            .collect();
        KnowledgeGraph { graph, index }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    /// Returns a read-only reference to the underlying petgraph graph.
    pub fn inner(&self) -> &StableGraph<Entity, CausalEdge, Directed, u32> {
        &self.graph
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges, counting parallel edges separately.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns `true` if the node exists.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.graph.contains_node(id.into())
    }

    /// Looks up an entity by node ID.
    pub fn node(&self, id: NodeId) -> Option<&Entity> {
        self.graph.node_weight(id.into())
    }

    /// Looks up an entity by node ID (mutable, e.g. to attach data).
    ///
    /// The label fields must not be changed through this reference.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Entity> {
        self.graph.node_weight_mut(id.into())
    }

    /// Finds a node by its entity label, e.g. `p(HGNC:APP)`.
    pub fn find(&self, label: &str) -> Option<NodeId> {
        self.index.get(label).copied()
    }

    /// Like [`find`](Self::find), but an unknown label is an error.
    pub fn lookup(&self, label: &str) -> Result<NodeId, CoreError> {
        self.find(label).ok_or_else(|| CoreError::UnknownEntity {
            label: label.to_string(),
        })
    }

    /// All node IDs in ascending index order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices().map(NodeId::from)
    }

    /// All edge IDs in ascending index order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.graph.edge_indices().map(EdgeId::from)
    }

    /// Every edge with its endpoints.
    pub fn edges(&self) -> impl Iterator<Item = EdgeView<'_>> + '_ {
        self.graph.edge_indices().filter_map(move |idx| {
            let (source, target) = self.graph.edge_endpoints(idx)?;
            Some(EdgeView {
                id: idx.into(),
                source: source.into(),
                target: target.into(),
                edge: &self.graph[idx],
            })
        })
    }

    /// Edges ending at `id`, in ascending ID order.
    pub fn in_edges(&self, id: NodeId) -> impl Iterator<Item = EdgeView<'_>> + '_ {
        self.edges_directed(id, Direction::Incoming)
    }

    /// Edges starting at `id`, in ascending ID order.
    pub fn out_edges(&self, id: NodeId) -> impl Iterator<Item = EdgeView<'_>> + '_ {
        self.edges_directed(id, Direction::Outgoing)
    }

    fn edges_directed(
        &self,
        id: NodeId,
        direction: Direction,
    ) -> impl Iterator<Item = EdgeView<'_>> + '_ {
        let idx: NodeIndex<u32> = id.into();
        // petgraph walks adjacency lists newest first; report in ID order.
        let mut views: Vec<EdgeView<'_>> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| EdgeView {
                id: e.id().into(),
                source: e.source().into(),
                target: e.target().into(),
                edge: e.weight(),
            })
            .collect();
        views.sort_by_key(|e| e.id);
        views.into_iter()
    }

    /// Number of edges ending at `id` (parallel edges count separately).
    pub fn in_degree(&self, id: NodeId) -> usize {
        self.in_edges(id).count()
    }

    /// Number of edges starting at `id` (parallel edges count separately).
    pub fn out_degree(&self, id: NodeId) -> usize {
        self.out_edges(id).count()
    }

    /// Distinct predecessors of `id`, in ascending order.
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        let preds: BTreeSet<NodeId> = self.in_edges(id).map(|e| e.source).collect();
        preds.into_iter().collect()
    }

    /// Distinct predecessors of `id` reached through causal edges only.
    pub fn causal_predecessors(&self, id: NodeId) -> Vec<NodeId> {
        let preds: BTreeSet<NodeId> = self
            .in_edges(id)
            .filter(|e| e.edge.is_causal())
            .map(|e| e.source)
            .collect();
        preds.into_iter().collect()
    }

    /// All parallel edges `u -> v`.
    pub fn edges_between(&self, u: NodeId, v: NodeId) -> impl Iterator<Item = EdgeView<'_>> + '_ {
        self.out_edges(u).filter(move |e| e.target == v)
    }

    /// The relations of all parallel edges `u -> v`.
    pub fn relations_between(&self, u: NodeId, v: NodeId) -> SmallVec<[Relation; 4]> {
        self.edges_between(u, v).map(|e| e.relation()).collect()
    }

    /// Distinct ordered pairs `(u, v)` joined by at least one edge, sorted.
    pub fn node_pairs(&self) -> Vec<(NodeId, NodeId)> {
        let pairs: BTreeSet<(NodeId, NodeId)> =
            self.edges().map(|e| (e.source, e.target)).collect();
        pairs.into_iter().collect()
    }

    /// Nodes of the given function, in ascending index order.
    pub fn nodes_by_function(&self, function: Function) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph[idx].function == function)
            .map(NodeId::from)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Adds an entity, or returns the existing node with the same label.
    ///
    /// When the entity already exists, data keys it does not have yet are
    /// copied over; existing values are kept.
    pub fn add_entity(&mut self, entity: Entity) -> NodeId {
        let label = entity.label();
        if let Some(&id) = self.index.get(&label) {
            if let Some(existing) = self.graph.node_weight_mut(id.into()) {
                for (key, value) in entity.data {
                    existing.data.entry(key).or_insert(value);
                }
            }
            return id;
        }

        let id = NodeId::from(self.graph.add_node(entity));
        self.index.insert(label, id);
        id
    }

    /// Adds an edge between two existing nodes.
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        edge: impl Into<CausalEdge>,
    ) -> Result<EdgeId, CoreError> {
        if !self.contains_node(from) {
            return Err(CoreError::NodeNotFound { id: from });
        }
        if !self.contains_node(to) {
            return Err(CoreError::NodeNotFound { id: to });
        }
        let idx = self.graph.add_edge(from.into(), to.into(), edge.into());
        Ok(EdgeId::from(idx))
    }

    /// Removes a node and all its connected edges.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Entity, CoreError> {
        let entity = self
            .graph
            .remove_node(id.into())
            .ok_or(CoreError::NodeNotFound { id })?;
        self.index.shift_remove(&entity.label());
        Ok(entity)
    }

    /// Removes every node in `ids`, returning how many existed.
    pub fn remove_nodes(&mut self, ids: impl IntoIterator<Item = NodeId>) -> usize {
        ids.into_iter()
            .filter(|&id| self.remove_node(id).is_ok())
            .count()
    }

    /// Removes a single edge.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<CausalEdge, CoreError> {
        let idx: EdgeIndex<u32> = id.into();
        self.graph
            .remove_edge(idx)
            .ok_or(CoreError::EdgeNotFound { id })
    }

    /// Removes every parallel edge `u -> v`, returning them.
    pub fn remove_edges_between(&mut self, u: NodeId, v: NodeId) -> Vec<CausalEdge> {
        let ids: Vec<EdgeId> = self.edges_between(u, v).map(|e| e.id).collect();
        ids.into_iter()
            .filter_map(|id| self.remove_edge(id).ok())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Subgraphs
    // -----------------------------------------------------------------------

    /// Copies node `id` of `other` into this graph, returning its local ID.
    pub fn import_node(&mut self, other: &KnowledgeGraph, id: NodeId) -> Result<NodeId, CoreError> {
        let entity = other.node(id).ok_or(CoreError::NodeNotFound { id })?;
        Ok(self.add_entity(entity.clone()))
    }

    /// Copies one edge of `other`, with both endpoints, into this graph.
    pub fn import_edge(&mut self, other: &KnowledgeGraph, edge: EdgeView<'_>) -> Result<EdgeId, CoreError> {
        let source = self.import_node(other, edge.source)?;
        let target = self.import_node(other, edge.target)?;
        self.add_edge(source, target, edge.edge.clone())
    }

    /// The subgraph induced by `nodes`: those nodes plus every edge whose
    /// endpoints are both in the set. Unknown IDs are ignored.
    ///
    /// Kept nodes and edges retain their IDs, so an ID read from this graph
    /// resolves to the same entity in the subgraph.
    pub fn induced_subgraph(&self, nodes: impl IntoIterator<Item = NodeId>) -> KnowledgeGraph {
        let keep: BTreeSet<NodeId> = nodes.into_iter().collect();
        let graph = self.graph.filter_map(
            |idx, entity| keep.contains(&NodeId::from(idx)).then(|| entity.clone()),
            |_, edge| Some(edge.clone()),
        );
        KnowledgeGraph::from_graph(graph)
    }

    /// The subgraph of every causal edge and the nodes it touches.
    pub fn causal_subgraph(&self) -> KnowledgeGraph {
        let mut sub = KnowledgeGraph::new();
        for e in self.edges().filter(|e| e.edge.is_causal()) {
            // Endpoints come from this graph, so the import cannot fail.
            let _ = sub.import_edge(self, e);
        }
        sub
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Serializes the graph as JSON. Node and edge IDs survive the round trip.
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Reads a graph written by [`to_json`](Self::to_json) and verifies its
    /// label index.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let graph: KnowledgeGraph = serde_json::from_str(json)?;
        graph.check_consistency()?;
        Ok(graph)
    }

    // -----------------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------------

    /// Verifies that the label index and the graph agree.
    pub fn check_consistency(&self) -> Result<(), CoreError> {
        if self.index.len() != self.graph.node_count() {
            return Err(CoreError::GraphInconsistency {
                reason: format!(
                    "index holds {} labels but graph holds {} nodes",
                    self.index.len(),
                    self.graph.node_count()
                ),
            });
        }
        for (label, &id) in &self.index {
            match self.node(id) {
                Some(entity) if entity.label() == *label => {}
                Some(entity) => {
                    return Err(CoreError::GraphInconsistency {
                        reason: format!("label '{label}' points at '{}'", entity.label()),
                    })
                }
                None => {
                    return Err(CoreError::GraphInconsistency {
                        reason: format!("label '{label}' points at missing NodeId({})", id.0),
                    })
                }
            }
        }
        Ok(())
    }
}
