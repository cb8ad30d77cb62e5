//! NPA runner state machine.
//!
//! An [`NpaRunner`] owns a private copy of one mechanism and scores it from
//! the sources towards the target. Every node is in one of three states
//! (see [`NodeState`]):
//!
//! - `Unscored`: some predecessor is still unscored.
//! - `LeafEligible`: unscored, but every predecessor is scored.
//! - `Scored`: a score has been committed. Scores are never overwritten.
//!
//! Nodes without predecessors are scored on construction from their
//! measurement. Each iteration then scores all leaf-eligible nodes as one
//! batch. When cycles block progress, edges are removed one at a time (see
//! [`NpaRunner::remove_random_edge`]) until a leaf appears. Every iteration
//! either scores a node or removes an edge, so a run always terminates.

use std::collections::BTreeMap;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use npa_core::edge::Relation;
use npa_core::graph::KnowledgeGraph;
use npa_core::id::{EdgeId, NodeId};
use npa_core::node::Entity;

use super::error::RunError;
use super::step::RunSteps;
use crate::mechanism::Mechanism;

/// Key scores are conventionally stored under.
pub const DEFAULT_TAG: &str = "score";

/// Per-run scoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Data key holding a node's prior score, used as the base of computed
    /// scores. Default: `"score"`.
    pub tag: String,
    /// Data key holding a node's experimental measurement.
    pub measurement_key: String,
    /// Score used when a node has no measurement (sources) or no prior
    /// score (computed nodes). Default: `0.0`.
    pub default_score: f64,
}

impl RunnerConfig {
    /// Config with the default tag and default score.
    pub fn new(measurement_key: impl Into<String>) -> Self {
        RunnerConfig {
            tag: DEFAULT_TAG.to_string(),
            measurement_key: measurement_key.into(),
            default_score: 0.0,
        }
    }
}

/// Scoring state of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    Unscored,
    LeafEligible,
    Scored,
}

/// An edge deleted to break a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub relation: Relation,
}

/// One scoring run over a private copy of a mechanism.
///
/// The RNG is injected so runs are reproducible: the same mechanism,
/// config and seed always produce the same score.
#[derive(Debug, Clone)]
pub struct NpaRunner<R = ChaCha8Rng> {
    /// Private copy; edges are removed from it while breaking cycles.
    graph: KnowledgeGraph,
    target: NodeId,
    config: RunnerConfig,
    /// Committed scores. Presence means `NodeState::Scored`.
    scores: BTreeMap<NodeId, f64>,
    rng: R,
    edges_removed: usize,
    iterations: usize,
}

impl<R: Rng> NpaRunner<R> {
    /// Copies `mechanism` and scores every node without predecessors.
    pub fn new(mechanism: &Mechanism, config: RunnerConfig, rng: R) -> Result<Self, RunError> {
        let target = mechanism.target();
        if !mechanism.contains_target() {
            return Err(RunError::TargetMissing { target });
        }

        let graph = mechanism.graph().clone();
        let scores = graph
            .node_ids()
            .filter(|&id| graph.in_degree(id) == 0)
            .filter_map(|id| {
                let entity = graph.node(id)?;
                let score = entity
                    .value(&config.measurement_key)
                    .unwrap_or(config.default_score);
                Some((id, score))
            })
            .collect();

        Ok(NpaRunner {
            graph,
            target,
            config,
            scores,
            rng,
            edges_removed: 0,
            iterations: 0,
        })
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// The run's private graph, with any cycle-breaking removals applied.
    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// All committed scores.
    pub fn scores(&self) -> &BTreeMap<NodeId, f64> {
        &self.scores
    }

    /// The committed score of `node`, if any.
    pub fn score(&self, node: NodeId) -> Option<f64> {
        self.scores.get(&node).copied()
    }

    /// Number of edges removed so far to break cycles.
    pub fn edges_removed(&self) -> usize {
        self.edges_removed
    }

    /// Number of leaf-scoring batches executed so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Current state of `node`. `None` if the node is not in the mechanism.
    pub fn node_state(&self, node: NodeId) -> Option<NodeState> {
        if !self.graph.contains_node(node) {
            None
        } else if self.scores.contains_key(&node) {
            Some(NodeState::Scored)
        } else if self.is_leaf(node) {
            Some(NodeState::LeafEligible)
        } else {
            Some(NodeState::Unscored)
        }
    }

    fn is_scored(&self, node: NodeId) -> bool {
        self.scores.contains_key(&node)
    }

    fn is_leaf(&self, node: NodeId) -> bool {
        !self.is_scored(node) && self.graph.in_edges(node).all(|e| self.is_scored(e.source))
    }

    /// Nodes not yet scored, in ascending order.
    pub fn unscored_nodes(&self) -> Vec<NodeId> {
        self.graph
            .node_ids()
            .filter(|&id| !self.is_scored(id))
            .collect()
    }

    /// Unscored nodes whose every predecessor is scored.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.graph.node_ids().filter(|&id| self.is_leaf(id)).collect()
    }

    pub fn has_leaves(&self) -> bool {
        self.graph.node_ids().any(|id| self.is_leaf(id))
    }

    /// Returns `true` once the target is scored.
    pub fn done_chomping(&self) -> bool {
        self.is_scored(self.target)
    }

    /// The target's score. Fails until [`done_chomping`](Self::done_chomping).
    pub fn get_final_score(&self) -> Result<f64, RunError> {
        self.score(self.target)
            .ok_or(RunError::TargetNotScored { target: self.target })
    }

    /// The subgraph induced over the nodes still unscored.
    pub fn get_remaining_graph(&self) -> KnowledgeGraph {
        self.graph.induced_subgraph(self.unscored_nodes())
    }

    fn label(&self, node: NodeId) -> String {
        self.graph
            .node(node)
            .map(Entity::label)
            .unwrap_or_else(|| format!("NodeId({})", node.0))
    }

    // -----------------------------------------------------------------------
    // Cycle breaking
    // -----------------------------------------------------------------------

    /// In-degree over out-degree of `node` in the current graph.
    pub fn in_out_ratio(&self, node: NodeId) -> Result<f64, RunError> {
        let out_degree = self.graph.out_degree(node);
        if out_degree == 0 {
            return Err(RunError::ZeroOutDegree {
                node,
                label: self.label(node),
            });
        }
        Ok(self.graph.in_degree(node) as f64 / out_degree as f64)
    }

    /// The unscored non-target node with the smallest in/out ratio, ties
    /// going to the lowest node ID.
    ///
    /// Any candidate with out-degree 0 makes the mechanism unscorable and is
    /// reported as [`RunError::ZeroOutDegree`].
    pub fn removal_candidate(&self) -> Result<NodeId, RunError> {
        let mut best: Option<(NodeId, f64)> = None;
        for node in self.unscored_nodes() {
            if node == self.target {
                continue;
            }
            let ratio = self.in_out_ratio(node)?;
            // Strict comparison keeps the earliest (lowest) ID on ties.
            if best.map_or(true, |(_, r)| ratio < r) {
                best = Some((node, ratio));
            }
        }
        best.map(|(node, _)| node)
            .ok_or(RunError::NoRemovalCandidate { target: self.target })
    }

    /// Removes one in-edge of the [removal candidate](Self::removal_candidate),
    /// chosen uniformly at random.
    pub fn remove_random_edge(&mut self) -> Result<RemovedEdge, RunError> {
        let node = self.removal_candidate()?;

        let mut in_edges: Vec<(EdgeId, NodeId, Relation)> = self
            .graph
            .in_edges(node)
            .map(|e| (e.id, e.source, e.relation()))
            .collect();
        in_edges.sort_by_key(|&(id, _, _)| id);
        if in_edges.is_empty() {
            // A candidate with no in-edges would already be a leaf.
            return Err(RunError::NoRemovalCandidate { target: self.target });
        }

        let (id, source, relation) = in_edges[self.rng.gen_range(0..in_edges.len())];
        // The edge was just read from the graph.
        let _ = self.graph.remove_edge(id);
        self.edges_removed += 1;

        debug!(
            from = %self.label(source),
            to = %self.label(node),
            ?relation,
            "removed edge to break cycle"
        );

        Ok(RemovedEdge {
            id,
            source,
            target: node,
            relation,
        })
    }

    /// Removes random edges until at least one leaf exists. Returns the
    /// removed edges in order.
    pub fn remove_random_edge_until_has_leaves(&mut self) -> Result<Vec<RemovedEdge>, RunError> {
        let mut removed = Vec::new();
        while !self.has_leaves() {
            removed.push(self.remove_random_edge()?);
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Scoring
    // -----------------------------------------------------------------------

    /// Score of a leaf: its prior score (or the default) plus the signed
    /// scores of its predecessors, one term per in-edge.
    pub fn calculate_score(&self, node: NodeId) -> f64 {
        let base = self
            .graph
            .node(node)
            .and_then(|entity| entity.value(&self.config.tag))
            .unwrap_or(self.config.default_score);

        self.graph
            .in_edges(node)
            .filter_map(|e| Some(e.relation().sign() * self.score(e.source)?))
            .fold(base, |acc, term| acc + term)
    }

    /// Scores every current leaf as one batch and returns them.
    ///
    /// All batch scores are computed before any is committed, so no leaf
    /// sees another leaf's new score.
    pub fn score_leaves(&mut self) -> Vec<NodeId> {
        let batch: Vec<(NodeId, f64)> = self
            .leaves()
            .into_iter()
            .map(|node| (node, self.calculate_score(node)))
            .collect();

        for &(node, score) in &batch {
            self.scores.entry(node).or_insert(score);
        }
        self.iterations += 1;
        batch.into_iter().map(|(node, _)| node).collect()
    }

    /// Scores the mechanism until the target is scored.
    pub fn run(&mut self) -> Result<(), RunError> {
        while !self.done_chomping() {
            if !self.has_leaves() {
                self.remove_random_edge_until_has_leaves()?;
            }
            self.score_leaves();
        }
        Ok(())
    }

    /// Runs step by step, yielding a snapshot of the remaining graph after
    /// every edge removal and every scoring batch.
    ///
    /// Draining the iterator leaves the runner in the same state as
    /// [`run`](Self::run) with the same RNG.
    pub fn run_with_graph_transformation(&mut self) -> RunSteps<'_, R> {
        RunSteps::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npa_core::node::Function;
    use rand::SeedableRng;

    fn protein(name: &str) -> Entity {
        Entity::new(Function::Protein, "HGNC", name)
    }

    fn runner(graph: KnowledgeGraph, target: NodeId) -> NpaRunner {
        let mechanism = Mechanism::new(graph, target).unwrap();
        NpaRunner::new(
            &mechanism,
            RunnerConfig::new("weight"),
            ChaCha8Rng::seed_from_u64(7),
        )
        .unwrap()
    }

    #[test]
    fn sources_are_scored_on_construction() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_entity(protein("A").with_value("weight", 2.0));
        let b = graph.add_entity(protein("B"));
        let c = graph.add_entity(protein("C"));
        graph.add_edge(a, c, Relation::Increases).unwrap();
        graph.add_edge(b, c, Relation::Increases).unwrap();

        let npa = runner(graph, c);
        assert_eq!(npa.score(a), Some(2.0));
        assert_eq!(npa.score(b), Some(0.0));
        assert_eq!(npa.node_state(c), Some(NodeState::LeafEligible));
        assert_eq!(npa.node_state(NodeId(42)), None);
        assert!(!npa.done_chomping());
    }

    #[test]
    fn signed_sum_with_prior_score_base() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_entity(protein("A").with_value("weight", 2.0));
        let b = graph.add_entity(protein("B").with_value("weight", 3.0));
        let n = graph.add_entity(protein("N").with_value("weight", 9.0));
        let c = graph.add_entity(protein("C").with_value("score", 1.0));
        graph.add_edge(a, c, Relation::Increases).unwrap();
        graph.add_edge(b, c, Relation::DirectlyDecreases).unwrap();
        graph.add_edge(n, c, Relation::CausesNoChange).unwrap();

        let mut npa = runner(graph, c);
        npa.run().unwrap();
        assert_eq!(npa.get_final_score().unwrap(), 1.0 + 2.0 - 3.0);
        assert_eq!(npa.iterations(), 1);
    }

    #[test]
    fn calculate_score_counts_each_edge() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_entity(protein("A").with_value("weight", 2.0));
        let b = graph.add_entity(protein("B").with_value("weight", 5.0));
        let c = graph.add_entity(protein("C"));
        graph.add_edge(a, c, Relation::Increases).unwrap();
        graph.add_edge(a, c, Relation::DirectlyIncreases).unwrap();
        graph.add_edge(b, c, Relation::Decreases).unwrap();
        graph.add_edge(b, c, Relation::CausesNoChange).unwrap();
        graph.add_edge(b, c, Relation::PositiveCorrelation).unwrap();

        let npa = runner(graph, c);
        assert_eq!(npa.calculate_score(c), 2.0 + 2.0 - 5.0);
    }

    #[test]
    fn inert_edges_still_gate_leaves() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_entity(protein("A").with_value("weight", 4.0));
        let b = graph.add_entity(protein("B"));
        let c = graph.add_entity(protein("C"));
        graph.add_edge(a, b, Relation::Increases).unwrap();
        graph.add_edge(b, c, Relation::Association).unwrap();
        graph.add_edge(a, c, Relation::Increases).unwrap();

        let mut npa = runner(graph, c);
        assert_eq!(npa.leaves(), vec![b]);
        npa.run().unwrap();
        assert_eq!(npa.get_final_score().unwrap(), 4.0);
        assert_eq!(npa.iterations(), 2);
    }

    #[test]
    fn final_score_before_run_is_an_error() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_entity(protein("A"));
        let b = graph.add_entity(protein("B"));
        graph.add_edge(a, b, Relation::Increases).unwrap();

        let npa = runner(graph, b);
        assert_eq!(
            npa.get_final_score(),
            Err(RunError::TargetNotScored { target: b })
        );
    }

    #[test]
    fn removal_candidate_prefers_low_ratio_then_low_id() {
        // X <-> Y, both feeding T: equal ratios, X has the lower ID.
        let mut graph = KnowledgeGraph::new();
        let x = graph.add_entity(protein("X"));
        let y = graph.add_entity(protein("Y"));
        let t = graph.add_entity(protein("T"));
        graph.add_edge(x, y, Relation::Increases).unwrap();
        graph.add_edge(y, x, Relation::Increases).unwrap();
        graph.add_edge(x, t, Relation::Increases).unwrap();
        graph.add_edge(y, t, Relation::Increases).unwrap();

        let npa = runner(graph.clone(), t);
        assert_eq!(npa.in_out_ratio(x).unwrap(), 0.5);
        assert_eq!(npa.removal_candidate().unwrap(), x);

        // An extra out-edge lowers Y's ratio below X's.
        graph.add_edge(y, t, Relation::Increases).unwrap();
        let npa = runner(graph, t);
        assert_eq!(npa.removal_candidate().unwrap(), y);
    }

    #[test]
    fn zero_out_degree_candidate_is_fatal() {
        let mut graph = KnowledgeGraph::new();
        let c = graph.add_entity(protein("C"));
        let d = graph.add_entity(protein("D"));
        let y = graph.add_entity(protein("Y"));
        let t = graph.add_entity(protein("T"));
        graph.add_edge(c, d, Relation::Increases).unwrap();
        graph.add_edge(d, c, Relation::Increases).unwrap();
        graph.add_edge(c, t, Relation::Increases).unwrap();
        graph.add_edge(c, y, Relation::Increases).unwrap();

        let mut npa = runner(graph, t);
        match npa.run() {
            Err(RunError::ZeroOutDegree { node, label }) => {
                assert_eq!(node, y);
                assert_eq!(label, "p(HGNC:Y)");
            }
            other => panic!("expected ZeroOutDegree, got {other:?}"),
        }
        assert_eq!(npa.edges_removed(), 0);
    }

    #[test]
    fn target_self_loop_has_no_candidate() {
        let mut graph = KnowledgeGraph::new();
        let t = graph.add_entity(protein("T"));
        graph.add_edge(t, t, Relation::Increases).unwrap();

        let mut npa = runner(graph, t);
        assert_eq!(npa.run(), Err(RunError::NoRemovalCandidate { target: t }));
    }

    #[test]
    fn remaining_graph_holds_unscored_nodes() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_entity(protein("A").with_value("weight", 1.0));
        let b = graph.add_entity(protein("B"));
        let c = graph.add_entity(protein("C"));
        graph.add_edge(a, b, Relation::Increases).unwrap();
        graph.add_edge(b, c, Relation::Increases).unwrap();

        let mut npa = runner(graph, c);
        let remaining = npa.get_remaining_graph();
        assert_eq!(remaining.node_count(), 2);
        assert_eq!(remaining.edge_count(), 1);
        assert!(remaining.find("p(HGNC:A)").is_none());

        npa.run().unwrap();
        assert_eq!(npa.get_remaining_graph().node_count(), 0);
        assert_eq!(npa.get_final_score().unwrap(), 1.0);
    }

    #[test]
    fn scores_are_never_overwritten() {
        let mut graph = KnowledgeGraph::new();
        let a = graph.add_entity(protein("A").with_value("weight", 1.0));
        let b = graph.add_entity(protein("B"));
        graph.add_edge(a, b, Relation::Increases).unwrap();

        let mut npa = runner(graph, b);
        npa.run().unwrap();
        let before = npa.scores().clone();
        // Nothing is left to score; a further batch is empty.
        assert!(npa.score_leaves().is_empty());
        assert_eq!(npa.scores(), &before);
    }
}
