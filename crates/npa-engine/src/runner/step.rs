//! Step-wise execution for visualizing how a mechanism is consumed.

use rand::Rng;
use serde::{Deserialize, Serialize};

use npa_core::graph::KnowledgeGraph;
use npa_core::id::NodeId;

use super::error::RunError;
use super::state::{NpaRunner, RemovedEdge};

/// What happened in one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StepKind {
    /// One edge was removed to break a cycle.
    EdgeRemoved { edge: RemovedEdge },
    /// A batch of leaves was scored.
    LeavesScored { nodes: Vec<NodeId> },
}

/// One step of a run, with the unscored part of the mechanism after it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStep {
    pub kind: StepKind,
    pub remaining: KnowledgeGraph,
}

/// Iterator returned by [`NpaRunner::run_with_graph_transformation`].
///
/// Ends once the target is scored or after yielding the first error. It
/// borrows the runner mutably, so the run cannot be restarted while it is
/// alive and resumes where the previous iterator stopped if recreated.
#[derive(Debug)]
pub struct RunSteps<'r, R> {
    runner: &'r mut NpaRunner<R>,
    failed: bool,
}

impl<'r, R: Rng> RunSteps<'r, R> {
    pub(super) fn new(runner: &'r mut NpaRunner<R>) -> Self {
        RunSteps {
            runner,
            failed: false,
        }
    }
}

impl<R: Rng> Iterator for RunSteps<'_, R> {
    type Item = Result<RunStep, RunError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.runner.done_chomping() {
            return None;
        }

        let kind = if self.runner.has_leaves() {
            StepKind::LeavesScored {
                nodes: self.runner.score_leaves(),
            }
        } else {
            match self.runner.remove_random_edge() {
                Ok(edge) => StepKind::EdgeRemoved { edge },
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        };

        Some(Ok(RunStep {
            kind,
            remaining: self.runner.get_remaining_graph(),
        }))
    }
}

impl<R: Rng> std::iter::FusedIterator for RunSteps<'_, R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanism::Mechanism;
    use crate::runner::state::RunnerConfig;
    use npa_core::edge::Relation;
    use npa_core::node::{Entity, Function};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn cyclic_mechanism() -> Mechanism {
        // S -> X <-> Y -> T
        let mut graph = KnowledgeGraph::new();
        let s = graph.add_entity(Entity::new(Function::Protein, "HGNC", "S").with_value("weight", 2.0));
        let x = graph.add_entity(Entity::new(Function::Protein, "HGNC", "X"));
        let y = graph.add_entity(Entity::new(Function::Protein, "HGNC", "Y"));
        let t = graph.add_entity(Entity::new(Function::Pathology, "MESHD", "T"));
        graph.add_edge(s, x, Relation::Increases).unwrap();
        graph.add_edge(x, y, Relation::Increases).unwrap();
        graph.add_edge(y, x, Relation::Decreases).unwrap();
        graph.add_edge(y, t, Relation::Increases).unwrap();
        Mechanism::new(graph, t).unwrap()
    }

    #[test]
    fn steps_end_with_target_scored() {
        let mechanism = cyclic_mechanism();
        let mut npa = NpaRunner::new(
            &mechanism,
            RunnerConfig::new("weight"),
            ChaCha8Rng::seed_from_u64(1),
        )
        .unwrap();

        let steps: Vec<RunStep> = npa
            .run_with_graph_transformation()
            .collect::<Result<_, _>>()
            .unwrap();

        assert!(matches!(steps[0].kind, StepKind::EdgeRemoved { .. }));
        let last = steps.last().unwrap();
        assert!(matches!(last.kind, StepKind::LeavesScored { .. }));
        assert_eq!(last.remaining.node_count(), 0);
        assert!(npa.done_chomping());
        assert!(npa.run_with_graph_transformation().next().is_none());
    }

    #[test]
    fn draining_matches_run() {
        let mechanism = cyclic_mechanism();
        for seed in 0..16 {
            let config = RunnerConfig::new("weight");
            let mut stepped =
                NpaRunner::new(&mechanism, config.clone(), ChaCha8Rng::seed_from_u64(seed)).unwrap();
            let mut direct =
                NpaRunner::new(&mechanism, config, ChaCha8Rng::seed_from_u64(seed)).unwrap();

            let steps = stepped.run_with_graph_transformation().count();
            direct.run().unwrap();

            assert_eq!(stepped.scores(), direct.scores());
            assert_eq!(stepped.edges_removed(), direct.edges_removed());
            assert_eq!(steps, direct.edges_removed() + direct.iterations());
        }
    }

    #[test]
    fn remaining_graph_shrinks() {
        let mechanism = cyclic_mechanism();
        let mut npa = NpaRunner::new(
            &mechanism,
            RunnerConfig::new("weight"),
            ChaCha8Rng::seed_from_u64(3),
        )
        .unwrap();

        let mut previous = npa.get_remaining_graph();
        for step in npa.run_with_graph_transformation() {
            let step = step.unwrap();
            assert!(step.remaining.node_count() <= previous.node_count());
            assert!(step.remaining.edge_count() <= previous.edge_count());
            previous = step.remaining;
        }
    }

    #[test]
    fn snapshots_share_runner_ids() {
        let mechanism = cyclic_mechanism();
        let labels: Vec<(NodeId, String)> = mechanism
            .graph()
            .node_ids()
            .map(|id| (id, mechanism.graph().node(id).unwrap().label()))
            .collect();
        let label_of = |id: NodeId| {
            labels
                .iter()
                .find(|(node, _)| *node == id)
                .map(|(_, label)| label.clone())
                .unwrap()
        };

        for seed in 0..8 {
            let mut npa = NpaRunner::new(
                &mechanism,
                RunnerConfig::new("weight"),
                ChaCha8Rng::seed_from_u64(seed),
            )
            .unwrap();

            let mut previous = npa.get_remaining_graph();
            for step in npa.run_with_graph_transformation() {
                let step = step.unwrap();
                match &step.kind {
                    StepKind::EdgeRemoved { edge } => {
                        // The only cut here, X -> Y, joins two unscored nodes.
                        for node in [edge.source, edge.target] {
                            assert_eq!(step.remaining.node(node).unwrap().label(), label_of(node));
                        }
                        assert!(step.remaining.edge_ids().all(|id| id != edge.id));
                    }
                    StepKind::LeavesScored { nodes } => {
                        for &node in nodes {
                            assert_eq!(previous.node(node).unwrap().label(), label_of(node));
                            assert!(!step.remaining.contains_node(node));
                        }
                    }
                }
                for id in step.remaining.node_ids() {
                    assert_eq!(step.remaining.node(id).unwrap().label(), label_of(id));
                }
                previous = step.remaining;
            }
        }
    }

    #[test]
    fn error_ends_the_sequence() {
        let mut graph = KnowledgeGraph::new();
        let t = graph.add_entity(Entity::new(Function::Protein, "HGNC", "T"));
        graph.add_edge(t, t, Relation::Increases).unwrap();
        let mechanism = Mechanism::new(graph, t).unwrap();
        let mut npa = NpaRunner::new(
            &mechanism,
            RunnerConfig::new("weight"),
            ChaCha8Rng::seed_from_u64(0),
        )
        .unwrap();

        let mut steps = npa.run_with_graph_transformation();
        assert!(matches!(
            steps.next(),
            Some(Err(RunError::NoRemovalCandidate { .. }))
        ));
        assert!(steps.next().is_none());
    }
}
