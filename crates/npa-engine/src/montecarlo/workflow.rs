//! End-to-end analyses: mechanism generation followed by a batch of runs.

use indexmap::IndexMap;
use tracing::{info, warn};

use npa_core::graph::KnowledgeGraph;
use npa_core::id::NodeId;
use npa_core::node::{Entity, Function};

use super::{Batch, MonteCarlo, NpaScore};
use crate::mechanism::{generate_mechanism, Mechanism, MechanismError};

fn label(graph: &KnowledgeGraph, node: NodeId) -> String {
    graph
        .node(node)
        .map(Entity::label)
        .unwrap_or_else(|| format!("NodeId({})", node.0))
}

impl MonteCarlo {
    /// Builds the mechanism of `target`, pruning it when the config asks to.
    pub fn mechanism_for(
        &self,
        graph: &KnowledgeGraph,
        target: NodeId,
    ) -> Result<Mechanism, MechanismError> {
        generate_mechanism(graph, target, self.config.prune_key())
    }

    /// Generates the mechanism of `target` and runs a batch over it.
    pub fn workflow(&self, graph: &KnowledgeGraph, target: NodeId) -> Result<Batch, MechanismError> {
        let mechanism = self.mechanism_for(graph, target)?;
        Ok(self.collect_runs(&mechanism))
    }

    /// Like [`workflow`](Self::workflow), averaged.
    pub fn workflow_average(
        &self,
        graph: &KnowledgeGraph,
        target: NodeId,
    ) -> Result<NpaScore, MechanismError> {
        Ok(self.workflow(graph, target)?.average())
    }

    /// Runs [`workflow`](Self::workflow) for every node of `function`.
    ///
    /// Targets whose mechanism cannot be built, or whose runs all fail, are
    /// left out with a warning.
    pub fn workflow_all(&self, graph: &KnowledgeGraph, function: Function) -> IndexMap<NodeId, Batch> {
        let mut results = IndexMap::new();
        for (target, batch) in self.batches(graph, function) {
            if batch.is_empty() {
                warn!(
                    node = %label(graph, target),
                    failed = batch.summary.failed,
                    skipped = batch.summary.skipped,
                    "no successful run; target omitted"
                );
                continue;
            }
            results.insert(target, batch);
        }
        results
    }

    /// Mean score of every node of `function`.
    ///
    /// Targets whose mechanism cannot be built are left out with a warning.
    /// Targets with no successful run map to [`NpaScore::Undefined`].
    pub fn workflow_all_average(
        &self,
        graph: &KnowledgeGraph,
        function: Function,
    ) -> IndexMap<NodeId, NpaScore> {
        self.batches(graph, function)
            .into_iter()
            .map(|(target, batch)| {
                let score = batch.average();
                if score.is_undefined() {
                    warn!(node = %label(graph, target), "no successful run; score undefined");
                }
                (target, score)
            })
            .collect()
    }

    fn batches(&self, graph: &KnowledgeGraph, function: Function) -> Vec<(NodeId, Batch)> {
        let targets = graph.nodes_by_function(function);
        info!(%function, targets = targets.len(), "scoring targets");

        let mut batches = Vec::with_capacity(targets.len());
        for target in targets {
            if self.cancel.is_cancelled() {
                warn!(remaining = %label(graph, target), "cancelled; remaining targets skipped");
                break;
            }
            match self.workflow(graph, target) {
                Ok(batch) => {
                    if let Some(score) = batch.average().value() {
                        info!(node = %label(graph, target), score, "scored target");
                    }
                    batches.push((target, batch));
                }
                Err(err) => {
                    warn!(node = %label(graph, target), error = %err, "mechanism not built; target omitted");
                }
            }
        }
        batches
    }
}
