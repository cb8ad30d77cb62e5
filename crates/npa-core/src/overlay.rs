//! Overlaying tabular measurements onto graph nodes.
//!
//! Experimental data (e.g. differential expression fold changes) arrives as a
//! table keyed either by full entity label or by bare name. These helpers
//! copy the values into each matching entity's data map under a caller-chosen
//! key, which the scoring engine later reads as the node's measurement.

use std::collections::HashMap;

use tracing::debug;

use crate::graph::KnowledgeGraph;
use crate::node::Function;

/// Writes `data` (entity label -> value) onto the graph under `key`.
///
/// Labels not present in the graph are skipped. Nodes that already hold a
/// value under `key` keep it unless `overwrite` is set. Returns the number
/// of nodes written.
pub fn overlay_data(
    graph: &mut KnowledgeGraph,
    data: &HashMap<String, f64>,
    key: &str,
    overwrite: bool,
) -> usize {
    let mut written = 0;
    for (label, &value) in data {
        let Some(id) = graph.find(label) else {
            debug!(%label, "not in graph");
            continue;
        };
        let Some(entity) = graph.node_mut(id) else {
            continue;
        };
        if entity.has_value(key) && !overwrite {
            debug!(%label, key, "value already present");
            continue;
        }
        entity.data.insert(key.to_string(), value);
        written += 1;
    }
    written
}

/// Writes `data` (bare name -> value) onto every node of the given function
/// and namespace, under `key`.
///
/// Tables from expression experiments usually carry gene symbols only, so
/// the function and namespace are supplied by the caller. Nodes whose name
/// is missing from the table receive `impute` when it is set and are left
/// alone otherwise. Returns the number of nodes written.
pub fn overlay_type_data(
    graph: &mut KnowledgeGraph,
    data: &HashMap<String, f64>,
    key: &str,
    function: Function,
    namespace: &str,
    overwrite: bool,
    impute: Option<f64>,
) -> usize {
    let by_label: HashMap<String, f64> = graph
        .nodes_by_function(function)
        .into_iter()
        .filter_map(|id| graph.node(id))
        .filter(|entity| entity.namespace == namespace)
        .filter_map(|entity| {
            data.get(&entity.name)
                .copied()
                .or(impute)
                .map(|value| (entity.label(), value))
        })
        .collect();

    overlay_data(graph, &by_label, key, overwrite)
}
