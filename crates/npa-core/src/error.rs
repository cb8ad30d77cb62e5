//! Core error types for npa-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the knowledge graph data model.

use crate::id::{EdgeId, NodeId};
use thiserror::Error;

/// Core errors produced by the npa-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node index was not found in the graph.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// An edge index was not found in the graph.
    #[error("edge not found: EdgeId({id})", id = id.0)]
    EdgeNotFound { id: EdgeId },

    /// No entity with the given label exists in the graph.
    #[error("unknown entity: '{label}'")]
    UnknownEntity { label: String },

    /// The label index and the underlying graph disagree.
    #[error("graph inconsistency: {reason}")]
    GraphInconsistency { reason: String },

    /// A serialized graph could not be read or written.
    #[error("graph JSON: {0}")]
    Json(#[from] serde_json::Error),
}
