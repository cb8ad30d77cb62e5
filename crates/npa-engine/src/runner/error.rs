//! Errors that abort a single NPA run.
//!
//! A run that fails is discarded by the Monte Carlo layer; other runs over
//! the same mechanism continue. Every variant names the node involved so
//! a failing mechanism can be inspected.

use npa_core::id::NodeId;
use serde::{Deserialize, Serialize};

/// Fatal conditions of one scoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum RunError {
    #[error("target node {target} is not in the mechanism")]
    TargetMissing { target: NodeId },

    /// A cycle-breaking candidate has no outgoing edges, so its in/out ratio
    /// is undefined. The mechanism cannot be scored down to its target.
    #[error("removal candidate {label} (node {node}) has out-degree 0")]
    ZeroOutDegree { node: NodeId, label: String },

    /// No leaves exist and only the target is left unscored.
    #[error("no edge can be removed while scoring target node {target}")]
    NoRemovalCandidate { target: NodeId },

    #[error("target node {target} has not been scored yet")]
    TargetNotScored { target: NodeId },
}
