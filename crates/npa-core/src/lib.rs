pub mod edge;
pub mod error;
pub mod graph;
pub mod id;
pub mod node;
pub mod overlay;

// Re-export commonly used types
pub use edge::{CausalEdge, Evidence, Relation, RelationClass};
pub use error::CoreError;
pub use graph::{EdgeView, KnowledgeGraph};
pub use id::{EdgeId, NodeId};
pub use node::{Entity, Function};
