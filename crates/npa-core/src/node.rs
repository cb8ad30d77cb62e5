//! Entities: the nodes of a causal knowledge graph.
//!
//! An [`Entity`] is identified by its [`Function`] (the kind of biological
//! entity), a namespace and a name. Its label, e.g. `p(HGNC:APP)`, is unique
//! inside a [`KnowledgeGraph`](crate::graph::KnowledgeGraph).
//!
//! Numeric node data (experimental measurements, prior scores) lives in a
//! single map keyed by caller-chosen strings. The scoring engine only ever
//! reads two keys from it: the measurement key and the output tag.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of biological entity a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Function {
    Abundance,
    Gene,
    Rna,
    MiRna,
    Protein,
    Complex,
    Composite,
    BiologicalProcess,
    Pathology,
    Reaction,
}

impl Function {
    /// Short prefix used when rendering labels.
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Function::Abundance => "a",
            Function::Gene => "g",
            Function::Rna => "r",
            Function::MiRna => "m",
            Function::Protein => "p",
            Function::Complex => "complex",
            Function::Composite => "composite",
            Function::BiologicalProcess => "bp",
            Function::Pathology => "path",
            Function::Reaction => "rxn",
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// A node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// What kind of entity this is.
    pub function: Function,
    /// Namespace of the name, e.g. `HGNC` or `GOBP`.
    pub namespace: String,
    /// Name within the namespace.
    pub name: String,
    /// Numeric data keyed by caller-chosen strings (measurements, prior scores).
    #[serde(default)]
    pub data: BTreeMap<String, f64>,
}

impl Entity {
    /// Creates an entity with no attached data.
    pub fn new(function: Function, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Entity {
            function,
            namespace: namespace.into(),
            name: name.into(),
            data: BTreeMap::new(),
        }
    }

    /// Builder-style helper attaching one numeric value.
    pub fn with_value(mut self, key: impl Into<String>, value: f64) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// The unique label of this entity, e.g. `p(HGNC:APP)`.
    pub fn label(&self) -> String {
        format!("{}({}:{})", self.function, self.namespace, self.name)
    }

    /// Returns the value stored under `key`, if any.
    pub fn value(&self, key: &str) -> Option<f64> {
        self.data.get(key).copied()
    }

    /// Returns `true` if a value is stored under `key`.
    pub fn has_value(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}:{})", self.function, self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_uses_function_abbreviation() {
        let app = Entity::new(Function::Protein, "HGNC", "APP");
        assert_eq!(app.label(), "p(HGNC:APP)");

        let apoptosis = Entity::new(Function::BiologicalProcess, "GOBP", "apoptosis");
        assert_eq!(apoptosis.to_string(), "bp(GOBP:apoptosis)");
    }

    #[test]
    fn values_are_keyed() {
        let node = Entity::new(Function::Rna, "HGNC", "TP53").with_value("weight", 1.5);
        assert_eq!(node.value("weight"), Some(1.5));
        assert!(node.has_value("weight"));
        assert_eq!(node.value("score"), None);
    }

    #[test]
    fn serde_roundtrip() {
        let node = Entity::new(Function::Pathology, "MESHD", "Alzheimer Disease")
            .with_value("weight", -0.25);
        let json = serde_json::to_string(&node).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(node, back);
    }

    #[test]
    fn data_defaults_to_empty_when_missing() {
        let json = r#"{"function":"biologicalProcess","namespace":"GOBP","name":"apoptosis"}"#;
        let node: Entity = serde_json::from_str(json).unwrap();
        assert!(node.data.is_empty());
        assert_eq!(node.function, Function::BiologicalProcess);
    }
}
