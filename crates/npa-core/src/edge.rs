//! Edge types of the knowledge graph.
//!
//! Every edge carries a [`Relation`]. For scoring purposes relations fall into
//! four mutually exclusive [`RelationClass`]es: three causal classes
//! (increase, decrease, no change) and an inert class for correlative and
//! structural relations, which exist in the graph but never contribute to a
//! score.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// The relation asserted by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Relation {
    Increases,
    DirectlyIncreases,
    Decreases,
    DirectlyDecreases,
    CausesNoChange,
    PositiveCorrelation,
    NegativeCorrelation,
    Association,
    HasMember,
    HasComponent,
    IsA,
    TranscribedTo,
    TranslatedTo,
}

/// Semantic class of a relation used by scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationClass {
    /// Source increases target: contributes `+score(source)`.
    Increase,
    /// Source decreases target: contributes `-score(source)`.
    Decrease,
    /// Source causes no change in target: contributes nothing.
    NoChange,
    /// Correlative or structural: not causal.
    Inert,
}

impl Relation {
    /// Returns the scoring class of this relation.
    pub fn class(&self) -> RelationClass {
        match self {
            Relation::Increases | Relation::DirectlyIncreases => RelationClass::Increase,
            Relation::Decreases | Relation::DirectlyDecreases => RelationClass::Decrease,
            Relation::CausesNoChange => RelationClass::NoChange,
            _ => RelationClass::Inert,
        }
    }

    /// Returns `true` for increase, decrease and no-change relations.
    pub fn is_causal(&self) -> bool {
        self.class() != RelationClass::Inert
    }

    /// Sign applied to the source score when this edge feeds a score:
    /// `1.0`, `-1.0`, or `0.0` for relations that carry no signal.
    pub fn sign(&self) -> f64 {
        match self.class() {
            RelationClass::Increase => 1.0,
            RelationClass::Decrease => -1.0,
            RelationClass::NoChange | RelationClass::Inert => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// Provenance of an asserted relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Citation reference, e.g. a PubMed identifier.
    pub citation: String,
    /// Supporting text quoted from the source.
    pub text: String,
}

/// An edge in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CausalEdge {
    /// The asserted relation.
    pub relation: Relation,
    /// Where the assertion came from. Dropped when parallel edges collapse.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<Evidence>,
}

impl CausalEdge {
    /// An edge with no provenance.
    pub fn new(relation: Relation) -> Self {
        CausalEdge {
            relation,
            evidence: None,
        }
    }

    /// An edge backed by a citation.
    pub fn with_evidence(
        relation: Relation,
        citation: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        CausalEdge {
            relation,
            evidence: Some(Evidence {
                citation: citation.into(),
                text: text.into(),
            }),
        }
    }

    /// Shorthand for `self.relation.class()`.
    pub fn class(&self) -> RelationClass {
        self.relation.class()
    }

    /// Shorthand for `self.relation.is_causal()`.
    pub fn is_causal(&self) -> bool {
        self.relation.is_causal()
    }
}

impl From<Relation> for CausalEdge {
    fn from(relation: Relation) -> Self {
        CausalEdge::new(relation)
    }
}
