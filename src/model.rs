use serde::{Deserialize, Serialize};

/// A UMLS concept, identified by its CUI. Always carries the generic `Concept`
/// label plus zero or more Biolink category labels (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub cui: String,
    pub preferred_name: String,
    pub biolink_categories: Vec<String>,
    pub last_seen_version: String,
}

/// A source-vocabulary code, identified by `{SAB}:{code}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Code {
    pub code_id: String,
    pub sab: String,
    pub code: String,
    pub name: String,
    pub last_seen_version: String,
}

impl Code {
    pub fn code_id(sab: &str, code: &str) -> String {
        format!("{sab}:{code}")
    }
}

/// An unlabeled-attribute `(Concept)-[:HAS_CODE]->(Code)` edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasCodeEdge {
    pub cui: String,
    pub code_id: String,
}

/// An inter-concept edge. The edge type is the Biolink predicate; identity is
/// the triple `(source_cui, target_cui, source_rela)` (spec §3, invariant 3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterConceptEdge {
    pub source_cui: String,
    pub target_cui: String,
    pub source_rela: String,
    pub predicate: String,
    pub asserted_by_sabs: Vec<String>,
    pub last_seen_version: String,
}

impl InterConceptEdge {
    pub fn key(&self) -> (String, String, String) {
        (self.source_cui.clone(), self.target_cui.clone(), self.source_rela.clone())
    }
}

/// The output of one Transformer run over a single RRF snapshot.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub concepts: Vec<Concept>,
    pub codes: Vec<Code>,
    pub has_code_edges: Vec<HasCodeEdge>,
    pub inter_concept_edges: Vec<InterConceptEdge>,
}
