use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{BatchOutcome, GraphClient};
use crate::errors::GraphError;
use crate::model::{Code, Concept, HasCodeEdge, InterConceptEdge};

#[derive(Debug, Default)]
struct State {
    meta_version: Option<String>,
    concepts: HashMap<String, Concept>,
    codes: HashMap<String, Code>,
    has_code_edges: std::collections::HashSet<(String, String)>,
    inter_concept_edges: HashMap<(String, String, String), InterConceptEdge>,
}

/// An in-memory stand-in for a Cypher-speaking graph database, implementing the
/// same contract as `Neo4jClient`. Used by `DeltaStrategy` tests to exercise the
/// Snapshot-Diff phases without a live database, mirroring the pack's
/// `adapters/in_memory` vs `adapters/neo4j` split for a `GraphStore` trait.
#[derive(Debug, Default)]
pub struct FakeGraph {
    state: Mutex<State>,
}

impl FakeGraph {
    pub fn new() -> FakeGraph {
        FakeGraph::default()
    }

    pub fn concept_count(&self) -> usize {
        self.state.lock().unwrap().concepts.len()
    }

    pub fn code_count(&self) -> usize {
        self.state.lock().unwrap().codes.len()
    }

    pub fn inter_concept_edge_count(&self) -> usize {
        self.state.lock().unwrap().inter_concept_edges.len()
    }

    pub fn has_concept(&self, cui: &str) -> bool {
        self.state.lock().unwrap().concepts.contains_key(cui)
    }

    pub fn has_code(&self, code_id: &str) -> bool {
        self.state.lock().unwrap().codes.contains_key(code_id)
    }

    pub fn has_code_edge(&self, cui: &str, code_id: &str) -> bool {
        self.state.lock().unwrap().has_code_edges.contains(&(cui.to_string(), code_id.to_string()))
    }

    pub fn get_inter_concept_edge(&self, source: &str, target: &str, rela: &str) -> Option<InterConceptEdge> {
        self.state
            .lock()
            .unwrap()
            .inter_concept_edges
            .get(&(source.to_string(), target.to_string(), rela.to_string()))
            .cloned()
    }

    /// Test-setup helper: seed an inter-concept edge directly, bypassing Phase U.
    pub fn seed_inter_concept_edge(&self, edge: InterConceptEdge) {
        self.state.lock().unwrap().inter_concept_edges.insert(edge.key(), edge);
    }

    pub fn seed_concept(&self, concept: Concept) {
        self.state.lock().unwrap().concepts.insert(concept.cui.clone(), concept);
    }

    pub fn seed_code(&self, code: Code) {
        self.state.lock().unwrap().codes.insert(code.code_id.clone(), code);
    }

    pub fn seed_has_code_edge(&self, cui: &str, code_id: &str) {
        self.state.lock().unwrap().has_code_edges.insert((cui.to_string(), code_id.to_string()));
    }
}

#[async_trait]
impl GraphClient for FakeGraph {
    async fn ping(&self) -> Result<(), GraphError> {
        Ok(())
    }

    async fn get_meta_version(&self) -> Result<Option<String>, GraphError> {
        Ok(self.state.lock().unwrap().meta_version.clone())
    }

    async fn set_meta_version(&self, version: &str) -> Result<(), GraphError> {
        self.state.lock().unwrap().meta_version = Some(version.to_string());
        Ok(())
    }

    async fn delete_concept_cascade(&self, cui: &str) -> Result<(), GraphError> {
        let mut state = self.state.lock().unwrap();
        state.concepts.remove(cui);
        state.has_code_edges.retain(|(c, _)| c != cui);
        state.inter_concept_edges.retain(|(source, target, _), _| source != cui && target != cui);
        Ok(())
    }

    async fn merge_concept(&self, old_cui: &str, new_cui: &str) -> Result<(), GraphError> {
        let mut state = self.state.lock().unwrap();

        let old_codes: Vec<String> =
            state.has_code_edges.iter().filter(|(c, _)| c == old_cui).map(|(_, code)| code.clone()).collect();
        for code_id in old_codes {
            state.has_code_edges.insert((new_cui.to_string(), code_id));
        }
        state.has_code_edges.retain(|(c, _)| c != old_cui);

        let outgoing: Vec<InterConceptEdge> =
            state.inter_concept_edges.values().filter(|e| e.source_cui == old_cui).cloned().collect();
        for edge in outgoing {
            retarget_edge(&mut state.inter_concept_edges, edge, new_cui.to_string(), true);
        }

        let incoming: Vec<InterConceptEdge> =
            state.inter_concept_edges.values().filter(|e| e.target_cui == old_cui).cloned().collect();
        for edge in incoming {
            retarget_edge(&mut state.inter_concept_edges, edge, new_cui.to_string(), false);
        }

        state.inter_concept_edges.retain(|(source, target, _), _| source != old_cui && target != old_cui);
        state.concepts.remove(old_cui);

        Ok(())
    }

    async fn upsert_concepts(&self, batch: &[Concept]) -> Result<BatchOutcome, GraphError> {
        let mut state = self.state.lock().unwrap();
        for concept in batch {
            state.concepts.insert(concept.cui.clone(), concept.clone());
        }
        Ok(BatchOutcome { committed: batch.len(), failed: 0, errors: vec![] })
    }

    async fn upsert_codes(&self, batch: &[Code]) -> Result<BatchOutcome, GraphError> {
        let mut state = self.state.lock().unwrap();
        for code in batch {
            state.codes.insert(code.code_id.clone(), code.clone());
        }
        Ok(BatchOutcome { committed: batch.len(), failed: 0, errors: vec![] })
    }

    async fn upsert_has_code_edges(&self, batch: &[HasCodeEdge]) -> Result<BatchOutcome, GraphError> {
        let mut state = self.state.lock().unwrap();
        for edge in batch {
            state.has_code_edges.insert((edge.cui.clone(), edge.code_id.clone()));
        }
        Ok(BatchOutcome { committed: batch.len(), failed: 0, errors: vec![] })
    }

    async fn upsert_inter_concept_edges(&self, batch: &[InterConceptEdge]) -> Result<BatchOutcome, GraphError> {
        let mut state = self.state.lock().unwrap();
        for edge in batch {
            let key = edge.key();
            match state.inter_concept_edges.get_mut(&key) {
                Some(existing) => {
                    let mut union: Vec<String> =
                        existing.asserted_by_sabs.iter().chain(edge.asserted_by_sabs.iter()).cloned().collect();
                    union.sort();
                    union.dedup();
                    existing.asserted_by_sabs = union;
                    existing.last_seen_version = edge.last_seen_version.clone();
                    existing.predicate = edge.predicate.clone();
                }
                None => {
                    state.inter_concept_edges.insert(key, edge.clone());
                }
            }
        }
        Ok(BatchOutcome { committed: batch.len(), failed: 0, errors: vec![] })
    }

    async fn sweep_stale_inter_concept_edges(&self, version: &str) -> Result<usize, GraphError> {
        let mut state = self.state.lock().unwrap();
        let before = state.inter_concept_edges.len();
        state.inter_concept_edges.retain(|_, edge| edge.last_seen_version == version);
        Ok(before - state.inter_concept_edges.len())
    }

    async fn sweep_stale_codes(&self, version: &str) -> Result<usize, GraphError> {
        let mut state = self.state.lock().unwrap();
        let stale: Vec<String> =
            state.codes.iter().filter(|(_, code)| code.last_seen_version != version).map(|(id, _)| id.clone()).collect();
        for code_id in &stale {
            state.codes.remove(code_id);
            state.has_code_edges.retain(|(_, c)| c != code_id);
        }
        Ok(stale.len())
    }
}

fn retarget_edge(
    edges: &mut HashMap<(String, String, String), InterConceptEdge>,
    edge: InterConceptEdge,
    new_cui: String,
    outgoing: bool,
) {
    let mut retargeted = edge.clone();
    if outgoing {
        retargeted.source_cui = new_cui;
    }
    else {
        retargeted.target_cui = new_cui;
    }
    let key = retargeted.key();

    match edges.get_mut(&key) {
        Some(existing) => {
            let mut union: Vec<String> =
                existing.asserted_by_sabs.iter().chain(retargeted.asserted_by_sabs.iter()).cloned().collect();
            union.sort();
            union.dedup();
            existing.asserted_by_sabs = union;
            existing.last_seen_version = std::cmp::max(&existing.last_seen_version, &retargeted.last_seen_version).clone();
        }
        None => {
            edges.insert(key, retargeted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delete_concept_cascade_removes_incident_edges() {
        let graph = FakeGraph::new();
        graph.seed_concept(Concept {
            cui: "C9".into(),
            preferred_name: "x".into(),
            biolink_categories: vec![],
            last_seen_version: "2025AA".into(),
        });
        graph.seed_has_code_edge("C9", "SAB:1");
        graph.seed_inter_concept_edge(InterConceptEdge {
            source_cui: "C9".into(),
            target_cui: "C1".into(),
            source_rela: "RO".into(),
            predicate: "biolink:related_to".into(),
            asserted_by_sabs: vec!["SAB".into()],
            last_seen_version: "2025AA".into(),
        });

        graph.delete_concept_cascade("C9").await.unwrap();

        assert!(!graph.has_concept("C9"));
        assert!(!graph.has_code_edge("C9", "SAB:1"));
        assert_eq!(graph.inter_concept_edge_count(), 0);
    }
}
