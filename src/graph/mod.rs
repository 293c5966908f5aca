pub mod fake;
pub mod neo4j_client;

use async_trait::async_trait;

use crate::errors::GraphError;
use crate::model::{Code, Concept, HasCodeEdge, InterConceptEdge};

pub use neo4j_client::Neo4jClient;

/// Outcome of one batched-iteration call (spec §4.6): the server (or the
/// client-driven loop standing in for it) iterates the payload in batches of a
/// fixed size, each batch its own transaction, with per-batch failure isolation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub committed: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl BatchOutcome {
    fn merge(&mut self, other: BatchOutcome) {
        self.committed += other.committed;
        self.failed += other.failed;
        self.errors.extend(other.errors);
    }
}

/// Thin wrapper over a Cypher-speaking graph database, scoped to exactly the
/// operations the Snapshot-Diff delta strategy needs (spec §4.6). A concrete
/// adapter (e.g. `Neo4jClient`) executes these against a live database; `fake::FakeGraph`
/// is an in-memory stand-in used by tests, mirroring the way the pack's
/// `GraphStore` trait is backed by either a Neo4j or an in-memory adapter.
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Verifies connectivity and the required server-side batching capability.
    async fn ping(&self) -> Result<(), GraphError>;

    /// Reads `UmlsMeta.version`, or `None` if the singleton does not exist yet.
    async fn get_meta_version(&self) -> Result<Option<String>, GraphError>;

    /// Sets `UmlsMeta.version` in a single transaction (Phase F, the commit point).
    async fn set_meta_version(&self, version: &str) -> Result<(), GraphError>;

    /// Detach-deletes a Concept and all incident edges (Phase D).
    async fn delete_concept_cascade(&self, cui: &str) -> Result<(), GraphError>;

    /// Transfers `old_cui`'s HAS_CODE and inter-concept edges onto `new_cui`,
    /// unioning provenance and taking the max `last_seen_version` on overlap,
    /// then detach-deletes `old_cui` (Phase M, one pair per transaction).
    async fn merge_concept(&self, old_cui: &str, new_cui: &str) -> Result<(), GraphError>;

    /// Upserts a batch of Concepts, replacing the Biolink label set (Phase U).
    async fn upsert_concepts(&self, batch: &[Concept]) -> Result<BatchOutcome, GraphError>;

    /// Upserts a batch of Codes (Phase U).
    async fn upsert_codes(&self, batch: &[Code]) -> Result<BatchOutcome, GraphError>;

    /// Ensures a batch of HAS_CODE edges exists (Phase U).
    async fn upsert_has_code_edges(&self, batch: &[HasCodeEdge]) -> Result<BatchOutcome, GraphError>;

    /// Upserts a batch of inter-concept edges keyed by `(source_cui, target_cui,
    /// source_rela)`, union-ing `asserted_by_sabs` on match (Phase U).
    async fn upsert_inter_concept_edges(&self, batch: &[InterConceptEdge]) -> Result<BatchOutcome, GraphError>;

    /// Deletes every inter-concept edge whose `last_seen_version != version`,
    /// returning the number removed (Phase S).
    async fn sweep_stale_inter_concept_edges(&self, version: &str) -> Result<usize, GraphError>;

    /// Deletes every Code whose `last_seen_version != version` (and its
    /// collaterally-removed HAS_CODE edges), returning the number removed
    /// (Phase S). Concepts are never removed by this rule (invariant 6).
    async fn sweep_stale_codes(&self, version: &str) -> Result<usize, GraphError>;
}

/// Splits `items` into chunks of `batch_size` and runs `upsert` once per chunk,
/// merging the outcomes. This realizes the "each batch is one transaction,
/// failures on individual batches reported but not fatal" contract for adapters
/// whose underlying driver does not offer server-side batched iteration natively.
pub async fn run_in_batches<T, F>(items: &[T], batch_size: usize, mut upsert: F) -> BatchOutcome
where
    T: Sync,
    F: for<'a> FnMut(
        &'a [T],
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<BatchOutcome, GraphError>> + Send + 'a>>,
{
    let batch_size = batch_size.max(1);
    let mut total = BatchOutcome::default();

    for chunk in items.chunks(batch_size) {
        match upsert(chunk).await {
            Ok(outcome) => total.merge(outcome),
            Err(err) => total.merge(BatchOutcome { committed: 0, failed: chunk.len(), errors: vec![err.to_string()] }),
        }
    }

    total
}
