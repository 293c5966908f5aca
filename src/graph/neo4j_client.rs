use std::time::Duration;

use async_trait::async_trait;
use neo4j::query::Query;
use neo4j::{ConnectionPool, Graph};
use tracing::{debug, warn};

use super::{BatchOutcome, GraphClient};
use crate::config::Config;
use crate::errors::GraphError;
use crate::model::{Code, Concept, HasCodeEdge, InterConceptEdge};

/// Adapter over the `neo4j` driver crate, scoped to the handful of parameterized
/// Cypher statements the Snapshot-Diff delta strategy issues (spec §4.6). Each
/// public method is one unit of work: a single transaction for point operations
/// (Phase D/M/F), or one `UNWIND $rows AS row MERGE ...` statement per batch for
/// the bulk upsert and sweep phases.
pub struct Neo4jClient {
    graph: Graph,
    database: String,
    retry_ceiling: u32,
}

impl Neo4jClient {
    pub async fn connect(config: &Config) -> Result<Neo4jClient, GraphError> {
        let pool = ConnectionPool::builder(&config.neo4j_uri)
            .with_user(&config.neo4j_user, &config.neo4j_password)
            .build()
            .map_err(|err| GraphError::Connection(err.to_string()))?;

        let graph = Graph::connect(pool).await.map_err(|err| GraphError::Connection(err.to_string()))?;

        Ok(Neo4jClient { graph, database: config.neo4j_database.clone(), retry_ceiling: config.graph_retry_ceiling })
    }

    /// Runs `query` as its own transaction, retrying transient failures with a
    /// hand-rolled exponential backoff up to `retry_ceiling` attempts (spec §4.6,
    /// §9), the same shape as the NCBI taxonomy downloader's manual retry loop.
    async fn run(&self, query: Query) -> Result<(), GraphError> {
        let mut attempt = 0;
        let mut wait = Duration::from_millis(200);

        loop {
            attempt += 1;
            match self.graph.run(query.clone()).database(&self.database).await {
                Ok(()) => return Ok(()),
                Err(err) if is_transient(&err) && attempt < self.retry_ceiling => {
                    warn!(attempt, ?wait, error = %err, "transient graph error, retrying");
                    tokio::time::sleep(wait).await;
                    wait *= 2;
                }
                Err(err) if is_transient(&err) => {
                    return Err(GraphError::Transient { attempts: attempt, message: err.to_string() });
                }
                Err(err) => return Err(GraphError::Permanent(err.to_string())),
            }
        }
    }

    async fn run_batch(&self, query: Query, row_count: usize) -> BatchOutcome {
        match self.run(query).await {
            Ok(()) => BatchOutcome { committed: row_count, failed: 0, errors: vec![] },
            Err(err) => BatchOutcome { committed: 0, failed: row_count, errors: vec![err.to_string()] },
        }
    }
}

fn is_transient(err: &neo4j::Neo4jError) -> bool {
    matches!(err, neo4j::Neo4jError::ConnectionFailed(_) | neo4j::Neo4jError::Timeout(_) | neo4j::Neo4jError::Deadlock(_))
}

#[async_trait]
impl GraphClient for Neo4jClient {
    async fn ping(&self) -> Result<(), GraphError> {
        self.run(Query::new("RETURN 1")).await
    }

    async fn get_meta_version(&self) -> Result<Option<String>, GraphError> {
        let mut rows = self
            .graph
            .execute(Query::new("MATCH (m:UmlsMeta) RETURN m.version AS version LIMIT 1"))
            .database(&self.database)
            .await
            .map_err(|err| GraphError::Permanent(err.to_string()))?;

        match rows.next().await.map_err(|err| GraphError::Permanent(err.to_string()))? {
            Some(row) => Ok(row.get::<String>("version").ok()),
            None => Ok(None),
        }
    }

    async fn set_meta_version(&self, version: &str) -> Result<(), GraphError> {
        let query = Query::new("MERGE (m:UmlsMeta {id: 'singleton'}) SET m.version = $version")
            .param("version", version);
        self.run(query).await
    }

    async fn delete_concept_cascade(&self, cui: &str) -> Result<(), GraphError> {
        let query = Query::new("MATCH (c:Concept {cui: $cui}) DETACH DELETE c").param("cui", cui);
        self.run(query).await
    }

    /// Transfers `old_cui`'s HAS_CODE and inter-concept edges onto `new_cui`
    /// one relationship group at a time, applying the same union/max logic
    /// `fake::FakeGraph::merge_concept`'s `retarget_edge` helper uses, then
    /// detach-deletes `old_cui`. Four statements rather than a single
    /// `apoc.refactor.mergeNodes` call, because that procedure's relationship
    /// combination has no notion of "union `asserted_by_sabs`, keep the max
    /// `last_seen_version`" (spec §4.5).
    async fn merge_concept(&self, old_cui: &str, new_cui: &str) -> Result<(), GraphError> {
        let has_code = Query::new(
            "MATCH (old:Concept {cui: $old_cui})-[r:HAS_CODE]->(k:Code) \
             MATCH (new:Concept {cui: $new_cui}) \
             MERGE (new)-[:HAS_CODE]->(k) \
             DELETE r",
        )
        .param("old_cui", old_cui)
        .param("new_cui", new_cui);
        self.run(has_code).await?;

        let outgoing = Query::new(
            "MATCH (old:Concept {cui: $old_cui})-[r]->(other:Concept) \
             WHERE other.cui <> $new_cui \
             WITH old, r, other, type(r) AS rel_type, r.source_rela AS source_rela, \
                  coalesce(r.asserted_by_sabs, []) AS sabs, r.last_seen_version AS version \
             MATCH (new:Concept {cui: $new_cui}) \
             CALL apoc.merge.relationship(new, rel_type, {source_rela: source_rela}, {}, other) YIELD rel \
             SET rel.asserted_by_sabs = apoc.coll.toSet(coalesce(rel.asserted_by_sabs, []) + sabs), \
                 rel.last_seen_version = CASE WHEN rel.last_seen_version > version THEN rel.last_seen_version ELSE version END \
             DELETE r",
        )
        .param("old_cui", old_cui)
        .param("new_cui", new_cui);
        self.run(outgoing).await?;

        let incoming = Query::new(
            "MATCH (other:Concept)-[r]->(old:Concept {cui: $old_cui}) \
             WHERE other.cui <> $new_cui \
             WITH old, r, other, type(r) AS rel_type, r.source_rela AS source_rela, \
                  coalesce(r.asserted_by_sabs, []) AS sabs, r.last_seen_version AS version \
             MATCH (new:Concept {cui: $new_cui}) \
             CALL apoc.merge.relationship(other, rel_type, {source_rela: source_rela}, {}, new) YIELD rel \
             SET rel.asserted_by_sabs = apoc.coll.toSet(coalesce(rel.asserted_by_sabs, []) + sabs), \
                 rel.last_seen_version = CASE WHEN rel.last_seen_version > version THEN rel.last_seen_version ELSE version END \
             DELETE r",
        )
        .param("old_cui", old_cui)
        .param("new_cui", new_cui);
        self.run(incoming).await?;

        let delete_old = Query::new("MATCH (old:Concept {cui: $old_cui}) DETACH DELETE old").param("old_cui", old_cui);
        self.run(delete_old).await
    }

    async fn upsert_concepts(&self, batch: &[Concept]) -> Result<BatchOutcome, GraphError> {
        let rows: Vec<_> = batch
            .iter()
            .map(|c| {
                neo4j::value_map! {
                    "cui" => c.cui.clone(),
                    "preferred_name" => c.preferred_name.clone(),
                    "categories" => c.biolink_categories.clone(),
                    "version" => c.last_seen_version.clone(),
                }
            })
            .collect();

        let query = Query::new(
            "UNWIND $rows AS row \
             MERGE (c:Concept {cui: row.cui}) \
             SET c.preferred_name = row.preferred_name, c.last_seen_version = row.version \
             WITH c, row CALL apoc.create.addLabels(c, row.categories) YIELD node RETURN count(node)",
        )
        .param("rows", rows);

        Ok(self.run_batch(query, batch.len()).await)
    }

    async fn upsert_codes(&self, batch: &[Code]) -> Result<BatchOutcome, GraphError> {
        let rows: Vec<_> = batch
            .iter()
            .map(|c| {
                neo4j::value_map! {
                    "code_id" => c.code_id.clone(),
                    "sab" => c.sab.clone(),
                    "code" => c.code.clone(),
                    "name" => c.name.clone(),
                    "version" => c.last_seen_version.clone(),
                }
            })
            .collect();

        let query = Query::new(
            "UNWIND $rows AS row \
             MERGE (c:Code {code_id: row.code_id}) \
             SET c.sab = row.sab, c.code = row.code, c.name = row.name, c.last_seen_version = row.version",
        )
        .param("rows", rows);

        Ok(self.run_batch(query, batch.len()).await)
    }

    async fn upsert_has_code_edges(&self, batch: &[HasCodeEdge]) -> Result<BatchOutcome, GraphError> {
        let rows: Vec<_> = batch
            .iter()
            .map(|e| neo4j::value_map! { "cui" => e.cui.clone(), "code_id" => e.code_id.clone() })
            .collect();

        let query = Query::new(
            "UNWIND $rows AS row \
             MATCH (c:Concept {cui: row.cui}), (k:Code {code_id: row.code_id}) \
             MERGE (c)-[:HAS_CODE]->(k)",
        )
        .param("rows", rows);

        Ok(self.run_batch(query, batch.len()).await)
    }

    async fn upsert_inter_concept_edges(&self, batch: &[InterConceptEdge]) -> Result<BatchOutcome, GraphError> {
        let rows: Vec<_> = batch
            .iter()
            .map(|e| {
                neo4j::value_map! {
                    "source_cui" => e.source_cui.clone(),
                    "target_cui" => e.target_cui.clone(),
                    "source_rela" => e.source_rela.clone(),
                    "predicate" => e.predicate.clone(),
                    "sabs" => e.asserted_by_sabs.clone(),
                    "version" => e.last_seen_version.clone(),
                }
            })
            .collect();

        let query = Query::new(
            "UNWIND $rows AS row \
             MATCH (s:Concept {cui: row.source_cui}), (t:Concept {cui: row.target_cui}) \
             CALL apoc.merge.relationship(s, row.predicate, {source_rela: row.source_rela}, {}, t) \
             YIELD rel \
             SET rel.asserted_by_sabs = apoc.coll.toSet(coalesce(rel.asserted_by_sabs, []) + row.sabs), \
                 rel.last_seen_version = row.version",
        )
        .param("rows", rows);

        Ok(self.run_batch(query, batch.len()).await)
    }

    async fn sweep_stale_inter_concept_edges(&self, version: &str) -> Result<usize, GraphError> {
        let query = Query::new(
            "MATCH (:Concept)-[r]->(:Concept) \
             WHERE r.last_seen_version IS NOT NULL AND r.last_seen_version <> $version \
             WITH r, count(r) AS removed DELETE r RETURN sum(removed) AS removed",
        )
        .param("version", version);

        self.scalar_count(query).await
    }

    async fn sweep_stale_codes(&self, version: &str) -> Result<usize, GraphError> {
        let query = Query::new(
            "MATCH (c:Code) WHERE c.last_seen_version <> $version \
             WITH c, count(c) AS removed DETACH DELETE c RETURN sum(removed) AS removed",
        )
        .param("version", version);

        self.scalar_count(query).await
    }
}

impl Neo4jClient {
    async fn scalar_count(&self, query: Query) -> Result<usize, GraphError> {
        let mut rows = self.graph.execute(query).database(&self.database).await.map_err(|err| {
            if is_transient(&err) {
                GraphError::Transient { attempts: 1, message: err.to_string() }
            }
            else {
                GraphError::Permanent(err.to_string())
            }
        })?;

        let count = match rows.next().await.map_err(|err| GraphError::Permanent(err.to_string()))? {
            Some(row) => row.get::<i64>("removed").unwrap_or(0) as usize,
            None => 0,
        };
        debug!(count, "sweep completed");
        Ok(count)
    }
}
