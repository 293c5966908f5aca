pub mod merge_graph;

use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::{Error, VersionError};
use crate::graph::{run_in_batches, BatchOutcome, GraphClient};
use crate::model::Snapshot;
use crate::rrf::record::{DeletedCuiRow, MergedCuiRow};
use merge_graph::collapse_merge_chains;

/// Per-phase counters folded into the end-of-run summary (spec §7). Serializes
/// to JSON so the CLI can print a machine-readable summary alongside the
/// `tracing::info!` structured log line.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncReport {
    pub explicit_deletes: usize,
    pub explicit_merges: usize,
    pub concepts_upserted: usize,
    pub codes_upserted: usize,
    pub has_code_edges_upserted: usize,
    pub inter_concept_edges_upserted: usize,
    pub upsert_failures: usize,
    pub stale_inter_concept_edges_removed: usize,
    pub stale_codes_removed: usize,
}

/// Drives the five sequential phases of an incremental sync against a single
/// `GraphClient`: explicit Deletes, explicit Merges, snapshot-merge Upsert,
/// stale-Sweep, and Finalize (spec §4.5). Every phase is restartable: rerunning
/// a phase that already committed is a no-op or harmlessly idempotent.
pub struct DeltaStrategy<'a, G: GraphClient> {
    graph: &'a G,
    config: &'a Config,
}

impl<'a, G: GraphClient> DeltaStrategy<'a, G> {
    pub fn new(graph: &'a G, config: &'a Config) -> DeltaStrategy<'a, G> {
        DeltaStrategy { graph, config }
    }

    /// Verifies the precondition in spec §4.1: the incoming version must be
    /// strictly newer than the installed one, unless `reapply` is set, in which
    /// case an equal version is tolerated (and a strictly older one is still rejected).
    pub async fn check_version_precondition(&self, version: &str, reapply: bool) -> Result<(), Error> {
        let installed = self.graph.get_meta_version().await?;

        match installed {
            None => Ok(()),
            Some(installed) if installed.as_str() < version => Ok(()),
            Some(installed) if installed == version && reapply => {
                warn!(version, "reapplying already-installed version due to --reapply");
                Ok(())
            }
            Some(installed) if installed == version => {
                Err(Error::Version(VersionError::AlreadyInstalled(installed)))
            }
            Some(installed) => Err(Error::Version(VersionError::NotNewer { requested: version.to_string(), installed })),
        }
    }

    /// Phase D: detach-deletes every concept named by `DELETEDCUI.RRF`.
    #[tracing::instrument(skip_all)]
    pub async fn run_explicit_deletes(&self, rows: &[DeletedCuiRow], cancel: &CancellationToken) -> Result<usize, Error> {
        let start = Instant::now();
        let mut count = 0;
        for row in rows {
            if cancel.is_cancelled() {
                break;
            }
            self.graph.delete_concept_cascade(&row.cui).await?;
            count += 1;
        }
        info!(count, elapsed_ms = start.elapsed().as_millis(), "phase D (explicit deletes) complete");
        Ok(count)
    }

    /// Phase M: collapses `MERGEDCUI.RRF` chains and merges each pair, one
    /// transaction at a time, oldest-chain-link first (spec §4.2, invariant 5).
    #[tracing::instrument(skip_all)]
    pub async fn run_explicit_merges(&self, rows: &[MergedCuiRow], cancel: &CancellationToken) -> Result<usize, Error> {
        let start = Instant::now();
        let pairs: Vec<(String, String)> = rows.iter().map(|r| (r.old_cui.clone(), r.new_cui.clone())).collect();
        let resolved = collapse_merge_chains(&pairs)?;

        let mut count = 0;
        for (old_cui, new_cui) in &resolved {
            if cancel.is_cancelled() {
                break;
            }
            self.graph.merge_concept(old_cui, new_cui).await?;
            count += 1;
        }
        info!(count, elapsed_ms = start.elapsed().as_millis(), "phase M (explicit merges) complete");
        Ok(count)
    }

    /// Phase U: upserts every node/edge stream in the snapshot in batches of
    /// `config.apoc_batch_size` (spec §4.3, §4.6). Per-batch failures are
    /// recorded in the returned report rather than aborting the run.
    #[tracing::instrument(skip_all)]
    pub async fn run_upsert(&self, snapshot: &Snapshot, cancel: &CancellationToken, report: &mut SyncReport) -> Result<(), Error> {
        let start = Instant::now();
        let batch_size = self.config.apoc_batch_size;

        let concepts = run_in_batches(&snapshot.concepts, batch_size, |chunk| self.graph.upsert_concepts(chunk)).await;
        report.concepts_upserted += concepts.committed;
        report.upsert_failures += concepts.failed;
        log_batch_outcome("concepts", &concepts);
        if cancel.is_cancelled() {
            return Ok(());
        }

        let codes = run_in_batches(&snapshot.codes, batch_size, |chunk| self.graph.upsert_codes(chunk)).await;
        report.codes_upserted += codes.committed;
        report.upsert_failures += codes.failed;
        log_batch_outcome("codes", &codes);
        if cancel.is_cancelled() {
            return Ok(());
        }

        let has_code =
            run_in_batches(&snapshot.has_code_edges, batch_size, |chunk| self.graph.upsert_has_code_edges(chunk)).await;
        report.has_code_edges_upserted += has_code.committed;
        report.upsert_failures += has_code.failed;
        log_batch_outcome("has_code_edges", &has_code);
        if cancel.is_cancelled() {
            return Ok(());
        }

        let inter_concept = run_in_batches(&snapshot.inter_concept_edges, batch_size, |chunk| {
            self.graph.upsert_inter_concept_edges(chunk)
        })
        .await;
        report.inter_concept_edges_upserted += inter_concept.committed;
        report.upsert_failures += inter_concept.failed;
        log_batch_outcome("inter_concept_edges", &inter_concept);

        info!(elapsed_ms = start.elapsed().as_millis(), "phase U (upsert) complete");
        Ok(())
    }

    /// Phase S: removes inter-concept edges and codes last touched by an older
    /// version. Concepts are never swept (invariant 6); only Phase D removes them.
    #[tracing::instrument(skip_all)]
    pub async fn run_stale_sweep(&self, version: &str, cancel: &CancellationToken, report: &mut SyncReport) -> Result<(), Error> {
        let start = Instant::now();

        report.stale_inter_concept_edges_removed = self.graph.sweep_stale_inter_concept_edges(version).await?;
        if cancel.is_cancelled() {
            return Ok(());
        }
        report.stale_codes_removed = self.graph.sweep_stale_codes(version).await?;

        info!(
            edges_removed = report.stale_inter_concept_edges_removed,
            codes_removed = report.stale_codes_removed,
            elapsed_ms = start.elapsed().as_millis(),
            "phase S (stale sweep) complete"
        );
        Ok(())
    }

    /// Phase F: commits the new version. This is the single point after which
    /// a rerun of the same version is rejected absent `--reapply` (spec §4.1).
    #[tracing::instrument(skip_all)]
    pub async fn run_finalize(&self, version: &str) -> Result<(), Error> {
        self.graph.set_meta_version(version).await?;
        info!(version, "phase F (finalize) complete");
        Ok(())
    }

    /// Runs Phases D through F in order, stopping at the next phase boundary if
    /// `cancel` fires (spec §5). Phase F only runs if no cancellation occurred.
    pub async fn run(
        &self,
        version: &str,
        deleted: &[DeletedCuiRow],
        merged: &[MergedCuiRow],
        snapshot: &Snapshot,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, Error> {
        let mut report = SyncReport::default();

        report.explicit_deletes = self.run_explicit_deletes(deleted, cancel).await?;
        if cancel.is_cancelled() {
            warn!("sync cancelled after phase D");
            return Ok(report);
        }

        report.explicit_merges = self.run_explicit_merges(merged, cancel).await?;
        if cancel.is_cancelled() {
            warn!("sync cancelled after phase M");
            return Ok(report);
        }

        self.run_upsert(snapshot, cancel, &mut report).await?;
        if cancel.is_cancelled() {
            warn!("sync cancelled after phase U");
            return Ok(report);
        }

        self.run_stale_sweep(version, cancel, &mut report).await?;
        if cancel.is_cancelled() {
            warn!("sync cancelled after phase S");
            return Ok(report);
        }

        self.run_finalize(version).await?;
        Ok(report)
    }
}

fn log_batch_outcome(stream: &str, outcome: &BatchOutcome) {
    if outcome.failed > 0 {
        warn!(stream, committed = outcome.committed, failed = outcome.failed, errors = ?outcome.errors, "batch upsert had failures");
    }
    else {
        info!(stream, committed = outcome.committed, "batch upsert complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fake::FakeGraph;
    use crate::model::Concept;

    fn config() -> Config {
        Config {
            umls_api_key: None,
            neo4j_uri: String::new(),
            neo4j_user: String::new(),
            neo4j_password: String::new(),
            neo4j_database: String::new(),
            neo4j_import_dir: String::new(),
            sab_filter: vec![],
            sab_priority: vec![],
            suppression_handling: crate::config::SuppressionHandling::default(),
            max_parallel_processes: 1,
            apoc_batch_size: 2,
            graph_retry_ceiling: 3,
            batch_timeout: std::time::Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn first_run_against_empty_graph_has_no_version_precondition_violation() {
        let graph = FakeGraph::new();
        let config = config();
        let strategy = DeltaStrategy::new(&graph, &config);
        strategy.check_version_precondition("2025AA", false).await.unwrap();
    }

    #[tokio::test]
    async fn rerunning_same_version_without_reapply_is_rejected() {
        let graph = FakeGraph::new();
        graph.set_meta_version("2025AA").await.unwrap();
        let config = config();
        let strategy = DeltaStrategy::new(&graph, &config);

        let err = strategy.check_version_precondition("2025AA", false).await.unwrap_err();
        assert!(matches!(err, Error::Version(VersionError::AlreadyInstalled(_))));
    }

    #[tokio::test]
    async fn older_version_is_rejected_even_with_reapply() {
        let graph = FakeGraph::new();
        graph.set_meta_version("2025AB").await.unwrap();
        let config = config();
        let strategy = DeltaStrategy::new(&graph, &config);

        let err = strategy.check_version_precondition("2025AA", true).await.unwrap_err();
        assert!(matches!(err, Error::Version(VersionError::NotNewer { .. })));
    }

    #[tokio::test]
    async fn full_run_executes_all_five_phases() {
        let graph = FakeGraph::new();
        graph.seed_concept(Concept {
            cui: "C_OLD".into(),
            preferred_name: "stale".into(),
            biolink_categories: vec![],
            last_seen_version: "2025AA".into(),
        });

        let config = config();
        let strategy = DeltaStrategy::new(&graph, &config);
        let cancel = CancellationToken::new();

        let snapshot = Snapshot {
            concepts: vec![Concept {
                cui: "C1".into(),
                preferred_name: "Drug A".into(),
                biolink_categories: vec![],
                last_seen_version: "2025AB".into(),
            }],
            ..Default::default()
        };

        let deleted = vec![DeletedCuiRow { cui: "C_DEAD".into() }];
        let merged = vec![MergedCuiRow { old_cui: "C_OLD".into(), new_cui: "C1".into() }];

        let report = strategy.run("2025AB", &deleted, &merged, &snapshot, &cancel).await.unwrap();

        assert_eq!(report.explicit_deletes, 1);
        assert_eq!(report.explicit_merges, 1);
        assert_eq!(report.concepts_upserted, 1);
        assert!(graph.has_concept("C1"));
        assert_eq!(graph.get_meta_version().await.unwrap(), Some("2025AB".to_string()));
    }

    #[tokio::test]
    async fn cancellation_before_upsert_skips_finalize() {
        let graph = FakeGraph::new();
        let config = config();
        let strategy = DeltaStrategy::new(&graph, &config);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let snapshot = Snapshot::default();
        let report = strategy.run("2025AB", &[], &[], &snapshot, &cancel).await.unwrap();

        assert_eq!(report.explicit_deletes, 0);
        assert_eq!(graph.get_meta_version().await.unwrap(), None);
    }
}
