use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::errors::Error;
use crate::model::Snapshot;

const CONCEPTS_CSV: &str = "concepts.csv";
const CODES_CSV: &str = "codes.csv";
const HAS_CODE_CSV: &str = "has_code.csv";
const INTER_CONCEPT_CSV: &str = "inter_concept.csv";

/// Emits CSVs shaped for the graph database's offline bulk importer (node and
/// relationship files use distinct typed ID spaces per the importer's
/// convention) and a printable, not-executed, bulk-import shell invocation.
pub struct BulkWriter {
    output_dir: PathBuf,
}

#[derive(Debug, Default, Serialize)]
pub struct BulkWriteReport {
    pub concepts: usize,
    pub codes: usize,
    pub has_code_edges: usize,
    pub inter_concept_edges: usize,
}

impl BulkWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> BulkWriter {
        BulkWriter { output_dir: output_dir.into() }
    }

    #[tracing::instrument(skip_all, fields(output_dir = %self.output_dir.display()))]
    pub fn write(&self, snapshot: &Snapshot) -> Result<BulkWriteReport, Error> {
        fs::create_dir_all(&self.output_dir)?;

        self.write_concepts(&snapshot.concepts)?;
        self.write_codes(&snapshot.codes)?;
        self.write_has_code_edges(&snapshot.has_code_edges)?;
        self.write_inter_concept_edges(&snapshot.inter_concept_edges)?;

        let report = BulkWriteReport {
            concepts: snapshot.concepts.len(),
            codes: snapshot.codes.len(),
            has_code_edges: snapshot.has_code_edges.len(),
            inter_concept_edges: snapshot.inter_concept_edges.len(),
        };
        info!(?report, "bulk CSVs written");
        Ok(report)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    fn write_concepts(&self, concepts: &[crate::model::Concept]) -> Result<(), Error> {
        let mut writer = csv::Writer::from_path(self.path(CONCEPTS_CSV))?;
        writer.write_record(["cui:ID(Concept)", "preferred_name", "last_seen_version", ":LABEL"])?;
        for concept in concepts {
            let labels = concept_labels(concept);
            writer.write_record([&concept.cui, &concept.preferred_name, &concept.last_seen_version, &labels])?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_codes(&self, codes: &[crate::model::Code]) -> Result<(), Error> {
        let mut writer = csv::Writer::from_path(self.path(CODES_CSV))?;
        writer.write_record(["code_id:ID(Code)", "sab", "code", "name", "last_seen_version", ":LABEL"])?;
        for code in codes {
            writer.write_record([&code.code_id, &code.sab, &code.code, &code.name, &code.last_seen_version, &"Code".to_string()])?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_has_code_edges(&self, edges: &[crate::model::HasCodeEdge]) -> Result<(), Error> {
        let mut writer = csv::Writer::from_path(self.path(HAS_CODE_CSV))?;
        writer.write_record([":START_ID(Concept)", ":END_ID(Code)", ":TYPE"])?;
        for edge in edges {
            writer.write_record([&edge.cui, &edge.code_id, &"HAS_CODE".to_string()])?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_inter_concept_edges(&self, edges: &[crate::model::InterConceptEdge]) -> Result<(), Error> {
        let mut writer = csv::Writer::from_path(self.path(INTER_CONCEPT_CSV))?;
        writer.write_record([
            ":START_ID(Concept)",
            ":END_ID(Concept)",
            ":TYPE",
            "source_rela",
            "asserted_by_sabs",
            "last_seen_version",
        ])?;
        for edge in edges {
            writer.write_record([
                &edge.source_cui,
                &edge.target_cui,
                &edge.predicate,
                &edge.source_rela,
                &edge.asserted_by_sabs.join(";"),
                &edge.last_seen_version,
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Builds the printable `neo4j-admin database import full` invocation for
    /// the CSVs just written. This is printed on stdout by the CLI; it is never
    /// executed here (spec §4.4, §9: the user is expected to stop the database
    /// and run it manually).
    pub fn import_invocation(&self, database: &str) -> String {
        let dir = &self.output_dir;
        format!(
            "neo4j-admin database import full {database} \\\n  --nodes=Concept={} \\\n  --nodes=Code={} \\\n  --relationships=HAS_CODE={} \\\n  --relationships={}",
            path_str(dir, CONCEPTS_CSV),
            path_str(dir, CODES_CSV),
            path_str(dir, HAS_CODE_CSV),
            path_str(dir, INTER_CONCEPT_CSV),
        )
    }
}

fn path_str(dir: &Path, name: &str) -> String {
    dir.join(name).display().to_string()
}

fn concept_labels(concept: &crate::model::Concept) -> String {
    let mut labels = vec!["Concept".to_string()];
    for category in &concept.biolink_categories {
        labels.push(category.trim_start_matches("biolink:").to_string());
    }
    labels.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Concept;

    #[test]
    fn concept_labels_always_include_generic_concept_label() {
        let concept = Concept {
            cui: "C001".into(),
            preferred_name: "Drug A".into(),
            biolink_categories: vec!["biolink:ChemicalEntity".into()],
            last_seen_version: "2025AA".into(),
        };
        assert_eq!(concept_labels(&concept), "Concept;ChemicalEntity");
    }

    #[test]
    fn concept_with_no_categories_only_carries_generic_label() {
        let concept = Concept {
            cui: "C001".into(),
            preferred_name: "Drug A".into(),
            biolink_categories: vec![],
            last_seen_version: "2025AA".into(),
        };
        assert_eq!(concept_labels(&concept), "Concept");
    }

    #[test]
    fn writes_four_csvs_and_reports_counts() {
        let dir = tempfile::tempdir().unwrap();
        let writer = BulkWriter::new(dir.path());
        let snapshot = Snapshot {
            concepts: vec![Concept {
                cui: "C001".into(),
                preferred_name: "Drug A".into(),
                biolink_categories: vec![],
                last_seen_version: "2025AA".into(),
            }],
            ..Default::default()
        };

        let report = writer.write(&snapshot).unwrap();
        assert_eq!(report.concepts, 1);
        assert!(dir.path().join(CONCEPTS_CSV).exists());
        assert!(dir.path().join(CODES_CSV).exists());
        assert!(dir.path().join(HAS_CODE_CSV).exists());
        assert!(dir.path().join(INTER_CONCEPT_CSV).exists());
    }

    #[test]
    fn import_invocation_references_all_csvs_without_executing() {
        let writer = BulkWriter::new("/tmp/umls-import");
        let invocation = writer.import_invocation("neo4j");
        assert!(invocation.starts_with("neo4j-admin database import full neo4j"));
        assert!(invocation.contains("concepts.csv"));
        assert!(invocation.contains("inter_concept.csv"));
    }
}
