pub mod preferred_name;

use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::biolink::BiolinkMap;
use crate::config::Config;
use crate::model::{Code, Concept, HasCodeEdge, InterConceptEdge, Snapshot};
use crate::rrf::record::{MrconsoRow, MrrelRow, MrstyRow};

/// Aggregates parsed MRCONSO/MRREL/MRSTY rows into the Concept, Code, HAS_CODE,
/// and inter-concept edge streams described in spec §4.3.
#[tracing::instrument(skip_all, fields(version = version))]
pub fn transform(
    mrconso: &[MrconsoRow],
    mrrel: &[MrrelRow],
    mrsty: &[MrstyRow],
    version: &str,
    config: &Config,
    biolink: &BiolinkMap,
) -> Snapshot {
    let by_cui = group_by_cui(mrconso);
    let concept_set: HashSet<&str> = by_cui.keys().map(|s| s.as_str()).collect();

    let categories_by_cui = group_categories_by_cui(mrsty, biolink);

    let mut concepts = Vec::with_capacity(by_cui.len());

    for (cui, rows) in &by_cui {
        let preferred_name = preferred_name::select_preferred_name(rows, &config.sab_priority)
            .unwrap_or_default()
            .to_string();

        let mut biolink_categories: Vec<String> =
            categories_by_cui.get(cui.as_str()).cloned().unwrap_or_default();
        biolink_categories.sort();
        biolink_categories.dedup();

        concepts.push(Concept {
            cui: cui.clone(),
            preferred_name,
            biolink_categories,
            last_seen_version: version.to_string(),
        });
    }

    let has_code_edges = build_has_code_edges(mrconso);
    let codes: Vec<Code> = build_codes(mrconso, version);
    let inter_concept_edges = build_inter_concept_edges(mrrel, &concept_set, version, biolink);

    info!(
        concepts = concepts.len(),
        codes = codes.len(),
        has_code_edges = has_code_edges.len(),
        inter_concept_edges = inter_concept_edges.len(),
        "transform complete"
    );

    Snapshot { concepts, codes, has_code_edges, inter_concept_edges }
}

fn group_by_cui(mrconso: &[MrconsoRow]) -> HashMap<String, Vec<MrconsoRow>> {
    let mut by_cui: HashMap<String, Vec<MrconsoRow>> = HashMap::new();
    for row in mrconso {
        by_cui.entry(row.cui.clone()).or_default().push(row.clone());
    }
    by_cui
}

fn group_categories_by_cui(mrsty: &[MrstyRow], biolink: &BiolinkMap) -> HashMap<String, Vec<String>> {
    let mut categories: HashMap<String, Vec<String>> = HashMap::new();
    for row in mrsty {
        categories.entry(row.cui.clone()).or_default().push(biolink.category_for(&row.tui).to_string());
    }
    categories
}

/// Builds one `Code` per distinct `(SAB, code)` pair, taking the name from the
/// first row encountered in file order (spec §4.3) — iterates `mrconso`
/// directly rather than the per-CUI grouping, whose hash-map order is not the
/// original file order and would make cross-CUI ties on the same code
/// non-deterministic.
fn build_codes(mrconso: &[MrconsoRow], version: &str) -> Vec<Code> {
    let mut seen = HashSet::new();
    let mut codes = Vec::new();
    for row in mrconso {
        let code_id = Code::code_id(&row.sab, &row.code);
        if seen.insert(code_id.clone()) {
            codes.push(Code {
                code_id,
                sab: row.sab.clone(),
                code: row.code.clone(),
                name: row.str_.clone(),
                last_seen_version: version.to_string(),
            });
        }
    }
    codes
}

fn build_has_code_edges(mrconso: &[MrconsoRow]) -> Vec<HasCodeEdge> {
    let mut seen = HashSet::new();
    let mut edges = Vec::new();
    for row in mrconso {
        let code_id = Code::code_id(&row.sab, &row.code);
        if seen.insert((row.cui.clone(), code_id.clone())) {
            edges.push(HasCodeEdge { cui: row.cui.clone(), code_id });
        }
    }
    edges
}

fn build_inter_concept_edges(
    mrrel: &[MrrelRow],
    concept_set: &HashSet<&str>,
    version: &str,
    biolink: &BiolinkMap,
) -> Vec<InterConceptEdge> {
    struct Group {
        source_rela: String,
        sabs: HashSet<String>,
    }

    let mut groups: HashMap<(String, String, String), Group> = HashMap::new();

    for row in mrrel {
        if !concept_set.contains(row.cui1.as_str()) || !concept_set.contains(row.cui2.as_str()) {
            continue;
        }

        let source_rela = row.source_rela().to_string();
        let key = (row.cui1.clone(), row.cui2.clone(), source_rela.clone());

        groups
            .entry(key)
            .or_insert_with(|| Group { source_rela: source_rela.clone(), sabs: HashSet::new() })
            .sabs
            .insert(row.sab.clone());
    }

    let mut edges: Vec<InterConceptEdge> = groups
        .into_iter()
        .map(|((source_cui, target_cui, _), group)| {
            let mut asserted_by_sabs: Vec<String> = group.sabs.into_iter().collect();
            asserted_by_sabs.sort();

            InterConceptEdge {
                predicate: biolink.predicate_for(&group.source_rela).to_string(),
                source_rela: group.source_rela,
                source_cui,
                target_cui,
                asserted_by_sabs,
                last_seen_version: version.to_string(),
            }
        })
        .collect();

    edges.sort_by(|a, b| a.key().cmp(&b.key()));
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            umls_api_key: None,
            neo4j_uri: String::new(),
            neo4j_user: String::new(),
            neo4j_password: String::new(),
            neo4j_database: String::new(),
            neo4j_import_dir: String::new(),
            sab_filter: vec![],
            sab_priority: vec!["RXNORM".to_string(), "MSH".to_string()],
            suppression_handling: crate::config::SuppressionHandling::default(),
            max_parallel_processes: 1,
            apoc_batch_size: 10_000,
            graph_retry_ceiling: 3,
            batch_timeout: std::time::Duration::from_secs(1),
        }
    }

    fn conso(cui: &str, sab: &str, code: &str, name: &str, ts: &str) -> MrconsoRow {
        MrconsoRow {
            cui: cui.to_string(),
            ts: ts.to_string(),
            stt: "PF".to_string(),
            ispref: "Y".to_string(),
            sab: sab.to_string(),
            code: code.to_string(),
            str_: name.to_string(),
            suppress: "N".to_string(),
        }
    }

    fn rel(cui1: &str, cui2: &str, rela: &str, rel: &str, sab: &str) -> MrrelRow {
        MrrelRow {
            cui1: cui1.to_string(),
            rel: rel.to_string(),
            cui2: cui2.to_string(),
            rela: rela.to_string(),
            sab: sab.to_string(),
        }
    }

    #[test]
    fn initial_import_scenario_builds_expected_nodes_and_edges() {
        let mrconso = vec![conso("C001", "RXNORM", "1001", "Drug A", "P"), conso("C002", "MSH", "D002", "Disease B", "P")];
        let mrsty = vec![
            MrstyRow { cui: "C001".into(), tui: "T121".into() },
            MrstyRow { cui: "C002".into(), tui: "T047".into() },
        ];

        let biolink = BiolinkMap::new();
        let snapshot = transform(&mrconso, &[], &mrsty, "2025AA", &config(), &biolink);

        assert_eq!(snapshot.concepts.len(), 2);
        assert_eq!(snapshot.codes.len(), 2);
        assert_eq!(snapshot.has_code_edges.len(), 2);

        let c001 = snapshot.concepts.iter().find(|c| c.cui == "C001").unwrap();
        assert_eq!(c001.biolink_categories, vec!["biolink:ChemicalEntity"]);

        let c002 = snapshot.concepts.iter().find(|c| c.cui == "C002").unwrap();
        assert_eq!(c002.biolink_categories, vec!["biolink:Disease"]);
    }

    #[test]
    fn mrrel_with_empty_rela_uses_rel_as_source_rela() {
        let mrconso = vec![conso("C001", "RXNORM", "1001", "Drug A", "P"), conso("C002", "MSH", "D002", "Disease B", "P")];
        let mrrel = vec![rel("C001", "C002", "", "RO", "RXNORM")];

        let biolink = BiolinkMap::new();
        let snapshot = transform(&mrconso, &mrrel, &[], "2025AA", &config(), &biolink);

        assert_eq!(snapshot.inter_concept_edges.len(), 1);
        assert_eq!(snapshot.inter_concept_edges[0].source_rela, "RO");
        assert_eq!(snapshot.inter_concept_edges[0].predicate, "biolink:related_to");
    }

    #[test]
    fn mrrel_referencing_filtered_out_cui_is_dropped() {
        let mrconso = vec![conso("C001", "RXNORM", "1001", "Drug A", "P")];
        let mrrel = vec![rel("C001", "C999", "treats", "RO", "RXNORM")];

        let biolink = BiolinkMap::new();
        let snapshot = transform(&mrconso, &mrrel, &[], "2025AA", &config(), &biolink);

        assert!(snapshot.inter_concept_edges.is_empty());
    }

    #[test]
    fn multiple_sabs_asserting_same_key_are_unioned() {
        let mrconso = vec![conso("C001", "RXNORM", "1001", "Drug A", "P"), conso("C002", "MSH", "D002", "Disease B", "P")];
        let mrrel = vec![rel("C001", "C002", "treats", "RO", "SAB_A"), rel("C001", "C002", "treats", "RO", "SAB_B")];

        let biolink = BiolinkMap::new();
        let snapshot = transform(&mrconso, &mrrel, &[], "2025AA", &config(), &biolink);

        assert_eq!(snapshot.inter_concept_edges.len(), 1);
        assert_eq!(snapshot.inter_concept_edges[0].asserted_by_sabs, vec!["SAB_A".to_string(), "SAB_B".to_string()]);
    }

    #[test]
    fn code_name_comes_from_first_encountered_row() {
        let mrconso =
            vec![conso("C001", "RXNORM", "1001", "First Name", "P"), conso("C002", "RXNORM", "1001", "Second Name", "P")];

        let biolink = BiolinkMap::new();
        let snapshot = transform(&mrconso, &[], &[], "2025AA", &config(), &biolink);

        assert_eq!(snapshot.codes.len(), 1);
        assert_eq!(snapshot.codes[0].name, "First Name");
    }
}
