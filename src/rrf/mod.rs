pub mod parser;
pub mod record;

use std::path::Path;

use tracing::info;

use crate::config::Config;
use crate::errors::ParseError;
use parser::{parse_file_parallel, LineOutcome, ParseOutcome};
use record::{DeletedCuiRow, MergedCuiRow, MrconsoRow, MrrelRow, MrstyRow};

/// Default malformed-row threshold before a parse is considered fatally broken.
pub const DEFAULT_MALFORMED_THRESHOLD: usize = 1000;

fn sab_allowed(sab_filter: &[String], sab: &str) -> bool {
    sab_filter.is_empty() || sab_filter.iter().any(|allowed| allowed == sab)
}

/// Parses `MRCONSO.RRF`, applying the SAB allowlist and suppression filters
/// described in spec §4.2 before a row reaches the Transformer.
pub fn parse_mrconso(path: &Path, config: &Config) -> Result<ParseOutcome<MrconsoRow>, ParseError> {
    info!(path = %path.display(), "parsing MRCONSO.RRF");
    let outcome = parse_file_parallel(path, config.max_parallel_processes, DEFAULT_MALFORMED_THRESHOLD, |line| {
        match MrconsoRow::parse(line) {
            None => LineOutcome::Malformed,
            Some(row) => {
                if !sab_allowed(&config.sab_filter, &row.sab) {
                    return LineOutcome::Filtered;
                }
                if config.suppression_handling.should_drop(&row.suppress) {
                    return LineOutcome::Filtered;
                }
                LineOutcome::Kept(row)
            }
        }
    })?;
    info!(parsed = outcome.rows_parsed, skipped = outcome.rows_skipped, "MRCONSO.RRF parsed");
    Ok(outcome)
}

/// Parses `MRREL.RRF`, dropping rows outside the SAB allowlist and self-loops
/// (`CUI1 == CUI2`). Rows referencing a CUI absent from the concept set produced
/// by MRCONSO are filtered later by the Transformer, per spec §4.2.
pub fn parse_mrrel(path: &Path, config: &Config) -> Result<ParseOutcome<MrrelRow>, ParseError> {
    info!(path = %path.display(), "parsing MRREL.RRF");
    let outcome = parse_file_parallel(path, config.max_parallel_processes, DEFAULT_MALFORMED_THRESHOLD, |line| {
        match MrrelRow::parse(line) {
            None => LineOutcome::Malformed,
            Some(row) => {
                if row.cui1 == row.cui2 {
                    return LineOutcome::Filtered;
                }
                if !sab_allowed(&config.sab_filter, &row.sab) {
                    return LineOutcome::Filtered;
                }
                LineOutcome::Kept(row)
            }
        }
    })?;
    info!(parsed = outcome.rows_parsed, skipped = outcome.rows_skipped, "MRREL.RRF parsed");
    Ok(outcome)
}

/// Parses `MRSTY.RRF` (CUI -> TUI assignments). No SAB filtering applies.
pub fn parse_mrsty(path: &Path, config: &Config) -> Result<ParseOutcome<MrstyRow>, ParseError> {
    info!(path = %path.display(), "parsing MRSTY.RRF");
    let outcome = parse_file_parallel(path, config.max_parallel_processes, DEFAULT_MALFORMED_THRESHOLD, |line| {
        match MrstyRow::parse(line) {
            None => LineOutcome::Malformed,
            Some(row) => LineOutcome::Kept(row),
        }
    })?;
    info!(parsed = outcome.rows_parsed, skipped = outcome.rows_skipped, "MRSTY.RRF parsed");
    Ok(outcome)
}

/// Parses `DELETEDCUI.RRF` for Phase D of the delta sync.
pub fn parse_deleted_cui(path: &Path, config: &Config) -> Result<ParseOutcome<DeletedCuiRow>, ParseError> {
    info!(path = %path.display(), "parsing DELETEDCUI.RRF");
    parse_file_parallel(path, config.max_parallel_processes, DEFAULT_MALFORMED_THRESHOLD, |line| {
        match DeletedCuiRow::parse(line) {
            None => LineOutcome::Malformed,
            Some(row) => LineOutcome::Kept(row),
        }
    })
}

/// Parses `MERGEDCUI.RRF` for Phase M of the delta sync.
pub fn parse_merged_cui(path: &Path, config: &Config) -> Result<ParseOutcome<MergedCuiRow>, ParseError> {
    info!(path = %path.display(), "parsing MERGEDCUI.RRF");
    parse_file_parallel(path, config.max_parallel_processes, DEFAULT_MALFORMED_THRESHOLD, |line| {
        match MergedCuiRow::parse(line) {
            None => LineOutcome::Malformed,
            Some(row) => LineOutcome::Kept(row),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
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
            max_parallel_processes: 2,
            apoc_batch_size: 10_000,
            graph_retry_ceiling: 3,
            batch_timeout: std::time::Duration::from_secs(1),
        }
    }

    #[test]
    fn mrconso_suppress_e_is_kept_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MRCONSO.RRF");
        std::fs::write(&path, "C0000139|ENG|P|L1|PF|S1|Y|A1||M1|D1|MSH|PEP|D1|Dipeptides|0|E||\n").unwrap();

        let outcome = parse_mrconso(&path, &test_config()).unwrap();
        assert_eq!(outcome.records.len(), 1);
    }

    #[test]
    fn mrconso_suppress_o_is_dropped_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MRCONSO.RRF");
        std::fs::write(&path, "C0000139|ENG|P|L1|PF|S1|Y|A1||M1|D1|MSH|PEP|D1|Dipeptides|0|O||\n").unwrap();

        let outcome = parse_mrconso(&path, &test_config()).unwrap();
        assert_eq!(outcome.records.len(), 0);
    }

    #[test]
    fn mrrel_self_loop_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MRREL.RRF");
        std::fs::write(&path, "C1|A1|PAR|RO|C1|A2|CHD|treats|R1||MSH|N|N|N||\n").unwrap();

        let outcome = parse_mrrel(&path, &test_config()).unwrap();
        assert_eq!(outcome.records.len(), 0);
    }

    #[test]
    fn mrrel_allowlist_drops_unlisted_sab() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MRREL.RRF");
        std::fs::write(&path, "C1|A1|PAR|RO|C2|A2|CHD|treats|R1||MSH|N|N|N||\n").unwrap();

        let mut config = test_config();
        config.sab_filter = vec!["RXNORM".to_string()];
        let outcome = parse_mrrel(&path, &config).unwrap();
        assert_eq!(outcome.records.len(), 0);
    }

    #[test]
    fn empty_mrrel_yields_zero_edges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("MRREL.RRF");
        std::fs::write(&path, "").unwrap();

        let outcome = parse_mrrel(&path, &test_config()).unwrap();
        assert_eq!(outcome.records.len(), 0);
    }
}
