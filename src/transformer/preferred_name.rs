use crate::rrf::record::MrconsoRow;

/// The sort key used by the Preferred-Name Rule (spec §4.3): smaller sorts first.
/// `input_order` is the row's position in the file, which is preserved by the
/// RRF parser's range-ordered flatten regardless of worker count, so ties beyond
/// the fourth key resolve deterministically no matter how the file was
/// partitioned for parallel parsing.
fn sort_key(row: &MrconsoRow, sab_priority: &[String], input_order: usize) -> (usize, bool, bool, bool, usize) {
    let sab_rank = sab_priority.iter().position(|s| s == &row.sab).unwrap_or(sab_priority.len());
    (sab_rank, row.ts != "P", row.stt != "PF", row.ispref != "Y", input_order)
}

/// Selects the preferred term string for a CUI from its candidate MRCONSO rows,
/// per the Preferred-Name Rule. `candidates` must be in original file order.
pub fn select_preferred_name<'a>(candidates: &'a [MrconsoRow], sab_priority: &[String]) -> Option<&'a str> {
    candidates
        .iter()
        .enumerate()
        .min_by_key(|(index, row)| sort_key(row, sab_priority, *index))
        .map(|(_, row)| row.str_.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(sab: &str, ts: &str, stt: &str, ispref: &str, str_: &str) -> MrconsoRow {
        MrconsoRow {
            cui: "C0000139".to_string(),
            ts: ts.to_string(),
            stt: stt.to_string(),
            ispref: ispref.to_string(),
            sab: sab.to_string(),
            code: "D1".to_string(),
            str_: str_.to_string(),
            suppress: "N".to_string(),
        }
    }

    #[test]
    fn sab_priority_wins_over_everything_else() {
        let candidates = vec![
            row("MSH", "P", "PF", "Y", "Dipeptides (MSH preferred)"),
            row("RXNORM", "S", "VO", "N", "Dipeptides (RxNorm worst flags)"),
        ];
        let priority = vec!["RXNORM".to_string(), "MSH".to_string()];
        assert_eq!(select_preferred_name(&candidates, &priority), Some("Dipeptides (RxNorm worst flags)"));
    }

    #[test]
    fn missing_sab_sorts_after_listed_sabs() {
        let candidates = vec![
            row("UNLISTED", "P", "PF", "Y", "From unlisted source"),
            row("MSH", "S", "VO", "N", "From MSH, worse flags"),
        ];
        let priority = vec!["MSH".to_string()];
        assert_eq!(select_preferred_name(&candidates, &priority), Some("From MSH, worse flags"));
    }

    #[test]
    fn flags_break_ties_within_same_sab() {
        let candidates = vec![
            row("MSH", "S", "PF", "Y", "Not TS=P"),
            row("MSH", "P", "PF", "Y", "TS=P wins"),
        ];
        let priority = vec!["MSH".to_string()];
        assert_eq!(select_preferred_name(&candidates, &priority), Some("TS=P wins"));
    }

    #[test]
    fn ties_fall_back_to_stable_input_order() {
        let candidates = vec![row("MSH", "P", "PF", "Y", "first"), row("MSH", "P", "PF", "Y", "second")];
        let priority = vec!["MSH".to_string()];
        assert_eq!(select_preferred_name(&candidates, &priority), Some("first"));
    }

    #[test]
    fn result_is_independent_of_candidate_order_permutation_given_fixed_input_order_field() {
        // Simulates two different worker-chunk splits producing the same rows in
        // file order either way; the winner must not depend on anything but the
        // rule itself.
        let a = vec![row("MSH", "S", "PF", "Y", "a"), row("RXNORM", "P", "PF", "Y", "b")];
        let b = a.clone();
        let priority = vec!["RXNORM".to_string(), "MSH".to_string()];
        assert_eq!(select_preferred_name(&a, &priority), select_preferred_name(&b, &priority));
    }
}
