use std::collections::{HashMap, HashSet};

/// MERGEDCUI parsing can produce chains (A merges into B, B merges into C) and,
/// in malformed releases, cycles. This module collapses chains to their
/// terminal target and rejects cycles before Phase M ever touches the graph
/// (spec §4.2, invariant 5).
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MergeGraphError {
    #[error("merge cycle detected among cuis: {0:?}")]
    Cycle(Vec<String>),
}

/// Resolves every `(old_cui, new_cui)` pair to its terminal target, following
/// chains transitively. A pair whose `new_cui` is itself later merged away is
/// rewritten to point at the final survivor. Returns one resolved pair per
/// distinct `old_cui`, in first-seen order.
pub fn collapse_merge_chains(pairs: &[(String, String)]) -> Result<Vec<(String, String)>, MergeGraphError> {
    let mut next: HashMap<&str, &str> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for (old_cui, new_cui) in pairs {
        if !next.contains_key(old_cui.as_str()) {
            order.push(old_cui.as_str());
        }
        next.insert(old_cui.as_str(), new_cui.as_str());
    }

    let mut resolved = Vec::with_capacity(order.len());
    for old_cui in order {
        let target = resolve_chain(old_cui, &next)?;
        resolved.push((old_cui.to_string(), target.to_string()));
    }

    Ok(resolved)
}

fn resolve_chain<'a>(start: &'a str, next: &HashMap<&'a str, &'a str>) -> Result<&'a str, MergeGraphError> {
    let mut visited = HashSet::new();
    let mut current = start;

    loop {
        if !visited.insert(current) {
            let mut cycle: Vec<String> = visited.into_iter().map(str::to_string).collect();
            cycle.sort();
            return Err(MergeGraphError::Cycle(cycle));
        }

        match next.get(current) {
            Some(target) => current = target,
            None => return Ok(current),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(old: &str, new: &str) -> (String, String) {
        (old.to_string(), new.to_string())
    }

    #[test]
    fn single_pair_resolves_to_itself() {
        let resolved = collapse_merge_chains(&[pair("C1", "C2")]).unwrap();
        assert_eq!(resolved, vec![pair("C1", "C2")]);
    }

    #[test]
    fn transitive_chain_collapses_to_terminal_target() {
        let resolved = collapse_merge_chains(&[pair("A", "B"), pair("B", "C")]).unwrap();
        assert_eq!(resolved, vec![pair("A", "C"), pair("B", "C")]);
    }

    #[test]
    fn long_chain_collapses_fully() {
        let resolved = collapse_merge_chains(&[pair("A", "B"), pair("B", "C"), pair("C", "D")]).unwrap();
        assert_eq!(resolved, vec![pair("A", "D"), pair("B", "D"), pair("C", "D")]);
    }

    #[test]
    fn cycle_is_rejected() {
        let err = collapse_merge_chains(&[pair("A", "B"), pair("B", "A")]).unwrap_err();
        match err {
            MergeGraphError::Cycle(mut members) => {
                members.sort();
                assert_eq!(members, vec!["A".to_string(), "B".to_string()]);
            }
        }
    }

    #[test]
    fn duplicate_old_cui_takes_last_mapping() {
        let resolved = collapse_merge_chains(&[pair("A", "B"), pair("A", "C")]).unwrap();
        assert_eq!(resolved, vec![pair("A", "C")]);
    }
}
