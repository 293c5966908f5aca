mod predicate_table;
mod tui_table;

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::warn;

/// Read-only mapping from UMLS identifiers to Biolink model terms.
///
/// Lookups are pure and constant-time (backed by `phf` compile-time maps). The
/// only mutable state is the "warned once" bookkeeping used to avoid flooding
/// logs with the same unknown-key warning on every row of a multi-gigabyte file.
pub struct BiolinkMap {
    warned_tuis: Mutex<HashSet<String>>,
    warned_relas: Mutex<HashSet<String>>,
}

impl Default for BiolinkMap {
    fn default() -> Self {
        BiolinkMap {
            warned_tuis: Mutex::new(HashSet::new()),
            warned_relas: Mutex::new(HashSet::new()),
        }
    }
}

impl BiolinkMap {
    pub fn new() -> BiolinkMap {
        BiolinkMap::default()
    }

    /// Returns the Biolink category label for a UMLS semantic type identifier,
    /// defaulting to `biolink:NamedThing` for unmapped TUIs.
    pub fn category_for(&self, tui: &str) -> &'static str {
        match tui_table::TUI_TO_CATEGORY.get(tui) {
            Some(category) => category,
            None => {
                self.warn_once(&self.warned_tuis, tui, "tui");
                tui_table::DEFAULT_CATEGORY
            }
        }
    }

    /// Returns the Biolink predicate for a UMLS RELA (falling back to REL),
    /// defaulting to `biolink:related_to` for unmapped values.
    pub fn predicate_for(&self, rela_or_rel: &str) -> &'static str {
        let key = rela_or_rel.to_ascii_lowercase();
        match predicate_table::RELA_TO_PREDICATE.get(key.as_str()) {
            Some(predicate) => predicate,
            None => {
                self.warn_once(&self.warned_relas, rela_or_rel, "rela");
                predicate_table::DEFAULT_PREDICATE
            }
        }
    }

    fn warn_once(&self, seen: &Mutex<HashSet<String>>, key: &str, kind: &'static str) {
        let mut seen = seen.lock().expect("warned-keys lock poisoned");
        if seen.insert(key.to_string()) {
            warn!(kind, key, "no Biolink mapping found, using default");
        }
    }
}
