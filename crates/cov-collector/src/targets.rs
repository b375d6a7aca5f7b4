//! Deciding whether a code unit's enclosing module is one of the targeted
//! modules (spec.md §6 — "the collector scopes tracing to code units whose
//! enclosing module name is in the targets set"), with the reference
//! implementation's per-filename memoization since the same filename is
//! asked about on every frame entry.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Is `unit_name` one of `targets`? Pure; the memoized wrapper below is
/// what callers should actually use on a hot path.
pub fn is_code_targeted(unit_name: &str, targets: &HashSet<String>) -> bool {
    targets.contains(unit_name)
}

/// Per-filename cache of [`is_code_targeted`] results, matching the
/// reference implementation's memoization of this check per
/// `co_filename` (a frame enters the same file many times).
#[derive(Debug, Default)]
pub struct FileNameFilter {
    cache: Mutex<HashMap<String, bool>>,
}

impl FileNameFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_targeted(&self, unit_name: &str, targets: &HashSet<String>) -> bool {
        if let Some(&hit) = self.cache.lock().unwrap().get(unit_name) {
            return hit;
        }
        let targeted = is_code_targeted(unit_name, targets);
        self.cache
            .lock()
            .unwrap()
            .insert(unit_name.to_string(), targeted);
        targeted
    }
}
