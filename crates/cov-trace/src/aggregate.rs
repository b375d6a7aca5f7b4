//! The line aggregator: fold per-edge required/matched sets into per-line
//! (required, matched) edge sets and derive coverage verdicts (spec.md
//! §4.E). Mirrors `core-render/src/scheduler.rs`'s delta-folding shape —
//! reduce a raw stream of updates into a compact per-key summary.

use std::collections::{BTreeMap, BTreeSet};

use cov_bytecode::Line;
use cov_graph::{Edge, EdgeLines};

/// `line -> (required edges touching it, matched edges touching it)`.
/// Lines absent from the map are *trivial*: no traceable instruction
/// begins on them.
pub type CoverageMap = BTreeMap<Line, (BTreeSet<Edge>, BTreeSet<Edge>)>;

/// Fold `required` and `matched` edge-to-lines maps into a per-line map.
/// Sentinel lines (`BEGIN`/`RAISED`/`RETURN`) never attribute coverage to
/// a source line and are dropped here.
pub fn aggregate_lines(required: &EdgeLines, matched: &EdgeLines) -> CoverageMap {
    let mut map: CoverageMap = BTreeMap::new();
    for (&edge, lines) in required {
        for &line in lines.iter().filter(|l| l.is_real()) {
            map.entry(line).or_default().0.insert(edge);
        }
    }
    for (&edge, lines) in matched {
        for &line in lines.iter().filter(|l| l.is_real()) {
            map.entry(line).or_default().1.insert(edge);
        }
    }
    map
}

/// A line is covered iff every required edge touching it was matched.
pub fn is_covered(required: &BTreeSet<Edge>, matched: &BTreeSet<Edge>) -> bool {
    required.is_subset(matched)
}

/// Union coverage maps for code units that share a source file
/// (spec.md §4.E — "when multiple code units share a file, union per
/// line before computing verdicts").
pub fn merge_coverage_maps(maps: impl IntoIterator<Item = CoverageMap>) -> CoverageMap {
    let mut out: CoverageMap = BTreeMap::new();
    for map in maps {
        for (line, (req, mat)) in map {
            let entry = out.entry(line).or_default();
            entry.0.extend(req);
            entry.1.extend(mat);
        }
    }
    out
}


#[cfg(test)]
mod proptests {
    use super::*;
    use cov_bytecode::Offset;
    use proptest::prelude::*;

    fn edge_strategy() -> impl Strategy<Value = Edge> {
        (0i32..5, 0i32..5).prop_map(|(s, d)| Edge::new(Offset::real(s), Offset::real(d)))
    }

    proptest! {
        /// spec.md §8: "a line is covered iff every required edge on it
        /// was matched." Any `matched` built as `required` plus arbitrary
        /// extra edges is by construction a superset, so coverage holds
        /// no matter what the extra edges are.
        #[test]
        fn required_subset_of_matched_is_covered(
            required in prop::collection::btree_set(edge_strategy(), 0..6),
            extra in prop::collection::btree_set(edge_strategy(), 0..6),
        ) {
            let matched: BTreeSet<Edge> = required.union(&extra).copied().collect();
            prop_assert!(is_covered(&required, &matched));
        }

        /// The converse: dropping any single required edge from `matched`
        /// makes the line not covered.
        #[test]
        fn dropping_a_required_edge_breaks_coverage(
            required in prop::collection::btree_set(edge_strategy(), 1..6),
        ) {
            let mut matched = required.clone();
            let dropped = *required.iter().next().unwrap();
            matched.remove(&dropped);
            prop_assert!(!is_covered(&required, &matched));
        }
    }
}
