//! The on-disk snapshot format: a target-name-to-path map plus, per path,
//! every code unit observed there together with its traced edges
//! (spec.md §6 "snapshot format"). Code units round-trip in full (not
//! just their ids) so a coalesced snapshot can be re-analyzed without the
//! workload that produced it — `coven.py`'s `write_coverage`/`coalesce`.

use std::collections::HashMap;
use std::path::PathBuf;

use cov_bytecode::{CodeUnit, TracedEdges};
use serde::{Deserialize, Serialize};

/// One code unit observed at a file path, together with the dynamic edges
/// traced against it. `unit` round-trips in full so the reconciler can
/// re-run `decode`/`build` against coalesced data without the original
/// workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeUnitRecord {
    pub unit: CodeUnit,
    pub traced: TracedEdges,
}

/// A coverage run (or the union of several): which targets resolved to
/// which file, and which code units were observed at each file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// `target_name -> file_path`; `None` means the target was named but
    /// never loaded during this run.
    pub target_paths: HashMap<String, Option<PathBuf>>,
    pub path_code_edges: HashMap<PathBuf, Vec<CodeUnitRecord>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: PathBuf, unit: CodeUnit, traced: TracedEdges) {
        let records = self.path_code_edges.entry(path).or_default();
        if let Some(existing) = records.iter_mut().find(|r| r.unit == unit) {
            existing.traced.extend(traced);
        } else {
            records.push(CodeUnitRecord { unit, traced });
        }
    }
}

/// Union two snapshots. Associative, commutative, and idempotent: merging
/// `a` with itself reproduces `a` (spec.md §8).
pub fn coalesce(a: Snapshot, b: Snapshot) -> Snapshot {
    let mut target_paths = a.target_paths;
    for (target, path) in b.target_paths {
        target_paths
            .entry(target)
            .and_modify(|existing| {
                if existing.is_none() {
                    *existing = path.clone();
                }
            })
            .or_insert(path);
    }

    let mut path_code_edges = a.path_code_edges;
    for (path, records) in b.path_code_edges {
        let dst = path_code_edges.entry(path).or_default();
        for record in records {
            if let Some(existing) = dst.iter_mut().find(|r| r.unit == record.unit) {
                existing.traced.extend(record.traced);
            } else {
                dst.push(record);
            }
        }
    }

    Snapshot {
        target_paths,
        path_code_edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use cov_bytecode::{Line, Offset};

    fn unit(name: &str) -> CodeUnit {
        CodeUnit::new(name, "m.py")
    }

    #[test]
    fn coalesce_unions_edges_for_the_same_code_unit() {
        let mut a = Snapshot::new();
        a.record(
            PathBuf::from("m.py"),
            unit("f"),
            [(Offset::BEGIN, Offset::real(0), Line::real(1))].into_iter().collect(),
        );
        let mut b = Snapshot::new();
        b.record(
            PathBuf::from("m.py"),
            unit("f"),
            [(Offset::real(0), Offset::real(1), Line::real(1))].into_iter().collect(),
        );

        let merged = coalesce(a, b);
        let records = &merged.path_code_edges[&PathBuf::from("m.py")];
        assert_eq!(records.len(), 1, "same code unit should merge into one record");
        assert_eq!(records[0].traced.len(), 2);
    }

    #[test]
    fn coalesce_keeps_distinct_code_units_separate() {
        let mut a = Snapshot::new();
        a.record(PathBuf::from("m.py"), unit("f"), TracedEdges::new());
        let mut b = Snapshot::new();
        b.record(PathBuf::from("m.py"), unit("g"), TracedEdges::new());

        let merged = coalesce(a, b);
        assert_eq!(merged.path_code_edges[&PathBuf::from("m.py")].len(), 2);
    }

    #[test]
    fn coalesce_is_idempotent() {
        let mut a = Snapshot::new();
        a.record(
            PathBuf::from("m.py"),
            unit("f"),
            [(Offset::BEGIN, Offset::real(0), Line::real(1))].into_iter().collect(),
        );
        let once = coalesce(a.clone(), a.clone());
        let twice = coalesce(once.clone(), a);
        assert_eq!(once, twice);
    }

    #[test]
    fn a_null_target_path_is_overridden_by_a_resolved_one() {
        let mut a = Snapshot::new();
        a.target_paths.insert("pkg.mod".to_string(), None);
        let mut b = Snapshot::new();
        b.target_paths
            .insert("pkg.mod".to_string(), Some(PathBuf::from("pkg/mod.py")));

        let merged = coalesce(a, b);
        assert_eq!(
            merged.target_paths["pkg.mod"],
            Some(PathBuf::from("pkg/mod.py"))
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use cov_bytecode::{Line, Offset};
    use proptest::prelude::*;

    const UNIT_NAMES: &[&str] = &["f", "g"];
    const TARGETS: &[(&str, &str)] = &[("pkg.mod", "pkg/mod.py"), ("pkg.other", "pkg/other.py")];

    fn arb_traced() -> impl Strategy<Value = TracedEdges> {
        prop::collection::hash_set(
            (0i32..4, 0i32..4, 1i32..4).prop_map(|(s, d, l)| {
                (Offset::real(s), Offset::real(d), Line::real(l))
            }),
            0..4,
        )
    }

    /// Each generated snapshot draws its resolved path for a given target
    /// name from a fixed pool keyed by that name, never a random one: two
    /// snapshots from the same coverage run never disagree about which
    /// file a target resolves to, so the generator doesn't manufacture
    /// that case either.
    fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
        let target_paths = prop::collection::vec(
            (prop::sample::select(TARGETS), any::<bool>()),
            0..=TARGETS.len(),
        )
        .prop_map(|entries| {
            let mut map = HashMap::new();
            for ((name, path), resolved) in entries {
                let v = if resolved { Some(PathBuf::from(path)) } else { None };
                map.insert(name.to_string(), v);
            }
            map
        });

        let records = prop::collection::vec(
            (prop::sample::select(UNIT_NAMES), arb_traced()),
            0..3,
        );

        (target_paths, records).prop_map(|(target_paths, records)| {
            let mut snap = Snapshot {
                target_paths,
                path_code_edges: HashMap::new(),
            };
            for (name, traced) in records {
                snap.record(PathBuf::from("m.py"), CodeUnit::new(name, "m.py"), traced);
            }
            snap
        })
    }

    proptest! {
        #[test]
        fn coalesce_is_commutative(a in arb_snapshot(), b in arb_snapshot()) {
            prop_assert_eq!(coalesce(a.clone(), b.clone()), coalesce(b, a));
        }

        #[test]
        fn coalesce_is_idempotent(a in arb_snapshot()) {
            prop_assert_eq!(coalesce(a.clone(), a.clone()), a);
        }

        #[test]
        fn coalesce_is_associative(a in arb_snapshot(), b in arb_snapshot(), c in arb_snapshot()) {
            let left = coalesce(coalesce(a.clone(), b.clone()), c.clone());
            let right = coalesce(a, coalesce(b, c));
            prop_assert_eq!(left, right);
        }
    }
}
