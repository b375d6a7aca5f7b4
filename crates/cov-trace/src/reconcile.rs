//! The reconciler: match an observed dynamic edge set against the inferred
//! (required, optional) graph, including the raise/reraise rewrite that
//! makes coverage insensitive to an exception's actual observed source
//! offset (`coven.py::calculate_coverage`).

use std::collections::{BTreeSet, HashMap, HashSet};

use cov_bytecode::{Line, Offset, TracedEdges};
use cov_graph::{Edge, EdgeLines};

/// The result of reconciling one code unit's trace against its inferred
/// graph: edges confirmed covered (a subset of `required`, attributed with
/// the lines they cover) and edges observed but unaccounted for by either
/// edge set (diagnostic only, per spec.md §7 — never changes a verdict).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub matched: EdgeLines,
    pub unexpected: Vec<(Edge, Line)>,
}

/// Reconcile `traced` against `required`/`optional`. Pure: does not mutate
/// its inputs and does not depend on the iteration order of `traced`
/// (spec.md §5 — "the dynamic edge set is a set, not a sequence").
pub fn reconcile(traced: &TracedEdges, required: &EdgeLines, optional: &EdgeLines) -> ReconcileReport {
    let raise_required = raise_required_by_dst(required);
    let raise_optional_dsts = raise_dsts(optional);

    let mut matched: EdgeLines = HashMap::new();
    let mut unexpected = Vec::new();

    for &(s, d, line) in traced {
        let edge = Edge::new(s, d);
        if required.contains_key(&edge) {
            // Attribute the *observed* line, not the edge's full inferred
            // line set: a required edge re-emitted on several carried lines
            // (e.g. an arc re-entered around a loop) must only have the
            // line actually traced marked covered, not every line that
            // happens to require it.
            matched.entry(edge).or_default().insert(line);
            continue;
        }
        if let Some((raise_edge, lines)) = raise_required.get(&d) {
            // Rewrite: attribute the *inferred* raise edge's lines, not the
            // observed `line`, since a reraise via END_FINALLY carries no
            // traceable source offset of its own.
            matched
                .entry(*raise_edge)
                .or_default()
                .extend(lines.iter().copied());
            continue;
        }
        if optional.contains_key(&edge) || raise_optional_dsts.contains(&d) {
            continue;
        }
        unexpected.push((edge, line));
    }

    ReconcileReport { matched, unexpected }
}

/// `dst_off -> (RAISED -> dst_off edge, its attributed lines)` for every
/// required edge whose source is the `RAISED` pseudo-offset.
fn raise_required_by_dst(required: &EdgeLines) -> HashMap<Offset, (Edge, BTreeSet<Line>)> {
    required
        .iter()
        .filter(|(edge, _)| edge.src == Offset::RAISED)
        .map(|(&edge, lines)| (edge.dst, (edge, lines.clone())))
        .collect()
}

/// Destinations of optional edges sourced from `RAISED` — an observed
/// reraise landing here is ignored rather than reported unexpected.
fn raise_dsts(optional: &EdgeLines) -> HashSet<Offset> {
    optional
        .keys()
        .filter(|edge| edge.src == Offset::RAISED)
        .map(|edge| edge.dst)
        .collect()
}
