//! The dynamic edge set a trace collector hands to the reconciler: every
//! `(prev_off, off, line)` triple observed for one code unit, unordered
//! (spec.md §5 — "the dynamic edge set is a *set*, not a sequence").

use std::collections::HashSet;

use crate::offset::{Line, Offset};

/// `(prev_off, off, line)` triples observed for a single code unit. The
/// first observation in a frame carries `prev_off = Offset::BEGIN`.
pub type TracedEdges = HashSet<(Offset, Offset, Line)>;
