//! The [`Edge`] type and the per-code-unit edge/line maps the builder and
//! classifier populate.

use std::collections::{BTreeSet, HashMap};

use cov_bytecode::{Line, Offset};

/// A possible or observed instruction transition. `src` may be the
/// sentinel [`Offset::BEGIN`] or [`Offset::RAISED`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Edge {
    pub src: Offset,
    pub dst: Offset,
}

impl Edge {
    pub fn new(src: Offset, dst: Offset) -> Self {
        Self { src, dst }
    }
}

/// Edges mapped to the set of source lines they attribute coverage to. An
/// edge can carry more than one line when line starts fall between its two
/// endpoints across different call paths.
pub type EdgeLines = HashMap<Edge, BTreeSet<Line>>;
