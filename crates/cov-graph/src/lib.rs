//! The graph builder and edge classifier: turns a decoded code unit into
//! an inferred control-flow graph of required/optional edges, each
//! attributed to the source lines it covers.

pub mod build;
pub mod classify;
pub mod edge;

pub use build::{Graph, GraphError, Run, build};
pub use classify::{is_arc_opt, is_sf_exc_opt};
pub use edge::{Edge, EdgeLines};
