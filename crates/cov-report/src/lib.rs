//! The source-text ignore heuristics and the textual coverage renderer
//! (spec.md §1/§6, collaborators): neither participates in the core
//! analysis (decode → graph → classify → reconcile → aggregate), but both
//! consume its output and are the natural place a `coven`-shaped binary
//! wires the pieces together.

pub mod ignore;
pub mod ranges;
pub mod report;
pub mod stats;

pub use ignore::{IgnoreKind, calc_ignored_lines};
pub use ranges::line_ranges;
pub use report::{ReportOptions, path_rel_to_current_or_abs, report, report_path};
pub use stats::{Stats, ansi};
