//! The `coven` CLI argument model, target-name expansion, and resolved
//! run context — the leaf configuration crate `coven-bin` and `cov-report`
//! both depend on, mirroring `core-config`'s role in the teacher.

pub mod cli;
pub mod context;
pub mod targets;

pub use cli::{Cli, Command};
pub use context::CovenContext;
pub use targets::expand_targets;
