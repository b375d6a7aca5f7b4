//! The trace collector contract (spec.md §4.F/§6): the `FrameObserver`
//! trait any embedding interpreter/VM implements, and a reference
//! in-process `TraceCollector` that accumulates `(prev_off, off, line)`
//! triples per code unit behind a mutex, scoped to a set of targeted
//! module names.

pub mod collector;
pub mod observer;
pub mod targets;

pub use collector::{OBSERVATIONS_ACCEPTED, OBSERVATIONS_WHILE_UNINSTALLED, TraceCollector};
pub use observer::{FrameObserver, NoopFrameObserver};
pub use targets::{FileNameFilter, is_code_targeted};
