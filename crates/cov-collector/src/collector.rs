//! The reference trace collector: accumulates `(prev_off, off, line)`
//! triples per code unit behind a mutex, scoped to a set of targeted
//! module names, with an explicit install/uninstall lifecycle bracketing
//! the workload (spec.md §9 — "the trace hook is process-wide... explicit
//! install/uninstall lifecycle").

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cov_bytecode::{CodeUnitId, Line, Offset, TracedEdges};

use crate::observer::FrameObserver;
use crate::targets::FileNameFilter;

/// Opcode observations accepted before `install()` was ever called, or
/// after `uninstall()` — these should never happen in a correctly driven
/// VM and are counted rather than silently dropped, matching
/// `core-events`'s `CHANNEL_SEND_FAILURES`-style telemetry counters.
pub static OBSERVATIONS_WHILE_UNINSTALLED: AtomicU64 = AtomicU64::new(0);
pub static OBSERVATIONS_ACCEPTED: AtomicU64 = AtomicU64::new(0);

/// Owns the per-code-unit edge accumulator and the install/uninstall
/// lifecycle. Cheap to clone: the edge map and install flag are both
/// shared via `Arc`.
#[derive(Clone)]
pub struct TraceCollector {
    edges: Arc<Mutex<HashMap<CodeUnitId, TracedEdges>>>,
    targets: Arc<HashSet<String>>,
    filter: Arc<FileNameFilter>,
    installed: Arc<std::sync::atomic::AtomicBool>,
}

impl TraceCollector {
    pub fn new(targets: HashSet<String>) -> Self {
        Self {
            edges: Arc::new(Mutex::new(HashMap::new())),
            targets: Arc::new(targets),
            filter: Arc::new(FileNameFilter::new()),
            installed: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Is this frame's enclosing module one of the targeted names?
    pub fn is_targeted(&self, unit_name: &str) -> bool {
        self.filter.is_targeted(unit_name, &self.targets)
    }

    pub fn install(&self) {
        self.installed.store(true, Ordering::SeqCst);
        tracing::info!(target: "coven::collector", targets = self.targets.len(), "tracer installed");
    }

    pub fn uninstall(&self) {
        self.installed.store(false, Ordering::SeqCst);
        tracing::info!(target: "coven::collector", "tracer uninstalled");
    }

    pub fn is_installed(&self) -> bool {
        self.installed.load(Ordering::SeqCst)
    }

    /// Snapshot the accumulated edges, consuming nothing (the collector
    /// stays live; call `uninstall` separately once the workload ends).
    pub fn snapshot(&self) -> HashMap<CodeUnitId, TracedEdges> {
        self.edges.lock().unwrap().clone()
    }
}

impl FrameObserver for TraceCollector {
    fn on_opcode(&self, unit: CodeUnitId, prev_off: Offset, off: Offset, line: Line) {
        if !self.installed.load(Ordering::SeqCst) {
            OBSERVATIONS_WHILE_UNINSTALLED.fetch_add(1, Ordering::Relaxed);
            return;
        }
        OBSERVATIONS_ACCEPTED.fetch_add(1, Ordering::Relaxed);
        self.edges
            .lock()
            .unwrap()
            .entry(unit)
            .or_default()
            .insert((prev_off, off, line));
    }
}
