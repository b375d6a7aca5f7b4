//! The contract every embedding interpreter/VM implements so its opcode
//! stream reaches the analyzer (spec.md §4.F/§6): this crate never drives
//! tracing itself, it only defines what a driver must call.

use cov_bytecode::{CodeUnitId, Line, Offset};

/// Implementors must call `on_opcode` for every opcode transition inside a
/// targeted frame, with `prev_off = Offset::BEGIN` on the first observation
/// in that frame (spec.md §6).
pub trait FrameObserver: Send + Sync {
    fn on_opcode(&self, unit: CodeUnitId, prev_off: Offset, off: Offset, line: Line);
}

/// A `FrameObserver` that discards every observation. Useful as a default
/// when tracing is not installed, matching `core-events`'s `NoopEventHooks`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFrameObserver;

impl FrameObserver for NoopFrameObserver {
    fn on_opcode(&self, _unit: CodeUnitId, _prev_off: Offset, _off: Offset, _line: Line) {}
}
