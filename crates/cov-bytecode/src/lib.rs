//! The instruction decoder and the shared bytecode data model.
//!
//! This crate owns the vocabulary every other `coven` crate builds on: the
//! sentinel-aware [`Offset`]/[`Line`] types, the [`Opcode`] surface the
//! classifier heuristics name explicitly, the enriched [`Instruction`], the
//! [`CodeUnit`] tree, and the decoder that turns a raw instruction stream
//! into a dense offset map with block-stack annotations.

pub mod code_unit;
pub mod decode;
pub mod instruction;
pub mod offset;
pub mod opcode;
pub mod traced;

#[cfg(feature = "fixture-vm")]
pub mod asm;
#[cfg(feature = "fixture-vm")]
pub mod vm;

pub use code_unit::{CodeConstant, CodeUnit, CodeUnitId, CodeUnitRegistry, group_by_file};
pub use decode::{DecodeError, DecodeWarning, DecodedCode, decode};
pub use instruction::{Arg, BlockFrame, Instruction, RawInstruction, find_block_dst};
pub use offset::{Line, Offset};
pub use opcode::Opcode;
pub use traced::TracedEdges;

#[cfg(feature = "fixture-vm")]
pub use asm::{AsmError, assemble};
#[cfg(feature = "fixture-vm")]
pub use vm::{Value, VmError, VmOutcome, run};
