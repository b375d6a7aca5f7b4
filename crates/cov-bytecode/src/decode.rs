//! The instruction decoder. Linearizes a [`CodeUnit`]'s raw
//! instruction stream into a dense `Offset -> Instruction` map, coalescing
//! `EXTENDED_ARG` prefixes, carrying line numbers forward, and maintaining
//! the approximate block stack the classifier depends on.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::code_unit::CodeUnit;
use crate::instruction::{BlockFrame, Instruction};
use crate::offset::{Line, Offset};
use crate::opcode::Opcode;

/// A hard structural error: the code unit cannot be analyzed at all.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// `BREAK_LOOP` with no enclosing `SETUP_LOOP` block.
    #[error("off {off}: BREAK_LOOP with no enclosing SETUP_LOOP block")]
    UnboundBreak { off: Offset },
    /// A setup opcode lacked a resolved jump-target argument.
    #[error("off {off}: setup opcode missing a resolved target argument")]
    MissingSetupTarget { off: Offset },
}

/// A recoverable structural anomaly: the instruction proceeds with reduced
/// fidelity rather than aborting the whole decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// An `is_exc_match` comparison was not immediately followed by a
    /// `POP_JUMP_IF_FALSE`, contrary to the compiler shape the heuristic
    /// assumes.
    UnexpectedExcMatchFollower { off: Offset },
}

/// The result of decoding one code unit: a dense offset map (including the
/// `BEGIN`/`RAISED` pseudo-instructions), the real offsets in program
/// order, and any recoverable warnings.
#[derive(Debug, Clone)]
pub struct DecodedCode {
    pub insts: HashMap<Offset, Instruction>,
    /// Real (non-pseudo, non-`EXTENDED_ARG`) offsets in program order.
    pub order: Vec<Offset>,
    pub warnings: Vec<DecodeWarning>,
}

impl DecodedCode {
    pub fn get(&self, off: Offset) -> Option<&Instruction> {
        self.insts.get(&off)
    }
}

struct ExtState {
    off: Offset,
    starts_line: Option<Line>,
}

/// Decode a code unit's raw instruction stream into a dense offset map.
pub fn decode(unit: &CodeUnit) -> Result<DecodedCode, DecodeError> {
    let mut insts: HashMap<Offset, Instruction> = HashMap::new();
    insts.insert(Offset::BEGIN, Instruction::begin());
    insts.insert(Offset::RAISED, Instruction::raised());

    let mut order = Vec::new();
    let mut warnings = Vec::new();

    let mut ext: Option<ExtState> = None;
    let mut blocks: Vec<BlockFrame> = Vec::new();
    let mut prev = Instruction::begin();
    let mut prev2: Option<Instruction> = None;
    let mut exc_match_jmp_dsts: HashSet<Offset> = HashSet::new();

    for (idx, raw) in unit.instructions.iter().enumerate() {
        let index_off = Offset::real(idx as i32);

        if raw.opcode == Opcode::ExtendedArg && ext.is_none() {
            ext = Some(ExtState {
                off: index_off,
                starts_line: raw.starts_line,
            });
        }

        let off = ext.as_ref().map(|e| e.off).unwrap_or(index_off);
        let starts_line = ext.as_ref().and_then(|e| e.starts_line).or(raw.starts_line);
        let line = starts_line.unwrap_or(prev.line);

        // Pop any block whose handler offset we've just reached. This is the
        // documented approximation: blocks are treated as spanning to their
        // handler offset rather than to their real terminator opcode.
        while let Some(top) = blocks.last() {
            if top.handler_off == off {
                blocks.pop();
            } else {
                break;
            }
        }

        if raw.opcode.is_setup() {
            let dst = raw
                .arg
                .as_target()
                .ok_or(DecodeError::MissingSetupTarget { off })?;
            blocks.push(BlockFrame {
                setup_op: raw.opcode,
                handler_off: dst,
            });
        }

        if raw.opcode == Opcode::BreakLoop
            && !blocks.iter().any(|b| b.setup_op == Opcode::SetupLoop)
        {
            return Err(DecodeError::UnboundBreak { off });
        }

        let mut inst = Instruction {
            off,
            opcode: raw.opcode,
            arg: raw.arg.clone(),
            line,
            is_line_start: starts_line.is_some(),
            stack: blocks.clone(),
            is_call_exit: false,
            is_exc_match: false,
            is_exc_match_jmp_src: false,
            is_exc_match_jmp_dst: false,
            is_sf_exc_opt: false,
        };

        if raw.opcode == Opcode::ExtendedArg {
            // Coalesced into the next real instruction; do not finalize.
            continue;
        }
        ext = None;

        if inst.opcode == Opcode::CallFunction {
            let callee = if prev.opcode == Opcode::LoadConst {
                prev2.as_ref()
            } else {
                Some(&prev)
            };
            if let Some(callee) = callee
                && callee.opcode == Opcode::LoadGlobal
                && callee.arg.as_name() == Some("exit")
            {
                inst.is_call_exit = true;
            }
        }

        if inst.opcode == Opcode::CompareOp && inst.arg.as_name() == Some("exception match") {
            inst.is_exc_match = true;
        }
        if prev.is_exc_match {
            if inst.opcode != Opcode::PopJumpIfFalse {
                warnings.push(DecodeWarning::UnexpectedExcMatchFollower { off });
            } else {
                inst.is_exc_match_jmp_src = true;
                if let Some(target) = inst.target() {
                    exc_match_jmp_dsts.insert(target);
                }
            }
        }
        if exc_match_jmp_dsts.contains(&off) {
            inst.is_exc_match_jmp_dst = true;
        }

        order.push(off);
        insts.insert(off, inst.clone());
        prev2 = Some(prev);
        prev = inst;
    }

    Ok(DecodedCode {
        insts,
        order,
        warnings,
    })
}
