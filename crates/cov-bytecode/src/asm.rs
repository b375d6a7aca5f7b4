//! A small assembler for building [`CodeUnit`]s from a readable textual
//! instruction listing. Used by unit/integration tests that want a realistic
//! multi-block program without hand-assembling a `Vec<RawInstruction>`
//! offset-by-offset, and by `coven trace` to load a `.covbc` fixture program.
//!
//! Listing grammar, one item per line:
//!
//! ```text
//! .line 3            # tags the next real instruction with source line 3
//! loop:               # defines a label at the offset of the next instruction
//! FOR_ITER end
//! LOAD_FAST i
//! JUMP loop
//! end:
//! RETURN_VALUE
//! ```
//!
//! Jump/setup arguments may reference a label (resolved to an [`Offset`]
//! after the whole listing is read) or, for `LOAD_GLOBAL`/`STORE_FAST`/
//! `DELETE_FAST`/`COMPARE_OP`, a quoted name. Blank lines and `#` comments
//! are ignored.

use std::collections::HashMap;

use thiserror::Error;

use crate::code_unit::CodeUnit;
use crate::instruction::{Arg, RawInstruction};
use crate::offset::{Line, Offset};
use crate::opcode::Opcode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error("line {line}: unknown mnemonic {mnemonic:?}")]
    UnknownMnemonic { line: usize, mnemonic: String },
    #[error("line {line}: undefined label {label:?}")]
    UndefinedLabel { line: usize, label: String },
    #[error("line {line}: {mnemonic} requires an argument")]
    MissingArg { line: usize, mnemonic: String },
    #[error("line {line}: label {label:?} defined more than once")]
    DuplicateLabel { line: usize, label: String },
}

fn mnemonic_opcode(mnemonic: &str) -> Option<Opcode> {
    Some(match mnemonic {
        "EXTENDED_ARG" => Opcode::ExtendedArg,
        "LOAD_CONST" => Opcode::LoadConst,
        "LOAD_GLOBAL" => Opcode::LoadGlobal,
        "LOAD_FAST" => Opcode::LoadFast,
        "STORE_FAST" => Opcode::StoreFast,
        "DELETE_FAST" => Opcode::DeleteFast,
        "COMPARE_OP" => Opcode::CompareOp,
        "CALL_FUNCTION" => Opcode::CallFunction,
        "POP_TOP" => Opcode::PopTop,
        "DUP_TOP" => Opcode::DupTop,
        "JUMP_ABSOLUTE" | "JUMP_FORWARD" | "JUMP" => Opcode::Jump,
        "POP_JUMP_IF_FALSE" => Opcode::PopJumpIfFalse,
        "POP_JUMP_IF_TRUE" => Opcode::PopJumpIfTrue,
        "JUMP_IF_FALSE_OR_POP" => Opcode::JumpIfFalseOrPop,
        "JUMP_IF_TRUE_OR_POP" => Opcode::JumpIfTrueOrPop,
        "CONTINUE_LOOP" => Opcode::ContinueLoop,
        "FOR_ITER" => Opcode::ForIter,
        "SETUP_LOOP" => Opcode::SetupLoop,
        "SETUP_EXCEPT" => Opcode::SetupExcept,
        "SETUP_FINALLY" => Opcode::SetupFinally,
        "SETUP_WITH" => Opcode::SetupWith,
        "SETUP_ASYNC_WITH" => Opcode::SetupAsyncWith,
        "BREAK_LOOP" => Opcode::BreakLoop,
        "POP_BLOCK" => Opcode::PopBlock,
        "POP_EXCEPT" => Opcode::PopExcept,
        "END_FINALLY" => Opcode::EndFinally,
        "RAISE_VARARGS" => Opcode::RaiseVarargs,
        "RETURN_VALUE" => Opcode::ReturnValue,
        "YIELD_VALUE" => Opcode::YieldValue,
        "YIELD_FROM" => Opcode::YieldFrom,
        "WITH_CLEANUP_START" => Opcode::WithCleanupStart,
        "WITH_CLEANUP_FINISH" => Opcode::WithCleanupFinish,
        "NOP" => Opcode::Nop,
        "HALT" => Opcode::Halt,
        _ => return None,
    })
}

/// Does this mnemonic take a jump/setup target (a label reference) rather
/// than a name or integer literal?
fn takes_target(op: Opcode) -> bool {
    op.is_jump() || op.is_setup()
}

struct PendingInst {
    line_no: usize,
    mnemonic: String,
    opcode: Opcode,
    raw_arg: Option<String>,
    starts_line: Option<Line>,
}

/// Parse a textual instruction listing into a [`CodeUnit`]'s instruction
/// stream. `name`/`filename` populate the returned unit's identity; it has
/// no nested code units (the listing format doesn't express closures).
pub fn assemble(
    name: impl Into<String>,
    filename: impl Into<std::path::PathBuf>,
    listing: &str,
) -> Result<CodeUnit, AsmError> {
    let mut labels: HashMap<String, u32> = HashMap::new();
    let mut pending: Vec<PendingInst> = Vec::new();
    let mut current_line: Option<Line> = None;

    for (idx, raw_line) in listing.lines().enumerate() {
        let line_no = idx + 1;
        let text = match raw_line.find('#') {
            Some(pos) => &raw_line[..pos],
            None => raw_line,
        }
        .trim();
        if text.is_empty() {
            continue;
        }

        if let Some(n) = text.strip_prefix(".line ") {
            current_line = n.trim().parse::<i32>().ok().map(Line::real);
            continue;
        }

        if let Some(label) = text.strip_suffix(':') {
            let next_off = pending.len() as u32;
            if labels.insert(label.trim().to_string(), next_off).is_some() {
                return Err(AsmError::DuplicateLabel {
                    line: line_no,
                    label: label.trim().to_string(),
                });
            }
            continue;
        }

        let mut parts = text.splitn(2, char::is_whitespace);
        let mnemonic = parts.next().unwrap_or_default().to_string();
        let arg_text = parts.next().map(str::trim).filter(|s| !s.is_empty());
        let opcode = mnemonic_opcode(&mnemonic).ok_or_else(|| AsmError::UnknownMnemonic {
            line: line_no,
            mnemonic: mnemonic.clone(),
        })?;

        pending.push(PendingInst {
            line_no,
            mnemonic,
            opcode,
            raw_arg: arg_text.map(str::to_string),
            starts_line: current_line.take(),
        });
    }

    let mut unit = CodeUnit::new(name, filename);
    for inst in pending {
        let arg = match (&inst.raw_arg, inst.opcode) {
            (None, op) if takes_target(op) => {
                return Err(AsmError::MissingArg {
                    line: inst.line_no,
                    mnemonic: inst.mnemonic,
                });
            }
            (Some(label), op) if takes_target(op) => {
                let target = *labels.get(label.as_str()).ok_or_else(|| AsmError::UndefinedLabel {
                    line: inst.line_no,
                    label: label.clone(),
                })?;
                Arg::Target(Offset::real(target as i32))
            }
            (Some(text), _) => parse_plain_arg(text),
            (None, _) => Arg::None,
        };
        unit.instructions
            .push(RawInstruction::new(inst.opcode, arg, inst.starts_line));
    }
    Ok(unit)
}

fn parse_plain_arg(text: &str) -> Arg {
    if text == "None" {
        return Arg::NoneConst;
    }
    if let Some(stripped) = text.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return Arg::Name(stripped.to_string());
    }
    if let Ok(n) = text.parse::<i64>() {
        return Arg::Int(n);
    }
    Arg::Name(text.to_string())
}
