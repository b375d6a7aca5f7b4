//! A tiny fixture interpreter that actually executes the opcode subset
//! [`crate::decode`] understands, over a small value stack, so a trace
//! collector has something real to observe. It is deliberately not a
//! faithful CPython interpreter: only the handful of opcodes the
//! control-flow heuristics name get real execution semantics, and dynamic
//! values are limited to what the classifier scenarios need (integers,
//! booleans, strings, and a `range`-style iterator).
//!
//! Two simplifications worth calling out up front:
//!
//! - Exception objects are represented by their bare type name (a
//!   [`String`]); there is no exception instance, value, or traceback.
//!   `except` matching is therefore exact string equality against the name
//!   a `LOAD_GLOBAL` resolves to.
//! - A generator resume is modeled by resetting the observer's `prev`
//!   offset to [`Offset::BEGIN`] immediately after a `YIELD_VALUE`/
//!   `YIELD_FROM`, mirroring the same simplification the edge classifier
//!   uses when it treats every generator resume as if it could re-enter at
//!   a fresh call. A real CPython frame's local tracer keeps `prev_off`
//!   across a resume; this fixture does not attempt that fidelity.

use std::collections::HashMap;

use crate::decode::DecodedCode;
use crate::instruction::find_block_dst;
use crate::offset::{Line, Offset};
use crate::opcode::Opcode;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Str(String),
    None,
    Range(std::ops::Range<i64>),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
            Value::None => false,
            Value::Range(r) => !r.is_empty(),
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum VmOutcome {
    Returned(Value),
    /// `exit()` was called, or a `HALT` instruction was reached.
    Halted(i64),
    /// An exception propagated past every enclosing handler.
    Unhandled(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Execution reached an offset the decoder never produced (a malformed
    /// or non-exhaustively-assembled fixture program).
    MissingInstruction(Offset),
    StackUnderflow(Offset),
    /// An opcode this fixture has no runtime semantics for.
    Unsupported(Opcode, Offset),
}

/// Run `code` to completion, calling `on_opcode(prev, off, line)` for every
/// executed instruction exactly as a real trace-function callback would be
/// invoked: `prev` starts at [`Offset::BEGIN`] and becomes the offset just
/// executed after each step.
///
/// `consts` supplies the values `LOAD_CONST` pushes, indexed by the integer
/// the assembler/decoder carried in `Arg::Int`; `args` seeds the local
/// variable table the call is invoked with.
pub fn run<F>(
    code: &DecodedCode,
    consts: &[Value],
    args: HashMap<String, Value>,
    mut on_opcode: F,
) -> Result<VmOutcome, VmError>
where
    F: FnMut(Offset, Offset, Line),
{
    let mut locals = args;
    let mut stack: Vec<Value> = Vec::new();
    let mut current_exception: Option<String> = None;
    let mut prev = Offset::BEGIN;
    let mut pc = *code
        .order
        .first()
        .ok_or(VmError::MissingInstruction(Offset::real(0)))?;

    loop {
        let inst = code.get(pc).ok_or(VmError::MissingInstruction(pc))?;
        on_opcode(prev, pc, inst.line);
        prev = pc;

        let mut next = code
            .order
            .iter()
            .find(|o| **o > pc)
            .copied()
            .unwrap_or(Offset::RETURN);

        match inst.opcode {
            Opcode::Nop | Opcode::PopBlock => {}

            Opcode::LoadConst => {
                if inst.arg.is_none_const() {
                    stack.push(Value::None);
                } else {
                    let idx = match &inst.arg {
                        crate::instruction::Arg::Int(n) => *n as usize,
                        _ => 0,
                    };
                    stack.push(consts.get(idx).cloned().unwrap_or(Value::None));
                }
            }
            Opcode::LoadGlobal => {
                let name = inst.arg.as_name().unwrap_or_default().to_string();
                stack.push(Value::Str(name));
            }
            Opcode::LoadFast => {
                let name = inst.arg.as_name().unwrap_or_default();
                stack.push(locals.get(name).cloned().unwrap_or(Value::None));
            }
            Opcode::StoreFast => {
                let name = inst.arg.as_name().unwrap_or_default().to_string();
                let v = stack.pop().ok_or(VmError::StackUnderflow(pc))?;
                locals.insert(name, v);
            }
            Opcode::DeleteFast => {
                let name = inst.arg.as_name().unwrap_or_default();
                locals.remove(name);
            }
            Opcode::PopTop => {
                stack.pop().ok_or(VmError::StackUnderflow(pc))?;
            }
            Opcode::DupTop => {
                let top = stack.last().cloned().ok_or(VmError::StackUnderflow(pc))?;
                stack.push(top);
            }
            Opcode::CompareOp => {
                let rhs = stack.pop().ok_or(VmError::StackUnderflow(pc))?;
                let lhs = stack.pop().ok_or(VmError::StackUnderflow(pc))?;
                if inst.is_exc_match {
                    let matched = lhs.as_str() == rhs.as_str();
                    stack.push(Value::Bool(matched));
                } else {
                    stack.push(Value::Bool(lhs == rhs));
                }
            }
            Opcode::CallFunction => {
                if inst.is_call_exit {
                    let code = match stack.pop() {
                        Some(Value::Int(n)) => n,
                        _ => 0,
                    };
                    return Ok(VmOutcome::Halted(code));
                }
                let argc = match &inst.arg {
                    crate::instruction::Arg::Int(n) => *n as usize,
                    _ => 0,
                };
                let mut call_args = Vec::with_capacity(argc);
                for _ in 0..argc {
                    call_args.push(stack.pop().ok_or(VmError::StackUnderflow(pc))?);
                }
                call_args.reverse();
                let callee = stack.pop().ok_or(VmError::StackUnderflow(pc))?;
                stack.push(call_builtin(callee.as_str().unwrap_or(""), &call_args));
            }

            Opcode::Jump => next = inst.target().ok_or(VmError::StackUnderflow(pc))?,
            Opcode::PopJumpIfFalse => {
                let v = stack.pop().ok_or(VmError::StackUnderflow(pc))?;
                if !v.truthy() {
                    next = inst.target().ok_or(VmError::StackUnderflow(pc))?;
                }
            }
            Opcode::PopJumpIfTrue => {
                let v = stack.pop().ok_or(VmError::StackUnderflow(pc))?;
                if v.truthy() {
                    next = inst.target().ok_or(VmError::StackUnderflow(pc))?;
                }
            }
            Opcode::JumpIfFalseOrPop => {
                let v = stack.last().cloned().ok_or(VmError::StackUnderflow(pc))?;
                if !v.truthy() {
                    next = inst.target().ok_or(VmError::StackUnderflow(pc))?;
                } else {
                    stack.pop();
                }
            }
            Opcode::JumpIfTrueOrPop => {
                let v = stack.last().cloned().ok_or(VmError::StackUnderflow(pc))?;
                if v.truthy() {
                    next = inst.target().ok_or(VmError::StackUnderflow(pc))?;
                } else {
                    stack.pop();
                }
            }
            Opcode::ContinueLoop => next = inst.target().ok_or(VmError::StackUnderflow(pc))?,

            Opcode::ForIter => {
                let exit = inst.target().ok_or(VmError::StackUnderflow(pc))?;
                match stack.last_mut() {
                    Some(Value::Range(r)) => match r.next() {
                        Some(item) => stack.push(Value::Int(item)),
                        None => {
                            stack.pop();
                            next = exit;
                        }
                    },
                    _ => return Err(VmError::Unsupported(Opcode::ForIter, pc)),
                }
            }

            Opcode::SetupLoop
            | Opcode::SetupExcept
            | Opcode::SetupFinally
            | Opcode::SetupWith
            | Opcode::SetupAsyncWith => {
                // The block itself is tracked statically via `inst.stack`;
                // SETUP_WITH's `__enter__` call is modeled as a no-op.
            }

            Opcode::BreakLoop => {
                next = find_block_dst(&inst.stack, &[Opcode::SetupLoop])
                    .ok_or(VmError::Unsupported(Opcode::BreakLoop, pc))?;
            }

            Opcode::RaiseVarargs => {
                let name = inst.arg.as_name().unwrap_or("Exception").to_string();
                current_exception = Some(name.clone());
                match find_block_dst(
                    &inst.stack,
                    &[Opcode::SetupExcept, Opcode::SetupFinally],
                ) {
                    Some(handler) => {
                        // Real CPython lands in the handler with the
                        // type/value/traceback triple on the stack; this
                        // fixture stands in a single marker value so
                        // DUP_TOP/COMPARE_OP "exception match" behave the
                        // way a compiled except-clause prologue expects.
                        stack.push(Value::Str(name));
                        next = handler;
                    }
                    None => return Ok(VmOutcome::Unhandled(name)),
                }
            }

            Opcode::PopExcept => {
                current_exception = None;
            }

            Opcode::EndFinally => {
                if let Some(name) = current_exception.clone() {
                    match find_block_dst(
                        &inst.stack,
                        &[
                            Opcode::SetupExcept,
                            Opcode::SetupFinally,
                            Opcode::SetupWith,
                            Opcode::SetupAsyncWith,
                        ],
                    ) {
                        Some(handler) => next = handler,
                        None => return Ok(VmOutcome::Unhandled(name)),
                    }
                }
            }

            Opcode::WithCleanupStart => {
                // Models a no-suppress `__exit__(None, None, None)` call.
                stack.push(Value::Bool(false));
            }
            Opcode::WithCleanupFinish => {
                stack.pop();
            }

            Opcode::ReturnValue => {
                let v = stack.pop().unwrap_or(Value::None);
                match find_block_dst(
                    &inst.stack,
                    &[
                        Opcode::SetupFinally,
                        Opcode::SetupWith,
                        Opcode::SetupAsyncWith,
                    ],
                ) {
                    Some(handler) => {
                        stack.push(v);
                        next = handler;
                    }
                    None => return Ok(VmOutcome::Returned(v)),
                }
            }

            Opcode::YieldValue => {
                // Falls through normally; the next observed opcode's `prev`
                // is reset to BEGIN to model a fresh resume.
                prev = Offset::BEGIN;
            }
            Opcode::YieldFrom => {
                match stack.last_mut() {
                    Some(Value::Range(r)) => {
                        if r.next().is_none() {
                            stack.pop();
                        }
                    }
                    _ => return Err(VmError::Unsupported(Opcode::YieldFrom, pc)),
                }
                prev = Offset::BEGIN;
            }

            Opcode::Halt => return Ok(VmOutcome::Halted(0)),

            Opcode::ExtendedArg | Opcode::Other(_) => {
                return Err(VmError::Unsupported(inst.opcode, pc));
            }
        }

        pc = next;
    }
}

fn call_builtin(name: &str, args: &[Value]) -> Value {
    match name {
        "range" => match args.first() {
            Some(Value::Int(n)) => Value::Range(0..*n),
            _ => Value::Range(0..0),
        },
        _ => Value::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use crate::asm::assemble;
    use crate::decode::decode;

    fn run_listing(listing: &str, consts: &[Value]) -> VmOutcome {
        let unit = assemble("f", "m.py", listing).unwrap();
        let decoded = decode(&unit).unwrap();
        run(&decoded, consts, HashMap::new(), |_, _, _| {}).unwrap()
    }

    #[test]
    fn trivial_return_yields_the_loaded_constant() {
        let outcome = run_listing(
            r#"
            .line 1
            LOAD_CONST 0
            RETURN_VALUE
            "#,
            &[Value::Int(1)],
        );
        assert_eq!(outcome, VmOutcome::Returned(Value::Int(1)));
    }

    #[test]
    fn unhandled_raise_without_a_handler_propagates() {
        let outcome = run_listing(
            r#"
            .line 1
            RAISE_VARARGS "ValueError"
            "#,
            &[],
        );
        assert_eq!(outcome, VmOutcome::Unhandled("ValueError".to_string()));
    }

    #[test]
    fn matching_except_clears_the_exception_and_completes() {
        let outcome = run_listing(
            r#"
            .line 1
            SETUP_EXCEPT handler
            RAISE_VARARGS "KeyError"
            POP_BLOCK
            JUMP after
            handler:
            DUP_TOP
            LOAD_GLOBAL "KeyError"
            COMPARE_OP "exception match"
            POP_JUMP_IF_FALSE reraise
            POP_TOP
            POP_EXCEPT
            JUMP after
            reraise:
            END_FINALLY
            after:
            LOAD_CONST 0
            RETURN_VALUE
            "#,
            &[Value::Int(7)],
        );
        assert_eq!(outcome, VmOutcome::Returned(Value::Int(7)));
    }

    #[test]
    fn non_matching_except_reraises_through_end_finally() {
        let outcome = run_listing(
            r#"
            .line 1
            SETUP_EXCEPT handler
            RAISE_VARARGS "KeyError"
            POP_BLOCK
            JUMP after
            handler:
            DUP_TOP
            LOAD_GLOBAL "TypeError"
            COMPARE_OP "exception match"
            POP_JUMP_IF_FALSE reraise
            POP_TOP
            POP_EXCEPT
            JUMP after
            reraise:
            END_FINALLY
            after:
            RETURN_VALUE
            "#,
            &[],
        );
        assert_eq!(outcome, VmOutcome::Unhandled("KeyError".to_string()));
    }

    #[test]
    fn break_loop_jumps_to_the_loop_exit() {
        let outcome = run_listing(
            r#"
            .line 1
            SETUP_LOOP exit
            BREAK_LOOP
            POP_BLOCK
            exit:
            LOAD_CONST 0
            RETURN_VALUE
            "#,
            &[Value::Int(9)],
        );
        assert_eq!(outcome, VmOutcome::Returned(Value::Int(9)));
    }

    #[test]
    fn for_iter_drives_a_range_to_exhaustion() {
        let mut last_seen = Value::None;
        let unit = assemble(
            "f",
            "m.py",
            r#"
            .line 1
            LOAD_GLOBAL "range"
            LOAD_CONST 0
            CALL_FUNCTION 1
            loop:
            FOR_ITER end
            STORE_FAST "i"
            JUMP loop
            end:
            LOAD_FAST "i"
            RETURN_VALUE
            "#,
        )
        .unwrap();
        let decoded = decode(&unit).unwrap();
        let outcome = run(&decoded, &[Value::Int(3)], HashMap::new(), |_, _, _| {}).unwrap();
        if let VmOutcome::Returned(v) = &outcome {
            last_seen = v.clone();
        }
        assert_eq!(last_seen, Value::Int(2));
    }

    #[test]
    fn call_exit_halts_with_the_given_code() {
        let outcome = run_listing(
            r#"
            .line 1
            LOAD_GLOBAL "exit"
            LOAD_CONST 0
            CALL_FUNCTION 1
            "#,
            &[Value::Int(2)],
        );
        assert_eq!(outcome, VmOutcome::Halted(2));
    }
}
