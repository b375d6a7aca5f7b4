//! The enriched [`Instruction`] type the decoder produces, plus the two
//! synthetic pseudo-instructions (`BEGIN`, `RAISED`) used as edge sources
//! that have no real offset in the instruction stream.

use crate::offset::{Line, Offset};
use crate::opcode::Opcode;

/// A resolved instruction argument. Unlike the raw bytecode encoding this
/// already carries the *interpreted* value (a jump target offset already
/// resolved to an [`Offset`], a global/local name, or a generic constant),
/// mirroring `dis.Instruction.argval`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    None,
    /// A jump or setup-block destination, already resolved to a logical
    /// offset in the same code unit.
    Target(Offset),
    /// A name operand (`LOAD_GLOBAL`, `STORE_FAST`, `DELETE_FAST`, or a
    /// `COMPARE_OP` argrepr such as `"exception match"`).
    Name(String),
    /// A generic integer operand: a `CALL_FUNCTION` argument count, or a
    /// `LOAD_CONST` constant-table index for any constant other than the
    /// `None` singleton.
    Int(i64),
    /// `LOAD_CONST` of the `None` singleton specifically, called out as its
    /// own variant (rather than folded into `Int`) because the classifier's
    /// implicit-return and exception-cleanup heuristics key off of it by
    /// value, not by table position.
    NoneConst,
}

impl Arg {
    pub fn as_target(&self) -> Option<Offset> {
        match self {
            Arg::Target(off) => Some(*off),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Arg::Name(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_none_const(&self) -> bool {
        matches!(self, Arg::NoneConst)
    }
}

/// One entry on the approximate block stack: "if this block is unwound,
/// control reaches `handler_off`."
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFrame {
    pub setup_op: Opcode,
    pub handler_off: Offset,
}

/// A raw instruction as read from a code unit's linear stream, before
/// extended-argument coalescence or block-stack annotation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInstruction {
    pub opcode: Opcode,
    pub arg: Arg,
    /// `starts_line` in `dis` terms: `Some(line)` only on the instruction
    /// that begins a new source line.
    pub starts_line: Option<Line>,
}

impl RawInstruction {
    pub fn new(opcode: Opcode, arg: Arg, starts_line: Option<Line>) -> Self {
        Self {
            opcode,
            arg,
            starts_line,
        }
    }

    pub fn plain(opcode: Opcode) -> Self {
        Self::new(opcode, Arg::None, None)
    }
}

/// The decoder's enriched instruction: a raw instruction plus its logical
/// offset, carried line, block-stack snapshot, and classifier flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub off: Offset,
    pub opcode: Opcode,
    pub arg: Arg,
    pub line: Line,
    pub is_line_start: bool,
    /// The approximate block stack in effect at this offset, innermost last.
    pub stack: Vec<BlockFrame>,

    pub is_call_exit: bool,
    pub is_exc_match: bool,
    pub is_exc_match_jmp_src: bool,
    pub is_exc_match_jmp_dst: bool,
    pub is_sf_exc_opt: bool,
}

impl Instruction {
    /// The synthetic source of the initial edge into offset 0 and of every
    /// generator-resume edge.
    pub fn begin() -> Self {
        Self {
            off: Offset::BEGIN,
            opcode: Opcode::Other(0),
            arg: Arg::None,
            line: Line::BEGIN,
            is_line_start: false,
            stack: Vec::new(),
            is_call_exit: false,
            is_exc_match: false,
            is_exc_match_jmp_src: false,
            is_exc_match_jmp_dst: false,
            is_sf_exc_opt: false,
        }
    }

    /// The synthetic source of every edge entering an exception handler.
    pub fn raised() -> Self {
        Self {
            off: Offset::RAISED,
            line: Line::RAISED,
            ..Self::begin()
        }
    }

    pub fn is_pseudo(&self) -> bool {
        self.off.is_sentinel()
    }

    pub fn target(&self) -> Option<Offset> {
        self.arg.as_target()
    }
}

/// Find the handler offset of the innermost block on `stack` whose setup
/// opcode is one of `ops`, scanning from the innermost (last) entry outward.
/// Shared by the control-flow-edge rules for `BREAK_LOOP`/`RAISE_VARARGS`/
/// `RETURN_VALUE`/`END_FINALLY` and by the fixture VM's runtime unwinding,
/// since both need the exact same "nearest enclosing block of this kind"
/// answer.
pub fn find_block_dst(stack: &[BlockFrame], ops: &[Opcode]) -> Option<Offset> {
    stack
        .iter()
        .rev()
        .find(|b| ops.contains(&b.setup_op))
        .map(|b| b.handler_off)
}

#[cfg(test)]
mod block_dst_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_innermost_matching_block_skipping_outer_ones() {
        let stack = vec![
            BlockFrame {
                setup_op: Opcode::SetupExcept,
                handler_off: Offset::real(10),
            },
            BlockFrame {
                setup_op: Opcode::SetupLoop,
                handler_off: Offset::real(20),
            },
        ];
        assert_eq!(
            find_block_dst(&stack, &[Opcode::SetupExcept, Opcode::SetupFinally]),
            Some(Offset::real(10))
        );
        assert_eq!(
            find_block_dst(&stack, &[Opcode::SetupLoop]),
            Some(Offset::real(20))
        );
        assert_eq!(find_block_dst(&stack, &[Opcode::SetupWith]), None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn begin_and_raised_carry_sentinel_offsets_and_lines() {
        let begin = Instruction::begin();
        assert_eq!(begin.off, Offset::BEGIN);
        assert_eq!(begin.line, Line::BEGIN);
        assert!(begin.is_pseudo());

        let raised = Instruction::raised();
        assert_eq!(raised.off, Offset::RAISED);
        assert_eq!(raised.line, Line::RAISED);
        assert!(raised.is_pseudo());

        assert_ne!(begin.off, raised.off);
    }
}
