//! The edge classifier: decides whether an edge into an arc is optional,
//! using the six shape heuristics plus the TEF (try/except/finally vs.
//! try/finally-containing-try/except) peek.

use std::collections::{HashMap, HashSet};

use cov_bytecode::{DecodedCode, Offset, Opcode};

/// Does this `SETUP_FINALLY`'s exception arm look like the outer try of a
/// try/except/finally (optional — the nested `except` shadows it) or a
/// try/finally wrapping its own try/except (required)?
///
/// `handler` is the instruction the next (supposed `SETUP_EXCEPT`) block
/// would land on if it were entered; `next` is the instruction immediately
/// following the `SETUP_FINALLY` in program order.
pub fn is_sf_exc_opt(decoded: &DecodedCode, next: Offset) -> bool {
    let Some(next_inst) = decoded.get(next) else {
        return false;
    };
    if next_inst.opcode != Opcode::SetupExcept {
        return false;
    }
    let Some(exc_dst) = next_inst.target() else {
        return false;
    };
    match decoded.get(exc_dst).map(|i| i.opcode) {
        Some(Opcode::DupTop) => true,
        Some(Opcode::PopTop) => false,
        _ => {
            tracing::warn!(
                off = %next,
                "TEF heuristic saw an unrecognized exception-dispatch shape; defaulting to required"
            );
            false
        }
    }
}

/// Does every instruction in `arc` match the corresponding entry in `exps`
/// (an opcode, or an `(opcode, arg)` pair when the argument matters)?
fn match_insts(decoded: &DecodedCode, arc: &[Offset], exps: &[Expect]) -> bool {
    if arc.len() < exps.len() {
        return false;
    }
    arc.iter().zip(exps).all(|(&off, exp)| {
        let Some(inst) = decoded.get(off) else {
            return false;
        };
        match exp {
            Expect::Op(op) => inst.opcode == *op,
            Expect::LoadConstNone => inst.opcode == Opcode::LoadConst && inst.arg.is_none_const(),
        }
    })
}

enum Expect {
    Op(Opcode),
    LoadConstNone,
}

/// Is the edge `src -> arc[0]` (and, by propagation, the rest of `arc`)
/// optional? Composes the five shape-matching rules; any one firing makes
/// the entry edge optional.
pub fn is_arc_opt(
    decoded: &DecodedCode,
    src: Offset,
    arc: &[Offset],
    srcs: &HashMap<Offset, HashSet<Offset>>,
    sf_exc_opt_handlers: &HashSet<Offset>,
) -> bool {
    is_arc_opt_sf_raise(src, arc, sf_exc_opt_handlers)
        || is_arc_unhandled_exc_reraise(decoded, src, arc)
        || is_arc_exc_as_cleanup(decoded, src, arc)
        || is_arc_with_cleanup(decoded, arc)
        || is_arc_join_return_none(decoded, arc, srcs)
}

fn is_arc_opt_sf_raise(src: Offset, arc: &[Offset], sf_exc_opt_handlers: &HashSet<Offset>) -> bool {
    src == Offset::RAISED && arc.first().is_some_and(|off| sf_exc_opt_handlers.contains(off))
}

/// The untaken branch of an exception-type test: either the edge itself is
/// the match-jump's failure branch, or it lands exactly where that branch
/// lands.
fn is_arc_unhandled_exc_reraise(decoded: &DecodedCode, src: Offset, arc: &[Offset]) -> bool {
    let src_inst = decoded.get(src);
    let arc0_inst = arc.first().and_then(|o| decoded.get(*o));
    let src_is_match_src = src_inst.is_some_and(|i| i.is_exc_match_jmp_src);
    let arc0_is_match_dst = arc0_inst.is_some_and(|i| i.is_exc_match_jmp_dst);
    let src_is_match_dst = src_inst.is_some_and(|i| i.is_exc_match_jmp_dst);
    (src_is_match_src && arc0_is_match_dst) || src_is_match_dst
}

/// The compiler-generated `del name` cleanup for `except T as name:`.
fn is_arc_exc_as_cleanup(decoded: &DecodedCode, src: Offset, arc: &[Offset]) -> bool {
    src == Offset::RAISED
        && match_insts(
            decoded,
            arc,
            &[
                Expect::LoadConstNone,
                Expect::Op(Opcode::StoreFast),
                Expect::Op(Opcode::DeleteFast),
                Expect::Op(Opcode::EndFinally),
            ],
        )
}

/// The exception path of a `with` statement's generated cleanup.
fn is_arc_with_cleanup(decoded: &DecodedCode, arc: &[Offset]) -> bool {
    match_insts(
        decoded,
        arc,
        &[
            Expect::Op(Opcode::WithCleanupStart),
            Expect::Op(Opcode::WithCleanupFinish),
            Expect::Op(Opcode::EndFinally),
        ],
    )
}

/// The implicit `return None` the compiler synthesizes when a function has
/// no explicit final return: a two-instruction arc reached from more than
/// one predecessor.
fn is_arc_join_return_none(
    decoded: &DecodedCode,
    arc: &[Offset],
    srcs: &HashMap<Offset, HashSet<Offset>>,
) -> bool {
    if arc.len() != 2 {
        return false;
    }
    let multi_pred = srcs.get(&arc[0]).is_some_and(|s| s.len() > 1);
    multi_pred
        && match_insts(
            decoded,
            arc,
            &[Expect::LoadConstNone, Expect::Op(Opcode::ReturnValue)],
        )
}
