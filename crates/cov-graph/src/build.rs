//! The graph builder: successor-set computation, arc partitioning, and
//! edge emission with line attribution and optionality classification.

use std::collections::{HashMap, HashSet, VecDeque};

use cov_bytecode::{DecodedCode, Instruction, Line, Offset, Opcode, find_block_dst};
use thiserror::Error;

use crate::classify::{is_arc_opt, is_sf_exc_opt};
use crate::edge::{Edge, EdgeLines};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// An edge rule produced a destination offset the decoder never
    /// emitted — only possible if the decoded map is internally
    /// inconsistent.
    #[error("dangling edge destination {0}")]
    DanglingDestination(Offset),
}

/// A maximal single-entry, single-exit run of real instruction offsets.
pub type Run = Vec<Offset>;

/// The inferred control-flow graph for one code unit: required and
/// optional edges, each with the source lines they attribute coverage to.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub required: EdgeLines,
    pub optional: EdgeLines,
}

/// Build the inferred graph for a decoded code unit.
pub fn build(decoded: &DecodedCode) -> Result<Graph, GraphError> {
    let textual_next = textual_next_map(&decoded.order);
    let (dsts, sf_exc_opt_handlers) = compute_successors(decoded, &textual_next)?;
    let srcs = reverse(&dsts);
    let starts_to_arcs = partition_arcs(&dsts, &srcs);
    let (required, optional) = emit_edges(
        decoded,
        &dsts,
        &srcs,
        &starts_to_arcs,
        &sf_exc_opt_handlers,
        &textual_next,
    )?;
    Ok(Graph { required, optional })
}

fn textual_next_map(order: &[Offset]) -> HashMap<Offset, Offset> {
    order.windows(2).map(|w| (w[0], w[1])).collect()
}

fn reverse(dsts: &HashMap<Offset, HashSet<Offset>>) -> HashMap<Offset, HashSet<Offset>> {
    let mut srcs: HashMap<Offset, HashSet<Offset>> = HashMap::new();
    for (&src, dst_set) in dsts {
        for &dst in dst_set {
            srcs.entry(dst).or_default().insert(src);
        }
    }
    srcs
}

/// Rules 1-11: compute every instruction's successor set, plus the set of
/// `SETUP_FINALLY` handler offsets the TEF heuristic classified as
/// try/except/finally (`is_SF_exc_opt`).
fn compute_successors(
    decoded: &DecodedCode,
    textual_next: &HashMap<Offset, Offset>,
) -> Result<(HashMap<Offset, HashSet<Offset>>, HashSet<Offset>), GraphError> {
    let mut dsts: HashMap<Offset, HashSet<Offset>> = HashMap::new();
    let mut sf_exc_opt_handlers: HashSet<Offset> = HashSet::new();

    if let Some(&first) = decoded.order.first() {
        dsts.entry(Offset::BEGIN).or_default().insert(first);
    }

    for &off in &decoded.order {
        let inst = decoded
            .get(off)
            .ok_or(GraphError::DanglingDestination(off))?;

        // Rule 2: fall-through.
        if !inst.opcode.is_stop() && !inst.is_call_exit
            && let Some(&next) = textual_next.get(&off)
        {
            dsts.entry(off).or_default().insert(next);
        }

        // Rule 3: jump targets (includes conditional jumps and for-iter).
        if inst.opcode.is_jump()
            && let Some(target) = inst.target()
        {
            dsts.entry(off).or_default().insert(target);
        }

        match inst.opcode {
            // Rule 4: setup-with-exception opcodes enter their handler from
            // an unknown exception source. SETUP_LOOP is excluded: its
            // destination is the loop exit, not a handler.
            Opcode::SetupExcept | Opcode::SetupFinally | Opcode::SetupWith | Opcode::SetupAsyncWith => {
                if let Some(target) = inst.target() {
                    dsts.entry(Offset::RAISED).or_default().insert(target);
                }
                if inst.opcode == Opcode::SetupFinally
                    && let Some(&next) = textual_next.get(&off)
                    && is_sf_exc_opt(decoded, next)
                    && let Some(target) = inst.target()
                {
                    sf_exc_opt_handlers.insert(target);
                }
            }
            // Rule 5: break-loop targets the innermost setup-loop's exit.
            Opcode::BreakLoop => {
                if let Some(target) = find_block_dst(&inst.stack, &[Opcode::SetupLoop]) {
                    dsts.entry(off).or_default().insert(target);
                }
            }
            // Rule 6: return, if a with/finally is open, is intercepted by
            // its cleanup handler instead of actually returning.
            Opcode::ReturnValue => {
                if let Some(target) = find_block_dst(
                    &inst.stack,
                    &[Opcode::SetupFinally, Opcode::SetupWith, Opcode::SetupAsyncWith],
                ) {
                    dsts.entry(off).or_default().insert(target);
                }
            }
            // Rule 7: raise enters the innermost except/finally from an
            // unknown exception source.
            Opcode::RaiseVarargs => {
                if let Some(target) =
                    find_block_dst(&inst.stack, &[Opcode::SetupExcept, Opcode::SetupFinally])
                {
                    dsts.entry(Offset::RAISED).or_default().insert(target);
                }
            }
            // Rule 8: end-finally may reraise to an outer handler or
            // advance; both are emitted, the advance downgraded to
            // optional at emission time.
            Opcode::EndFinally => {
                if let Some(target) = find_block_dst(
                    &inst.stack,
                    &[Opcode::SetupAsyncWith, Opcode::SetupFinally, Opcode::SetupWith],
                ) {
                    dsts.entry(off).or_default().insert(target);
                }
            }
            // Rule 9: generator resume edges.
            Opcode::YieldValue => {
                if let Some(&next) = textual_next.get(&off) {
                    dsts.entry(Offset::BEGIN).or_default().insert(next);
                }
            }
            Opcode::YieldFrom => {
                dsts.entry(Offset::BEGIN).or_default().insert(off);
                if let Some(&next) = textual_next.get(&off) {
                    dsts.entry(Offset::RAISED).or_default().insert(next);
                }
            }
            _ => {}
        }
    }

    Ok((dsts, sf_exc_opt_handlers))
}

/// Partition the reachable instructions into maximal single-entry,
/// single-exit arcs, starting from every node directly reachable from
/// `BEGIN`/`RAISED`. Worklist, not recursion: the CFG is cyclic.
fn partition_arcs(
    dsts: &HashMap<Offset, HashSet<Offset>>,
    srcs: &HashMap<Offset, HashSet<Offset>>,
) -> HashMap<Offset, Run> {
    let mut starts_to_arcs: HashMap<Offset, Run> = HashMap::new();
    let mut visited: HashSet<Offset> = HashSet::new();
    let mut remaining: VecDeque<Offset> = VecDeque::new();

    for pseudo in [Offset::BEGIN, Offset::RAISED] {
        if let Some(set) = dsts.get(&pseudo) {
            remaining.extend(set.iter().copied());
        }
    }

    while let Some(start) = remaining.pop_front() {
        if !visited.insert(start) {
            continue;
        }
        let mut arc = vec![start];
        let mut cursor = start;
        let next_frontier = loop {
            let Some(next_set) = dsts.get(&cursor) else {
                break HashSet::new();
            };
            if next_set.len() != 1 {
                break next_set.clone();
            }
            let next = *next_set.iter().next().unwrap();
            if srcs.get(&next).map(|s| s.len()).unwrap_or(0) != 1 {
                break next_set.clone();
            }
            arc.push(next);
            cursor = next;
        };
        starts_to_arcs.insert(arc[0], arc);
        for n in next_frontier {
            if !visited.contains(&n) {
                remaining.push_back(n);
            }
        }
    }
    starts_to_arcs
}

/// The "state" the edge-emission worklist carries forward: the offset just
/// finished (a pseudo source or a real instruction ending an arc), the line
/// it ended on, and whether that arc was classified optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Job {
    src: Offset,
    line: Line,
    opt: bool,
}

fn next_line(prev_off: Offset, next_inst: &Instruction, carried: Line) -> Line {
    if next_inst.is_line_start || next_inst.off < prev_off || carried.0 < 0 {
        next_inst.line
    } else {
        carried
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_edges(
    decoded: &DecodedCode,
    dsts: &HashMap<Offset, HashSet<Offset>>,
    srcs: &HashMap<Offset, HashSet<Offset>>,
    starts_to_arcs: &HashMap<Offset, Run>,
    sf_exc_opt_handlers: &HashSet<Offset>,
    textual_next: &HashMap<Offset, Offset>,
) -> Result<(EdgeLines, EdgeLines), GraphError> {
    let mut required: EdgeLines = HashMap::new();
    let mut optional: EdgeLines = HashMap::new();
    let mut visited: HashSet<Job> = HashSet::new();
    let mut remaining: VecDeque<Job> = VecDeque::new();
    remaining.push_back(Job {
        src: Offset::BEGIN,
        line: Line::BEGIN,
        opt: false,
    });
    remaining.push_back(Job {
        src: Offset::RAISED,
        line: Line::RAISED,
        opt: false,
    });

    while let Some(job) = remaining.pop_front() {
        if !visited.insert(job) {
            continue;
        }
        let Some(starts) = dsts.get(&job.src) else {
            continue;
        };
        for &start in starts {
            let arc = starts_to_arcs
                .get(&start)
                .ok_or(GraphError::DanglingDestination(start))?;
            let mut is_opt = is_arc_opt(decoded, job.src, arc, srcs, sf_exc_opt_handlers);
            let mut prev_off = job.src;
            let mut prev_line = job.line;

            for (i, &inst_off) in arc.iter().enumerate() {
                let inst = decoded
                    .get(inst_off)
                    .ok_or(GraphError::DanglingDestination(inst_off))?;
                let line = next_line(prev_off, inst, prev_line);

                // Rule 11: a for-iter's own stop-iteration successor is
                // relabeled with source RAISED to unify it with the
                // exception the real interpreter actually raises there.
                let mut edge_src = prev_off;
                if i == 0
                    && let Some(src_inst) = decoded.get(job.src)
                    && src_inst.opcode == Opcode::ForIter
                    && src_inst.target() == Some(inst_off)
                {
                    edge_src = Offset::RAISED;
                }

                if !is_opt
                    && let Some(prev_inst) = decoded.get(prev_off)
                    && prev_inst.opcode == Opcode::EndFinally
                    && textual_next.get(&prev_off) == Some(&inst_off)
                {
                    is_opt = true;
                }

                let final_opt = is_opt || (job.opt && i == 0);
                let edge = Edge::new(edge_src, inst_off);
                let table = if final_opt { &mut optional } else { &mut required };
                table.entry(edge).or_default().insert(line);

                prev_off = inst_off;
                prev_line = line;
            }

            if let Some(&last) = arc.last() {
                remaining.push_back(Job {
                    src: last,
                    line: prev_line,
                    opt: is_opt,
                });
            }
        }
    }

    Ok((required, optional))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use cov_bytecode::{assemble, decode};

    fn graph_for(listing: &str) -> Graph {
        let unit = assemble("f", "m.py", listing).unwrap();
        let decoded = decode(&unit).unwrap();
        build(&decoded).unwrap()
    }

    #[test]
    fn trivial_return_has_one_required_edge_on_its_line() {
        let graph = graph_for(
            r#"
            .line 2
            LOAD_CONST 0
            RETURN_VALUE
            "#,
        );
        assert_eq!(graph.required.len(), 2);
        let entry = Edge::new(Offset::BEGIN, Offset::real(0));
        assert_eq!(graph.required.get(&entry).unwrap(), &[Line::real(2)].into());
    }

    #[test]
    fn for_iter_exit_is_labeled_with_raised_as_source() {
        let graph = graph_for(
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
            RETURN_VALUE
            "#,
        );
        let exit_edge = Edge::new(Offset::RAISED, Offset::real(6));
        assert!(graph.required.contains_key(&exit_edge) || graph.optional.contains_key(&exit_edge));
        // the normal (non-rewritten) edge must not also be present.
        let for_iter_off = Offset::real(3);
        assert!(!graph.required.contains_key(&Edge::new(for_iter_off, Offset::real(6))));
    }

    #[test]
    fn implicit_return_none_join_is_optional() {
        let graph = graph_for(
            r#"
            .line 1
            LOAD_GLOBAL "cond"
            POP_JUMP_IF_FALSE join
            LOAD_CONST 1
            RETURN_VALUE
            join:
            LOAD_CONST None
            RETURN_VALUE
            "#,
        );
        let entry = Edge::new(Offset::real(1), Offset::real(4));
        assert!(graph.optional.contains_key(&entry));
        assert!(!graph.required.contains_key(&entry));
    }
}
