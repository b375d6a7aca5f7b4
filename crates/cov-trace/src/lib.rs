//! The reconciler and line aggregator: match an observed dynamic edge set
//! against a code unit's inferred control-flow graph and fold the result
//! into a per-line coverage verdict.

pub mod aggregate;
pub mod reconcile;

pub use aggregate::{CoverageMap, aggregate_lines, is_covered, merge_coverage_maps};
pub use reconcile::{ReconcileReport, reconcile};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use cov_bytecode::{assemble, decode};
    use cov_graph::build;

    /// `def f(): return 1` — the whole function's single line is covered by
    /// exactly one required edge, matching spec.md §8 scenario 1.
    #[test]
    fn trivial_function_is_fully_covered_when_its_one_path_runs() {
        let unit = assemble(
            "f",
            "m.py",
            r#"
            .line 2
            LOAD_CONST 1
            RETURN_VALUE
            "#,
        )
        .unwrap();
        let decoded = decode(&unit).unwrap();
        let graph = build(&decoded).unwrap();

        let traced = [
            (cov_bytecode::Offset::BEGIN, cov_bytecode::Offset::real(0), cov_bytecode::Line::real(2)),
            (cov_bytecode::Offset::real(0), cov_bytecode::Offset::real(1), cov_bytecode::Line::real(2)),
        ]
        .into_iter()
        .collect();

        let report = reconcile(&traced, &graph.required, &graph.optional);
        let map = aggregate_lines(&graph.required, &report.matched);
        let (req, mat) = &map[&cov_bytecode::Line::real(2)];
        assert!(is_covered(req, mat));
        assert!(report.unexpected.is_empty());
    }

    /// `try: x()\nexcept E: y()` executed only along the except path via an
    /// observed reraise from a different offset must still count as
    /// covering the RAISED edge (spec.md §8 scenario 2/raise rewrite).
    #[test]
    fn reraise_observed_from_a_different_offset_still_satisfies_the_raised_edge() {
        let unit = assemble(
            "f",
            "m.py",
            r#"
            .line 1
            SETUP_EXCEPT handler
            LOAD_GLOBAL "x"
            CALL_FUNCTION 0
            POP_TOP
            POP_BLOCK
            JUMP done
            handler:
            .line 2
            POP_TOP
            LOAD_GLOBAL "y"
            CALL_FUNCTION 0
            POP_TOP
            POP_EXCEPT
            done:
            .line 3
            LOAD_CONST None
            RETURN_VALUE
            "#,
        )
        .unwrap();
        let decoded = decode(&unit).unwrap();
        let graph = build(&decoded).unwrap();

        let handler_off = cov_bytecode::Offset::real(6);
        assert!(graph.required.contains_key(&cov_graph::Edge::new(
            cov_bytecode::Offset::RAISED,
            handler_off
        )));

        // Observed source is an arbitrary raise-site offset, not RAISED.
        let traced = [(cov_bytecode::Offset::real(2), handler_off, cov_bytecode::Line::real(99))]
            .into_iter()
            .collect();
        let report = reconcile(&traced, &graph.required, &graph.optional);
        assert!(
            report
                .matched
                .contains_key(&cov_graph::Edge::new(cov_bytecode::Offset::RAISED, handler_off))
        );
        assert!(report.unexpected.is_empty());
    }
}
