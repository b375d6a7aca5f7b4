//! Renders one source file's coverage map as an annotated listing plus a
//! summary line, and a whole-run driver over every target. Ported from
//! `coven.py::report`/`report_path`. Out of the analyzer's core (spec.md
//! §1 — "the textual report renderer" is an explicit collaborator), but
//! carried here since it is the natural consumer of `cov-trace`'s
//! `CoverageMap` and is the only thing that turns a coverage verdict into
//! something a human reads.

use std::collections::{BTreeSet, HashMap};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use cov_bytecode::Line;
use cov_graph::Edge;
use cov_trace::CoverageMap;

use crate::ignore::{IgnoreKind, calc_ignored_lines};
use crate::ranges::line_ranges;
use crate::stats::{Stats, ansi};

/// Everything `report_path` needs beyond the coverage map itself.
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions<'a> {
    pub show_all: bool,
    pub color: bool,
    /// When set, dump each partially-covered line's required/matched edge
    /// sets to help a human (or a test) see exactly which edge is missing.
    pub dbg: Option<&'a str>,
}

/// Report every target's file, in the order given, accumulating a grand
/// total. Targets with no resolved path (never loaded) are noted and
/// skipped, matching `coven.py::report`'s `if path is None: continue`.
pub fn report(
    out: &mut impl Write,
    target_paths: &[(String, Option<PathBuf>)],
    path_coverage: &HashMap<PathBuf, CoverageMap>,
    opts: ReportOptions,
) -> io::Result<Stats> {
    let mut totals = Stats::new();
    let empty = CoverageMap::new();
    for (target, path) in target_paths {
        let Some(path) = path else {
            writeln!(out, "\n{target}: <never loaded>")?;
            continue;
        };
        let coverage = path_coverage.get(path).unwrap_or(&empty);
        let stats = report_path(out, target, path, coverage, opts)?;
        totals.add(&stats);
    }
    if target_paths.len() > 1 {
        writeln!(out, "\n{}", totals.describe("TOTAL", opts.color))?;
    }
    Ok(totals)
}

/// Report one file's coverage, returning its [`Stats`] for the caller to
/// fold into a run-wide total.
pub fn report_path(
    out: &mut impl Write,
    target: &str,
    path: &Path,
    coverage: &CoverageMap,
    opts: ReportOptions,
) -> io::Result<Stats> {
    let source = std::fs::read_to_string(path)?;
    let line_texts: Vec<&str> = source.lines().collect();
    let ignored_lines = calc_ignored_lines(&source);

    let mut covered_lines = BTreeSet::new();
    let mut ign_cov_lines = BTreeSet::new();
    let mut not_cov_lines = BTreeSet::new();

    for (&line, (required, matched)) in coverage {
        if !line.is_real() {
            continue;
        }
        let line_no = line.0 as u32;
        if required.is_subset(matched) {
            if ignored_lines.get(&line_no) == Some(&IgnoreKind::Explicit) {
                ign_cov_lines.insert(line_no);
            } else {
                covered_lines.insert(line_no);
            }
        } else if !ignored_lines.contains_key(&line_no) {
            not_cov_lines.insert(line_no);
        }
    }

    let problem_lines: BTreeSet<u32> = ign_cov_lines.union(&not_cov_lines).copied().collect();

    let length = line_texts.len() as u32;
    let mut stats = Stats::new();
    stats.lines = length as usize;
    stats.traceable = coverage.keys().filter(|l| l.is_real()).count();
    stats.trivial = (length as usize).saturating_sub(stats.traceable);
    stats.covered = covered_lines.len();
    stats.ignored_but_covered = ign_cov_lines.len();
    stats.not_covered = not_cov_lines.len();
    stats.ignored = ignored_lines
        .keys()
        .filter(|l| !covered_lines.contains(l) && !ign_cov_lines.contains(l) && !not_cov_lines.contains(l))
        .count();

    let rel = path_rel_to_current_or_abs(path);
    let label = format!("{target}: {}", rel.display());

    if problem_lines.is_empty() {
        writeln!(out, "\n{}", stats.describe(&label, opts.color))?;
        return Ok(stats);
    }

    writeln!(out, "\n{label}:")?;
    let reported: Vec<u32> = if opts.show_all {
        (1..=length).collect()
    } else {
        problem_lines.iter().copied().collect()
    };
    let ranges = line_ranges(reported, 4, 1, length + 1);

    let (rst, gray, yellow, cyan, red) = if opts.color {
        (ansi::RESET, ansi::GRAY, ansi::YELLOW, ansi::CYAN, ansi::RED)
    } else {
        ("", "", "", "", "")
    };

    for r in ranges {
        let Some(r) = r else {
            writeln!(out, "{gray} ...{rst}")?;
            continue;
        };
        for line_no in r {
            if line_no == 0 || line_no as usize > line_texts.len() {
                continue;
            }
            let text = line_texts[(line_no - 1) as usize];
            let line = Line::real(line_no as i32);
            let (color, sym, dbg_set) = if !coverage.contains_key(&line) {
                (gray, ' ', None)
            } else {
                let (required, matched) = &coverage[&line];
                if ign_cov_lines.contains(&line_no) {
                    (yellow, '?', None)
                } else if ignored_lines.contains_key(&line_no) {
                    (cyan, '|', None)
                } else if not_cov_lines.contains(&line_no) {
                    if matched.is_empty() {
                        (red, '!', None)
                    } else {
                        (red, '%', Some((required, matched)))
                    }
                } else {
                    (rst, ' ', None)
                }
            };
            writeln!(out, "{gray}{line_no:4} {color}{sym} {text}{rst}")?;
            if let (Some(dbg), Some((required, matched))) = (opts.dbg, dbg_set) {
                debug_edge_sets(out, dbg, line_no, required, matched)?;
            }
        }
    }
    writeln!(out, "{}", stats.describe(&label, opts.color))?;
    Ok(stats)
}

fn debug_edge_sets(
    out: &mut impl Write,
    dbg: &str,
    line_no: u32,
    required: &BTreeSet<Edge>,
    matched: &BTreeSet<Edge>,
) -> io::Result<()> {
    for edge in required.difference(matched) {
        writeln!(out, "     [{dbg}] {line_no:4} - {}", fmt_edge(edge))?;
    }
    for edge in matched {
        writeln!(out, "     [{dbg}] {line_no:4} = {}", fmt_edge(edge))?;
    }
    Ok(())
}

fn fmt_edge(edge: &Edge) -> String {
    format!("off: {:>4} -> {:<4}", edge.src.to_string(), edge.dst.to_string())
}

/// Render `path` relative to the current directory when it lives under it,
/// else as an absolute path (`coven.py::path_rel_to_current_or_abs`).
pub fn path_rel_to_current_or_abs(path: &Path) -> PathBuf {
    let Ok(cwd) = std::env::current_dir() else {
        return path.to_path_buf();
    };
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    match abs.strip_prefix(&cwd) {
        Ok(rel) if rel.as_os_str().is_empty() => PathBuf::from("."),
        Ok(rel) => rel.to_path_buf(),
        Err(_) => abs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use cov_bytecode::Offset;
    use std::collections::BTreeMap;

    fn cov_line(required_lines: &[i32], matched: bool) -> (BTreeSet<Edge>, BTreeSet<Edge>) {
        let edges: BTreeSet<Edge> = required_lines
            .iter()
            .map(|&n| Edge::new(Offset::real(n), Offset::real(n + 1)))
            .collect();
        let matched_set = if matched { edges.clone() } else { BTreeSet::new() };
        (edges, matched_set)
    }

    #[test]
    fn fully_covered_file_prints_only_a_summary_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.py");
        std::fs::write(&path, "def f():\n    return 1\n").unwrap();

        let mut coverage = CoverageMap::new();
        coverage.insert(Line::real(2), cov_line(&[0], true));

        let mut out = Vec::new();
        let stats = report_path(
            &mut out,
            "m",
            &path,
            &coverage,
            ReportOptions { show_all: false, color: false, dbg: None },
        )
        .unwrap();
        assert_eq!(stats.not_covered, 0);
        assert_eq!(stats.covered, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("m: "));
        assert!(!text.contains('!'), "no per-line markers for a fully covered file");
    }

    #[test]
    fn not_covered_line_is_marked_with_a_bang() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.py");
        std::fs::write(&path, "def f():\n    return 1\n").unwrap();

        let mut coverage = CoverageMap::new();
        coverage.insert(Line::real(2), cov_line(&[0], false));

        let mut out = Vec::new();
        let stats = report_path(
            &mut out,
            "m",
            &path,
            &coverage,
            ReportOptions { show_all: false, color: false, dbg: None },
        )
        .unwrap();
        assert_eq!(stats.not_covered, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("! "));
    }

    #[test]
    fn explicitly_ignored_but_covered_line_gets_a_question_mark() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.py");
        std::fs::write(&path, "x = 1  #!cov-ignore\n").unwrap();

        let mut coverage = CoverageMap::new();
        coverage.insert(Line::real(1), cov_line(&[0], true));

        let mut out = Vec::new();
        let stats = report_path(
            &mut out,
            "m",
            &path,
            &coverage,
            ReportOptions { show_all: false, color: false, dbg: None },
        )
        .unwrap();
        assert_eq!(stats.ignored_but_covered, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("? "));
    }

    #[test]
    fn path_relative_to_cwd_strips_the_common_prefix() {
        let cwd = std::env::current_dir().unwrap();
        let path = cwd.join("src").join("lib.rs");
        assert_eq!(path_rel_to_current_or_abs(&path), PathBuf::from("src/lib.rs"));
    }
}
