//! Source-text "ignore" heuristics (spec.md §6): a trailing `#!cov-ignore`
//! comment, `assert` statements, and `if __name__ == '__main__':` guards
//! are excluded from coverage reporting regardless of the analyzer's
//! verdict. Operates on text, not bytecode — ported from `coven.py`'s
//! `indent_and_ignored_re`/`calc_ignored_lines`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

/// Whether a line was ignored by an explicit directive or an implicit
/// shape match. Explicit ignores that turn out covered are reported
/// specially ("ignored but covered"); implicit ones are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreKind {
    Explicit,
    Implicit,
}

fn indent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[ \t]*").unwrap())
}

fn explicit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#\s*!cov-ignore\s*$").unwrap())
}

fn implicit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*(assert\b|if __name__ == ['"]__main__['"]\s*:)"#).unwrap()
    })
}

fn indent_width(line: &str) -> usize {
    indent_re().find(line).map(|m| m.as_str().len()).unwrap_or(0)
}

/// 1-indexed source line -> why it's ignored. A line below a triggering
/// line, indented further than it, inherits the same ignore.
pub fn calc_ignored_lines(source: &str) -> BTreeMap<u32, IgnoreKind> {
    let mut ignored = BTreeMap::new();
    let mut active: Option<(usize, IgnoreKind)> = None;

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        if raw_line.trim().is_empty() {
            continue;
        }
        let indent = indent_width(raw_line);

        if let Some((trigger_indent, kind)) = active {
            if indent > trigger_indent {
                ignored.insert(line_no, kind);
                continue;
            }
            active = None;
        }

        let is_explicit = explicit_re().is_match(raw_line);
        let is_implicit = !is_explicit && implicit_re().is_match(raw_line);
        if is_explicit || is_implicit {
            let kind = if is_explicit {
                IgnoreKind::Explicit
            } else {
                IgnoreKind::Implicit
            };
            ignored.insert(line_no, kind);
            active = Some((indent, kind));
        }
    }

    ignored
}
