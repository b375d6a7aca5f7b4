//! Per-path and grand-total coverage counters, ported from `coven.py`'s
//! `Stats` class: a line falls into exactly one bucket (trivial, covered,
//! ignored, ignored-but-covered, not-covered) plus the raw line count.

use std::fmt;

/// ANSI color codes, hand-rolled the way the teacher writes raw escape
/// sequences directly (`core-render/src/render_engine.rs`) rather than
/// through a styling crate.
pub mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const BLACK: &str = "\x1b[30m";
    pub const GREEN: &str = "\x1b[32m";
    pub const GRAY: &str = "\x1b[37m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
}

/// Coverage counters for one source file (or, in `describe_total`, the
/// run-wide sum across every reported file).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub lines: usize,
    pub trivial: usize,
    pub traceable: usize,
    pub covered: usize,
    pub ignored: usize,
    pub ignored_but_covered: usize,
    pub not_covered: usize,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, other: &Stats) {
        self.lines += other.lines;
        self.trivial += other.trivial;
        self.traceable += other.traceable;
        self.covered += other.covered;
        self.ignored += other.ignored;
        self.ignored_but_covered += other.ignored_but_covered;
        self.not_covered += other.not_covered;
    }

    /// Format one `"N name"` component, colored when `color` is set and the
    /// value is non-zero (matching `describe_stat`'s per-field color map).
    fn describe_field(name: &str, val: usize, color: &str, use_color: bool) -> String {
        let c = if use_color && val > 0 { color } else { "" };
        let rst = if c.is_empty() { "" } else { ansi::RESET };
        format!("{c}{val} {name}{rst}")
    }

    /// Render `"label: N lines; N trivial; ...; N not covered."`, the exact
    /// field order and colors of `coven.py::Stats.describe`.
    pub fn describe(&self, label: &str, color: bool) -> String {
        let parts = [
            Self::describe_field("lines", self.lines, "", color),
            Self::describe_field("trivial", self.trivial, ansi::GRAY, color),
            Self::describe_field("traceable", self.traceable, "", color),
            Self::describe_field("covered", self.covered, "", color),
            Self::describe_field("ignored", self.ignored, ansi::CYAN, color),
            Self::describe_field(
                "ignored but covered",
                self.ignored_but_covered,
                ansi::YELLOW,
                color,
            ),
            Self::describe_field("not covered", self.not_covered, ansi::RED, color),
        ];
        format!("{label}: {}.", parts.join("; "))
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe("stats", false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn add_sums_every_field() {
        let mut total = Stats::new();
        total.add(&Stats {
            lines: 10,
            trivial: 2,
            traceable: 8,
            covered: 5,
            ignored: 1,
            ignored_but_covered: 0,
            not_covered: 2,
        });
        total.add(&Stats {
            lines: 5,
            trivial: 1,
            traceable: 4,
            covered: 4,
            ignored: 0,
            ignored_but_covered: 0,
            not_covered: 0,
        });
        assert_eq!(total.lines, 15);
        assert_eq!(total.covered, 9);
        assert_eq!(total.not_covered, 2);
    }

    #[test]
    fn describe_omits_color_for_zero_valued_fields() {
        let stats = Stats {
            lines: 3,
            trivial: 0,
            traceable: 3,
            covered: 3,
            ignored: 0,
            ignored_but_covered: 0,
            not_covered: 0,
        };
        let out = stats.describe("m.py", true);
        assert!(!out.contains(ansi::RED), "no not-covered lines, no red");
        assert!(out.starts_with("m.py: 3 lines;"));
    }

    #[test]
    fn describe_colors_nonzero_not_covered() {
        let stats = Stats {
            not_covered: 2,
            ..Stats::new()
        };
        let out = stats.describe("m.py", true);
        assert!(out.contains(ansi::RED));
    }
}
