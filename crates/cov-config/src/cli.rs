//! The `coven` CLI surface (spec.md §6): `coven trace <cmd>...` or
//! `coven coalesce <snapshot>...`, mirroring `ox-bin`'s `clap::Parser`
//! `Args` struct.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "coven", version, about = "Bytecode control-flow coverage analyzer")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Module names or filesystem paths to restrict analysis to. May be
    /// repeated or comma-separated.
    #[arg(long = "targets", global = true, value_delimiter = ',')]
    pub targets: Vec<String>,

    /// Write a machine-readable snapshot to this path instead of (or in
    /// addition to) printing a report.
    #[arg(long = "output", global = true)]
    pub output: Option<PathBuf>,

    /// Report every line, including fully covered ones, not just the
    /// partially/uncovered ones.
    #[arg(long = "show-all", global = true)]
    pub show_all: bool,

    /// Dump the inferred graph for one code unit's debugging, by name.
    #[arg(long = "dbg", global = true)]
    pub dbg: Option<String>,

    #[arg(long = "color", global = true, overrides_with = "no_color")]
    pub color: bool,

    #[arg(long = "no-color", global = true, overrides_with = "color")]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a workload under tracing and report coverage.
    Trace {
        /// The bundled fixture-VM program listing to execute (see
        /// `cov-bytecode::asm`), standing in for an arbitrary OS command.
        program: PathBuf,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Merge previously written snapshots and report their union.
    Coalesce { snapshots: Vec<PathBuf> },
}

impl Cli {
    /// Resolve the `--color`/`--no-color` pair into a tri-state decision:
    /// `None` means "auto-detect from the output stream."
    pub fn color_choice(&self) -> Option<bool> {
        if self.color {
            Some(true)
        } else if self.no_color {
            Some(false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_trace_with_targets_and_program_args() {
        let cli = Cli::parse_from([
            "coven",
            "--targets",
            "pkg.mod,pkg.other",
            "trace",
            "fixtures/demo.covbc",
            "--",
            "--verbose",
        ]);
        assert_eq!(cli.targets, vec!["pkg.mod", "pkg.other"]);
        match cli.command {
            Command::Trace { program, args } => {
                assert_eq!(program, PathBuf::from("fixtures/demo.covbc"));
                assert_eq!(args, vec!["--verbose".to_string()]);
            }
            Command::Coalesce { .. } => panic!("expected Trace"),
        }
    }

    #[test]
    fn parses_coalesce_with_multiple_snapshots() {
        let cli = Cli::parse_from(["coven", "coalesce", "a.covsnap", "b.covsnap"]);
        match cli.command {
            Command::Coalesce { snapshots } => {
                assert_eq!(snapshots, vec![PathBuf::from("a.covsnap"), PathBuf::from("b.covsnap")]);
            }
            Command::Trace { .. } => panic!("expected Coalesce"),
        }
    }

    #[test]
    fn no_color_overrides_an_earlier_color_flag() {
        let cli = Cli::parse_from(["coven", "--color", "--no-color", "coalesce", "a.covsnap"]);
        assert_eq!(cli.color_choice(), Some(false));
    }

    #[test]
    fn color_choice_is_none_when_neither_flag_given() {
        let cli = Cli::parse_from(["coven", "coalesce", "a.covsnap"]);
        assert_eq!(cli.color_choice(), None);
    }
}
