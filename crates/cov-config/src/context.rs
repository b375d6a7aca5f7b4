//! `CovenContext`: the resolved run-time settings derived from [`Cli`],
//! mirroring `core-config`'s `Config`/`ConfigContext` split between "what
//! was asked for" and "what this run will actually do."

use std::path::PathBuf;

use crate::cli::Cli;

#[derive(Debug, Clone)]
pub struct CovenContext {
    pub targets: Vec<String>,
    pub output: Option<PathBuf>,
    pub show_all: bool,
    pub dbg: Option<String>,
    pub color: bool,
}

impl CovenContext {
    /// Resolve a parsed [`Cli`] into a context, deciding color output when
    /// the user didn't pin one with `--color`/`--no-color`.
    pub fn from_cli(cli: &Cli, stdout_is_tty: bool) -> Self {
        let color = cli.color_choice().unwrap_or(stdout_is_tty);
        tracing::info!(
            target: "coven::config",
            targets = cli.targets.len(),
            show_all = cli.show_all,
            color,
            "context_resolved"
        );
        Self {
            targets: cli.targets.clone(),
            output: cli.output.clone(),
            show_all: cli.show_all,
            dbg: cli.dbg.clone(),
            color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use clap::Parser;

    #[test]
    fn color_falls_back_to_tty_detection_when_unset() {
        let cli = Cli::parse_from(["coven", "coalesce", "a.covsnap"]);
        assert!(CovenContext::from_cli(&cli, true).color);
        assert!(!CovenContext::from_cli(&cli, false).color);
    }

    #[test]
    fn explicit_no_color_wins_over_a_tty() {
        let cli = Cli::parse_from(["coven", "--no-color", "coalesce", "a.covsnap"]);
        assert!(!CovenContext::from_cli(&cli, true).color);
    }
}
