//! # topup CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use topup_cli::reconcile::{run_reconcile, ReconcileArgs};
use topup_cli::validate::{run_validate, ValidateArgs};

/// Wallet top-up rules CLI
///
/// Checks recurring transaction rule spec files and reconciles them against
/// wallet snapshots offline.
#[derive(Parser, Debug)]
#[command(name = "topup", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a rule spec file without a wallet.
    Validate(ValidateArgs),

    /// Reconcile a rule spec file against a wallet snapshot.
    Reconcile(ReconcileArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Validate(args) => run_validate(&args),
        Commands::Reconcile(args) => run_reconcile(&args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_reconcile_flags() {
        let cli = Cli::parse_from([
            "topup",
            "-vv",
            "reconcile",
            "--snapshot",
            "wallet.json",
            "--specs",
            "rules.yaml",
            "--reject-unresolved",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Reconcile(args) => {
                assert!(args.reject_unresolved);
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
