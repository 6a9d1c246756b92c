//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Acquisition pipeline for business-entity data: browser-driven directory
/// scraping plus authenticated API contract replay, on a schedule or on
/// demand.
#[derive(Parser, Debug)]
#[command(name = "prospector", version, about)]
pub struct Cli {
    /// Path to the configuration file (defaults to the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the SQLite database (defaults to the platform data dir)
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the directory layer once
    Directory {
        /// Directory holding source definition TOML files
        #[arg(long, default_value = "sources")]
        sources: PathBuf,
    },

    /// Replay the API contract once
    Contract {
        /// Path to the contract JSON file
        #[arg(long, default_value = "contracts/api_contract.json")]
        contract: PathBuf,
    },

    /// Run both layers once, directory first
    Both {
        /// Directory holding source definition TOML files
        #[arg(long, default_value = "sources")]
        sources: PathBuf,

        /// Path to the contract JSON file
        #[arg(long, default_value = "contracts/api_contract.json")]
        contract: PathBuf,
    },

    /// Keep both layers running on their configured intervals
    Schedule {
        /// Directory holding source definition TOML files
        #[arg(long, default_value = "sources")]
        sources: PathBuf,

        /// Path to the contract JSON file
        #[arg(long, default_value = "contracts/api_contract.json")]
        contract: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["prospector", "directory"]).expect("parse");
        assert!(matches!(cli.command, Command::Directory { .. }));

        let cli = Cli::try_parse_from([
            "prospector",
            "--database",
            "/tmp/p.db",
            "schedule",
            "--sources",
            "defs",
        ])
        .expect("parse");
        assert_eq!(cli.database.as_deref(), Some(std::path::Path::new("/tmp/p.db")));
        match cli.command {
            Command::Schedule { sources, .. } => assert_eq!(sources, PathBuf::from("defs")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["prospector"]).is_err());
    }
}
