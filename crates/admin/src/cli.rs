//! CLI argument definitions using clap.
//!
//! Commands:
//! - strata-admin migrate
//! - strata-admin create-version --item <id>
//! - strata-admin remove-version --version <id>
//! - strata-admin restore-version --version <id>
//! - strata-admin summary --version <id> --text <summary>
//! - strata-admin history --item <id>
//! - strata-admin install --item <id>
//! - strata-admin correction begin|merge ...

use clap::{Parser, Subcommand};
use strata_core::types::DbId;

/// Version history and relationship maintenance for the repository.
#[derive(Parser, Debug)]
#[command(name = "strata-admin")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending database migrations
    Migrate,

    /// Create a new, not yet installed version of an item
    CreateVersion {
        /// Item to version
        #[arg(long)]
        item: DbId,
        /// Free-text summary of the change
        #[arg(long)]
        summary: Option<String>,
        /// User creating the version; becomes the submitter of the copy
        #[arg(long)]
        actor: Option<DbId>,
    },

    /// Delete a version record and its item
    RemoveVersion {
        /// Version record id
        #[arg(long)]
        version: DbId,
    },

    /// Restore an older version (not supported; reports so)
    RestoreVersion {
        #[arg(long)]
        version: DbId,
        #[arg(long)]
        summary: Option<String>,
    },

    /// Replace the summary of a version record
    Summary {
        #[arg(long)]
        version: DbId,
        #[arg(long)]
        text: String,
    },

    /// Print the version history of an item
    History {
        #[arg(long)]
        item: DbId,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Install an item and reconcile its version chain
    Install {
        #[arg(long)]
        item: DbId,
    },

    /// Correction workflow
    #[command(subcommand)]
    Correction(CorrectionCommand),
}

#[derive(Subcommand, Debug)]
pub enum CorrectionCommand {
    /// Create a working copy of an archived item
    Begin {
        #[arg(long)]
        item: DbId,
        #[arg(long)]
        submitter: Option<DbId>,
    },

    /// Merge a reviewed working copy back into the native item
    Merge {
        /// Workflow entry wrapping the working copy
        #[arg(long)]
        workflow_entry: DbId,
        #[arg(long)]
        working: DbId,
        #[arg(long)]
        native: DbId,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn definitions_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_create_version() {
        let cli = Cli::try_parse_from([
            "strata-admin",
            "--database-url",
            "postgres://localhost/strata",
            "create-version",
            "--item",
            "42",
            "--summary",
            "typo fixes",
        ])
        .unwrap();
        match cli.command {
            Command::CreateVersion {
                item,
                summary,
                actor,
            } => {
                assert_eq!(item, 42);
                assert_eq!(summary.as_deref(), Some("typo fixes"));
                assert_eq!(actor, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_correction_merge() {
        let cli = Cli::try_parse_from([
            "strata-admin",
            "--database-url",
            "postgres://localhost/strata",
            "correction",
            "merge",
            "--workflow-entry",
            "3",
            "--working",
            "8",
            "--native",
            "5",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Correction(CorrectionCommand::Merge {
                workflow_entry: 3,
                working: 8,
                native: 5
            })
        ));
    }

    #[test]
    fn item_ids_must_be_numeric() {
        let parsed = Cli::try_parse_from([
            "strata-admin",
            "--database-url",
            "postgres://localhost/strata",
            "install",
            "--item",
            "abc",
        ]);
        assert!(parsed.is_err());
    }
}
