//! CLI definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::DEFAULT_DATA_DIR;

pub mod commands;

/// Quiz platform backend with git-friendly JSON sync
#[derive(Parser, Debug)]
#[command(name = "quizbase", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory holding data.db
    #[arg(long, global = true, env = "QB_DIR", default_value = DEFAULT_DATA_DIR)]
    pub dir: PathBuf,

    /// Snapshot directory (overrides PB_SYNC_DIR and ./pb_sync)
    #[arg(long, global = true)]
    pub sync_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import snapshots and start the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8090")]
        http: SocketAddr,
    },

    /// Apply, revert or list schema migrations
    Migrate {
        #[command(subcommand)]
        command: MigrateCommands,
    },

    /// Inspect collections
    Collection {
        #[command(subcommand)]
        command: CollectionCommands,
    },

    /// Read and write records (runs the record hooks)
    Record {
        #[command(subcommand)]
        command: RecordCommands,
    },

    /// Export, import or compare JSON snapshots
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Migrate Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum MigrateCommands {
    /// Apply all pending migrations
    Up,

    /// Revert the most recent migrations
    Down {
        /// Number of migrations to revert
        #[arg(default_value_t = 1)]
        count: usize,
    },

    /// List applied migrations
    History,
}

// ============================================================================
// Collection Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum CollectionCommands {
    /// List collections with record counts
    List,

    /// Show a collection definition
    Show {
        /// Collection name or ID
        collection: String,
    },
}

// ============================================================================
// Record Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum RecordCommands {
    /// List all records of a collection
    List {
        /// Collection name or ID
        collection: String,
    },

    /// Show one record
    Get {
        /// Collection name or ID
        collection: String,
        /// Record ID
        id: String,
    },

    /// Create a record from a JSON object
    Create {
        /// Collection name or ID
        collection: String,
        /// Field values, e.g. '{"title":"Intro"}'
        #[arg(default_value = "{}")]
        data: String,
        /// Password for auth collections
        #[arg(long)]
        password: Option<String>,
    },

    /// Merge a JSON object into an existing record
    Update {
        /// Collection name or ID
        collection: String,
        /// Record ID
        id: String,
        /// Field values to change
        data: String,
        /// New password for auth collections
        #[arg(long)]
        password: Option<String>,
    },

    /// Delete a record
    Delete {
        /// Collection name or ID
        collection: String,
        /// Record ID
        id: String,
    },
}

// ============================================================================
// Sync Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Write snapshots of every collection, or of one
    Export {
        /// Only export this collection
        collection: Option<String>,
    },

    /// Load the lecture, chapters and mc_questions snapshots
    Import,

    /// Compare the database with the snapshot files
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "quizbase",
            "record",
            "create",
            "lecture",
            r#"{"title":"x"}"#,
            "--dir",
            "/tmp/qb",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.dir, PathBuf::from("/tmp/qb"));
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Record {
                command: RecordCommands::Create { .. }
            }
        ));
    }

    #[test]
    fn test_migrate_down_defaults_to_one() {
        let cli = Cli::try_parse_from(["quizbase", "migrate", "down"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Migrate {
                command: MigrateCommands::Down { count: 1 }
            }
        ));
    }

    #[test]
    fn test_serve_default_address() {
        let cli = Cli::try_parse_from(["quizbase", "serve"]).unwrap();
        let Commands::Serve { http } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(http.port(), 8090);
    }
}
