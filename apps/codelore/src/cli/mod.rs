//! # Command-Line Interface
//!
//! Clap-derived CLI for running the server and working with a knowledge
//! database directly from the shell.

pub mod commands;

use clap::{Parser, Subcommand};
use codelore_core::LoreError;
use std::path::PathBuf;

/// Persistent code knowledge graph: entities, relationships, patterns
/// and style conventions recorded during code analysis.
#[derive(Parser, Debug)]
#[command(name = "codelore", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress the startup banner
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the knowledge database
    #[arg(short = 'D', long, global = true, default_value = "codelore.db")]
    pub database: PathBuf,

    /// Storage backend: "redb" or "file"
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    pub json_mode: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API server
    Server {
        /// Host address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },

    /// Show database status and statistics
    Status,

    /// Register facts from a JSON file
    Register {
        /// Path to the facts file
        file: PathBuf,
    },

    /// Query stored entities
    Query {
        /// Filter by entity type
        #[arg(short = 't', long)]
        entity_type: Option<String>,

        /// Filter by language
        #[arg(short, long)]
        language: Option<String>,

        /// Filter names by regular expression
        #[arg(short = 'p', long)]
        name_pattern: Option<String>,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<i64>,

        /// Show full details for one entity by exact name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Export the knowledge snapshot to a file
    Export {
        /// Output path for the snapshot
        #[arg(short, long, default_value = "codelore-export.bin")]
        output: PathBuf,
    },

    /// Initialize a new empty knowledge database
    Init {
        /// Overwrite an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Delete all stored knowledge
    Clear,
}

/// Dispatch the parsed command line.
pub async fn execute(cli: Cli) -> Result<(), LoreError> {
    match cli.command {
        Some(Commands::Server { ref host, port }) => {
            let addr = format!("{host}:{port}");
            commands::cmd_server(&cli, &addr).await
        }
        Some(Commands::Status) | None => commands::cmd_status(&cli),
        Some(Commands::Register { ref file }) => commands::cmd_register(&cli, file),
        Some(Commands::Query {
            ref entity_type,
            ref language,
            ref name_pattern,
            limit,
            ref name,
        }) => commands::cmd_query(&cli, entity_type, language, name_pattern, limit, name),
        Some(Commands::Export { ref output }) => commands::cmd_export(&cli, output),
        Some(Commands::Init { force }) => commands::cmd_init(&cli, force),
        Some(Commands::Clear) => commands::cmd_clear(&cli),
    }
}
