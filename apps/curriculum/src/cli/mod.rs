//! # Curriculum CLI Module
//!
//! This module implements the CLI interface.
//!
//! ## Available Commands
//!
//! - `init` - Create an empty database
//! - `status` - Show record counts per kind
//! - `export` - Write the catalog to an archive file
//! - `import` - Import an archive file
//! - `tree` - Show one curriculum with its subtree
//! - `list` - List curricula, filtered and paginated
//! - `delete` - Delete a record and its descendants
//! - `server` - Start the HTTP server

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use curriculum_core::CurriculumError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Curriculum - taxonomy archive tool
///
/// Exports a curriculum catalog as a portable archive of flat tables and
/// rebuilds identical trees from such archives in another database.
#[derive(Parser, Debug)]
#[command(name = "curriculum")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the redb database (overrides config and environment)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Path to a TOML configuration file (default: ./curriculum.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long = "json", global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty database
    Init {
        /// Replace an existing database
        #[arg(short, long)]
        force: bool,
    },

    /// Show record counts per kind
    Status,

    /// Export the whole catalog to an archive file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import an archive file
    Import {
        /// Input archive path
        #[arg(short, long)]
        input: PathBuf,

        /// Validate and report without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Never treat an unmapped parent id as an existing record
        #[arg(long)]
        strict_references: bool,
    },

    /// Show one curriculum with its full subtree
    Tree {
        /// Curriculum id
        #[arg(long)]
        id: u64,
    },

    /// List curricula
    List {
        /// Only curricula of this state
        #[arg(long)]
        state: Option<String>,

        /// Only curricula of this subject
        #[arg(long)]
        subject: Option<String>,

        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: usize,
    },

    /// Delete a record and all its descendants
    Delete {
        /// Kind of the record (e.g. curriculum, learning_area)
        #[arg(short, long)]
        kind: String,

        /// Record id
        #[arg(long)]
        id: u64,
    },

    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve an in-memory catalog instead of the database
        #[arg(long)]
        memory: bool,
    },
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(database) = &self.database {
            config.database.clone_from(database);
        }
        if let Some(Commands::Server { host, port, .. }) = &self.command {
            if let Some(host) = host {
                config.server.host.clone_from(host);
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }
    }

    /// Whether the startup banner should be printed.
    pub fn shows_banner(&self) -> bool {
        !self.quiet && !self.json_mode
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and resolved configuration.
pub async fn execute(cli: Cli, config: AppConfig) -> Result<(), CurriculumError> {
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Status) => cmd_status(&config, json_mode),
        Some(Commands::Export { output }) => cmd_export(&config, &output),
        Some(Commands::Import {
            input,
            dry_run,
            strict_references,
        }) => cmd_import(&config, &input, dry_run, strict_references, json_mode),
        Some(Commands::Tree { id }) => cmd_tree(&config, id, json_mode),
        Some(Commands::List {
            state,
            subject,
            page,
        }) => cmd_list(&config, state, subject, page, json_mode),
        Some(Commands::Delete { kind, id }) => cmd_delete(&config, &kind, id, json_mode),
        Some(Commands::Server { memory, .. }) => cmd_server(config, memory).await,
        None => {
            // No subcommand - show status by default
            cmd_status(&config, json_mode)
        }
    }
}
