//! # urldex CLI Module
//!
//! This module implements the CLI interface for urldex.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show catalog status
//! - `add` - Catalog a URL
//! - `list` - List a domain's nodes
//! - `export` - Export catalog snapshot to file
//! - `import` - Import catalog snapshot into a new database
//! - `init` - Initialize new database

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use urldex_core::CatalogError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// urldex - URL Catalog Server
///
/// A domain-partitioned URL catalog with schema-validated attributes,
/// dependency cascades, and an append-only event log.
#[derive(Parser, Debug)]
#[command(name = "urldex")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the catalog database
    #[arg(short = 'D', long, global = true, default_value = "urldex.redb")]
    pub database: PathBuf,

    /// Storage backend: "redb" (ACID database) or "memory" (ephemeral)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show catalog status
    Status,

    /// Catalog a URL
    Add {
        /// Domain name (created on first use)
        #[arg(short, long)]
        domain: String,

        /// The URL to catalog
        #[arg(short, long)]
        url: String,

        /// Title
        #[arg(short, long, default_value = "")]
        title: String,

        /// Description
        #[arg(long, default_value = "")]
        description: String,
    },

    /// List a domain's nodes
    List {
        /// Domain name
        #[arg(short, long)]
        domain: String,

        /// Case-insensitive substring match over title and URL
        #[arg(short, long)]
        search: Option<String>,

        /// Page number (1-indexed)
        #[arg(short, long)]
        page: Option<usize>,

        /// Page size
        #[arg(long)]
        size: Option<usize>,
    },

    /// Export catalog snapshot to a file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import a catalog snapshot into a fresh database
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), CatalogError> {
    let backend = cli.backend.as_str();
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            cmd_server(&cli.database, backend, &host, port).await
        }
        Some(Commands::Status) => cmd_status(&cli.database, backend, json_mode),
        Some(Commands::Add {
            domain,
            url,
            title,
            description,
        }) => cmd_add(
            &cli.database,
            backend,
            json_mode,
            &domain,
            &url,
            &title,
            &description,
        ),
        Some(Commands::List {
            domain,
            search,
            page,
            size,
        }) => cmd_list(
            &cli.database,
            backend,
            json_mode,
            &domain,
            search.as_deref(),
            page,
            size,
        ),
        Some(Commands::Export { output }) => cmd_export(&cli.database, backend, &output),
        Some(Commands::Import { input }) => cmd_import(&cli.database, &input),
        Some(Commands::Init { force }) => cmd_init(&cli.database, force),
        None => {
            // No subcommand - show status by default
            cmd_status(&cli.database, backend, json_mode)
        }
    }
}
