//! # urldex - URL Catalog Server
//!
//! The main binary for the urldex catalog engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for catalog operations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 apps/urldex (THE BINARY)                 │
//! │                                                          │
//! │   ┌─────────────┐             ┌─────────────┐            │
//! │   │    CLI      │             │  HTTP API   │            │
//! │   │   (clap)    │             │   (axum)    │            │
//! │   └──────┬──────┘             └──────┬──────┘            │
//! │          │                           │                   │
//! │          └─────────────┬─────────────┘                   │
//! │                        ▼                                 │
//! │                ┌───────────────┐                         │
//! │                │  urldex-core  │                         │
//! │                │  (THE LOGIC)  │                         │
//! │                └───────────────┘                         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! urldex server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! urldex status
//! urldex add -d bookmarks -u https://example.com -t "Example"
//! urldex list -d bookmarks
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use urldex::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — URLDEX_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("URLDEX_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "urldex=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    // Display startup banner
    if !cli.quiet {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the urldex startup banner.
fn print_banner() {
    println!(
        r#"
  ██╗   ██╗██████╗ ██╗     ██████╗ ███████╗██╗  ██╗
  ██║   ██║██╔══██╗██║     ██╔══██╗██╔════╝╚██╗██╔╝
  ██║   ██║██████╔╝██║     ██║  ██║█████╗   ╚███╔╝
  ██║   ██║██╔══██╗██║     ██║  ██║██╔══╝   ██╔██╗
  ╚██████╔╝██║  ██║███████╗██████╔╝███████╗██╔╝ ██╗
   ╚═════╝ ╚═╝  ╚═╝╚══════╝╚═════╝ ╚══════╝╚═╝  ╚═╝

  URL Catalog Server v{}

  Composite Keys • Cascades • Ordered Events
"#,
        env!("CARGO_PKG_VERSION")
    );
}
