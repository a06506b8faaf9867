//! # codelore - Code Knowledge Graph Server
//!
//! The main binary for the codelore knowledge-graph store.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for graph operations
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                apps/codelore (THE BINARY)              │
//! │                                                        │
//! │     ┌─────────────┐          ┌─────────────┐           │
//! │     │   CLI       │          │   HTTP API  │           │
//! │     │  (clap)     │          │   (axum)    │           │
//! │     └──────┬──────┘          └──────┬──────┘           │
//! │            │                        │                  │
//! │            └───────────┬────────────┘                  │
//! │                        ▼                               │
//! │                ┌───────────────┐                       │
//! │                │ codelore-core │                       │
//! │                │  (THE LOGIC)  │                       │
//! │                └───────────────┘                       │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! codelore server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! codelore status
//! codelore register facts.json
//! codelore query --entity-type class --language rust
//! ```

use clap::Parser;
use codelore::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // Initialize tracing — CODELORE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("CODELORE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "codelore=info,tower_http=debug".into());

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

/// Print the codelore startup banner.
fn print_banner() {
    println!(
        r#"
   ██████╗ ██████╗ ██████╗ ███████╗██╗      ██████╗ ██████╗ ███████╗
  ██╔════╝██╔═══██╗██╔══██╗██╔════╝██║     ██╔═══██╗██╔══██╗██╔════╝
  ██║     ██║   ██║██║  ██║█████╗  ██║     ██║   ██║██████╔╝█████╗
  ██║     ██║   ██║██║  ██║██╔══╝  ██║     ██║   ██║██╔══██╗██╔══╝
  ╚██████╗╚██████╔╝██████╔╝███████╗███████╗╚██████╔╝██║  ██║███████╗
   ╚═════╝ ╚═════╝ ╚═════╝ ╚══════╝╚══════╝ ╚═════╝ ╚═╝  ╚═╝╚══════╝

  Code Knowledge Graph v{}

  Entities • Relationships • Patterns • Conventions
"#,
        env!("CARGO_PKG_VERSION")
    );
}
