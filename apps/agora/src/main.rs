//! # Agora - Social Feed Server
//!
//! The main binary for the Agora social feed backend.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for status, export and import
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 apps/agora (THE BINARY)                 │
//! │                                                         │
//! │   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   │
//! │   │    CLI      │   │  HTTP API   │   │   Config    │   │
//! │   │   (clap)    │   │   (axum)    │   │   (toml)    │   │
//! │   └──────┬──────┘   └──────┬──────┘   └──────┬──────┘   │
//! │          └─────────────────┼─────────────────┘          │
//! │                            ▼                            │
//! │                    ┌───────────────┐                    │
//! │                    │  agora-core   │                    │
//! │                    │  (THE LOGIC)  │                    │
//! │                    └───────────────┘                    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! agora server --host 0.0.0.0 --port 3000
//!
//! # CLI operations
//! agora status
//! agora export -o backup.agra
//! agora --config agora.toml import -i backup.agra
//! ```

use agora::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // AGORA_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("AGORA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agora=info,agora_core=info,tower_http=debug".into());

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

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Agora startup banner.
fn print_banner() {
    println!(
        r#"
   █████╗  ██████╗  ██████╗ ██████╗  █████╗
  ██╔══██╗██╔════╝ ██╔═══██╗██╔══██╗██╔══██╗
  ███████║██║  ███╗██║   ██║██████╔╝███████║
  ██╔══██║██║   ██║██║   ██║██╔══██╗██╔══██║
  ██║  ██║╚██████╔╝╚██████╔╝██║  ██║██║  ██║
  ╚═╝  ╚═╝ ╚═════╝  ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝

  Social Feed Server v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
