//! # Curriculum - taxonomy archive tool
//!
//! The main binary for the curriculum import/export engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for archive and catalog operations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              apps/curriculum (THE BINARY)            │
//! │                                                      │
//! │  ┌─────────────┐   ┌─────────────┐   ┌───────────┐  │
//! │  │    CLI      │   │  HTTP API   │   │  Config   │  │
//! │  │   (clap)    │   │   (axum)    │   │  (toml)   │  │
//! │  └──────┬──────┘   └──────┬──────┘   └─────┬─────┘  │
//! │         └─────────────────┼────────────────┘        │
//! │                           ▼                         │
//! │                 ┌───────────────────┐               │
//! │                 │  curriculum-core  │               │
//! │                 │   (THE LOGIC)     │               │
//! │                 └───────────────────┘               │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! curriculum export -o catalog.tar
//! curriculum -D other.db import -i catalog.tar --dry-run
//! curriculum server --port 8080
//! ```

use clap::Parser;
use curriculum::{
    cli,
    config::{AppConfig, LogFormat},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    cli.apply_overrides(&mut config);

    init_tracing(config.log_format);

    if cli.shows_banner() {
        print_banner();
    }

    if let Err(e) = cli::execute(cli, config).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "curriculum=info,curriculum_core=info,tower_http=debug".into());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  curriculum v{}

  Archives in, identical trees out.
"#,
        env!("CARGO_PKG_VERSION")
    );
}
