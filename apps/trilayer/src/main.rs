//! # Trilayer - Form / Function / Failure Analyzer
//!
//! The command-line binary for the Trilayer analysis engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                apps/trilayer (THE BINARY)             │
//! │                                                       │
//! │   ┌─────────────┐   ┌──────────────┐   ┌──────────┐   │
//! │   │    CLI      │   │   Settings   │   │ Registry │   │
//! │   │   (clap)    │   │   (toml)     │   │ (mappers)│   │
//! │   └──────┬──────┘   └──────┬───────┘   └────┬─────┘   │
//! │          └─────────────────┼────────────────┘         │
//! │                            ▼                          │
//! │                   ┌─────────────────┐                 │
//! │                   │  trilayer-core  │                 │
//! │                   │  (THE LOGIC)    │                 │
//! │                   └─────────────────┘                 │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! trilayer status -f plant.json
//! trilayer analyze -f plant.json --section risk
//! trilayer cascade -f plant.json --failure overpressure
//! trilayer normalize -i raw.json -o plant.json
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trilayer::cli;
use trilayer_core::DomainRegistry;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // TRILAYER_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("TRILAYER_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "trilayer=info,trilayer_core=warn".into());

    // Logs go to stderr so JSON output on stdout stays parseable.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();
    let registry = DomainRegistry::with_builtin();

    if let Err(e) = cli::execute(cli, &registry) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
