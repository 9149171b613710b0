//! # Trilayer CLI Module
//!
//! This module implements the CLI interface for Trilayer.
//!
//! ## Available Commands
//!
//! - `status` - Show entity counts and wiring problems of a graph file
//! - `analyze` - Run the full analysis through a domain mapper
//! - `cascade` - Show cascading failure scenarios
//! - `normalize` - Rewrite a graph file in canonical interchange form
//! - `domains` - List registered domain mappers

mod commands;

use crate::settings::Settings;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use trilayer_core::{DomainRegistry, TrilayerError};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Trilayer - Form / Function / Failure analyzer
///
/// Loads a three-layer system model and reports criticality, functional
/// bottlenecks, failure propagation and property trends.
#[derive(Parser, Debug)]
#[command(name = "trilayer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress informational output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Path to a TOML settings file (overrides TRILAYER_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Report section selected by `analyze --section`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Section {
    All,
    Structural,
    Functional,
    Risk,
    Timeseries,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show graph status
    Status {
        /// Path to the interchange file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Run every analysis on a domain payload
    Analyze {
        /// Path to the domain payload (JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Domain mapper to use (defaults to the settings domain)
        #[arg(short, long)]
        domain: Option<String>,

        /// Report section to print (interchange payloads only)
        #[arg(short, long, value_enum, default_value = "all")]
        section: Section,
    },

    /// Show cascading failure scenarios
    Cascade {
        /// Path to the interchange file
        #[arg(short, long)]
        file: PathBuf,

        /// Only the cascade started by this failure mode
        #[arg(long)]
        failure: Option<String>,
    },

    /// Rewrite a graph file in canonical interchange form
    Normalize {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List registered domain mappers
    Domains,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
///
/// The registry is built by the caller so embedders can add their own
/// mappers.
pub fn execute(cli: Cli, registry: &DomainRegistry) -> Result<(), TrilayerError> {
    let settings = Settings::resolve(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Status { file }) => cmd_status(&file, json_mode),
        Some(Commands::Analyze {
            file,
            domain,
            section,
        }) => {
            let domain = domain.unwrap_or_else(|| settings.domain.clone());
            cmd_analyze(registry, &settings, &file, &domain, section)
        }
        Some(Commands::Cascade { file, failure }) => {
            cmd_cascade(&file, failure.as_deref(), json_mode)
        }
        Some(Commands::Normalize { input, output }) => {
            cmd_normalize(&input, &output, json_mode, cli.quiet)
        }
        Some(Commands::Domains) => cmd_domains(registry, json_mode),
        None => {
            if !cli.quiet {
                println!("No command specified. Use --help for usage information.");
            }
            Ok(())
        }
    }
}
