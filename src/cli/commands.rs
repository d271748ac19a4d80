//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: run every registered map runner
//! - show-config: print the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Gridload - load generation for distributed data grid maps
#[derive(Parser, Debug)]
#[command(name = "gridload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log to stderr instead of the log file
    #[arg(long, global = true)]
    pub log_stderr: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run all registered map runners
    Run {
        /// Client identity to embed in map names and keys (generated if absent)
        #[arg(long)]
        client_id: Option<String>,
    },

    /// Print the effective configuration as YAML
    ShowConfig,
}
