//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface of the levelup launcher.
///
/// Global options configure where launcher state lives and how verbose the
/// logs are; the subcommand selects the work.
#[derive(Parser)]
#[command(name = "levelup")]
#[command(about = "Download, install and patch games")]
#[command(version)]
pub struct Cli {
    /// Directory for launcher state (installed game records)
    #[arg(long = "data-dir", env = "LEVELUP_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is not set.
    pub const fn default_log_filter(&self) -> &'static str {
        if self.verbose { "levelup=debug,info" } else { "warn" }
    }
}
