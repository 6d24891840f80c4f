//! Main commands enum and primary subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Available commands of the launcher.
#[derive(Subcommand)]
pub enum Commands {
    /// Download and install every resource of an update description
    Update(UpdateArgs),

    /// Show what the launcher knows about an installed game
    Info {
        /// Game identifier
        game_id: String,
    },
}

/// Arguments of `levelup update`.
#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    /// Game identifier
    pub game_id: String,

    /// Update description: a JSON file path or an http(s) URL
    #[arg(short, long)]
    pub manifest: String,

    /// Directory the game is installed into
    #[arg(short, long)]
    pub target: PathBuf,

    /// Executable path, relative to the target directory
    #[arg(short, long)]
    pub runnable: PathBuf,

    /// Display title (defaults to the game identifier)
    #[arg(long)]
    pub title: Option<String>,

    /// Create a desktop shortcut after installing
    #[arg(long)]
    pub shortcut: bool,

    /// Automatic retries after a failed download or install
    #[arg(long, env = "LEVELUP_MAX_RETRIES", default_value_t = 3)]
    pub retries: u32,

    /// Seconds to wait before each automatic retry
    #[arg(long, env = "LEVELUP_RETRY_DELAY", default_value_t = 2)]
    pub retry_delay: u64,

    /// Fail the install when a patched file does not match its checksum
    #[arg(long, env = "LEVELUP_STRICT_HASHES")]
    pub strict_hashes: bool,

    /// Free space (MiB) under which an interruption is blamed on the disk
    #[arg(long, env = "LEVELUP_FREE_SPACE_MIB")]
    pub free_space_mib: Option<u64>,

    /// Extra request header, as `Name: value` (repeatable)
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,
}

/// Parse a `Name: value` (or `Name=value`) header argument.
fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .or_else(|| raw.split_once('='))
        .ok_or_else(|| format!("expected `Name: value`, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header name missing in `{raw}`"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
