//! Command-line adapter for the levelup update pipeline.
//!
//! Wires [`levelup_update::UpdateManager`] to concrete infrastructure:
//!
//! - `adapters::http_engine` - a `reqwest` download engine with range resume
//! - `adapters::game_info_store` - a JSON file of installed games
//! - `adapters::terminal` - `indicatif` progress rendering
//!
//! `bootstrap` is the composition root; `handlers` hold the command logic.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by the binary only
use dotenvy as _;
use tracing_subscriber as _;

pub mod adapters;
pub mod bootstrap;
pub mod commands;
pub mod error;
pub mod handlers;
pub mod parser;

pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::Commands;
pub use error::CliError;
pub use parser::Cli;
