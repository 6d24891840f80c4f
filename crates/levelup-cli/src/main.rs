//! CLI entry point.
//!
//! Configures logging and the environment, then hands the parsed command to
//! its handler through the context composed by `bootstrap`.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use levelup_cli::handlers::{info, update};
use levelup_cli::{Cli, CliConfig, CliError, Commands, bootstrap};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = CliConfig::resolve(cli.data_dir.clone())?;
    if let Commands::Update(args) = &cli.command {
        config = config.with_settings(update::pipeline_settings(args));
    }
    let ctx = bootstrap(&config)?;

    let result = match &cli.command {
        Commands::Update(args) => update::execute(&ctx, args).await,
        Commands::Info { game_id } => info::execute(&ctx, game_id).await,
    };

    if let Err(err) = result {
        exit_with(&err);
    }
    Ok(())
}

fn exit_with(err: &CliError) -> ! {
    eprintln!("Error: {err}");
    std::process::exit(err.exit_code());
}
