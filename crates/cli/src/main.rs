mod app;
mod cli;
mod commands;
mod terminal;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use vwatch_core::config::load_dotenv;
use vwatch_core::Config;

use crate::app::App;
use crate::cli::CliArgs;
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = CliArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.command.default_log_level())),
        )
        .with_target(false)
        .init();

    let config = match &args.profile {
        Some(profile) => Config::for_profile(profile),
        None => Config::from_env(),
    };
    config.log_summary();

    let terminal = Terminal::new();
    let app = App::build(config).await?;

    if let Err(e) = commands::dispatch(&app, &terminal, args.command).await {
        error!(error = %e, "Command failed");
        terminal.print_error(&format!("{e:#}"))?;
        std::process::exit(1);
    }
    Ok(())
}
