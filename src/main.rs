//! Stagegate CLI entry point.

use clap::Parser;

use stagegate::cli::{self, commands, Cli, Commands};
use stagegate::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli::load_config(&cli) {
        Ok(config) => config,
        Err(err) => cli::handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Resolve(args) => commands::resolve::execute(args, &config, cli.json).await,
        Commands::Check(args) => commands::check::execute(args, &config, cli.json).await,
        Commands::Replay(args) => commands::replay::execute(args, &config, cli.json).await,
        Commands::Watch(args) => commands::watch::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        cli::handle_error(err, cli.json);
    }
}
