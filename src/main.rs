use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use logpilot::cli::commands::Cli;
use logpilot::cli::handlers::handle_collect_command;
use logpilot::cli::utils::init_logging;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, &cli.log_format);

    handle_collect_command(cli).await
}
