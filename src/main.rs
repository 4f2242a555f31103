use anyhow::Result;
use bankroll::cli::Cli;
use bankroll::logging::init_cli_logger;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_logger(cli.verbose);
    cli.run().await
}
