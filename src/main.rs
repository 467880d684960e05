use clap::Parser;
use std::process::ExitCode;

use planning_services::commands::{self, Cli};
use planning_services::{config, logging};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    logging::init_logging()?;

    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config()?;

    let mut stdout = std::io::stdout().lock();
    match commands::run(cli, &config, &mut stdout).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            tracing::error!("Command failed: {:?}", err);
            eprintln!("{}", err.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}
