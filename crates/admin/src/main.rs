//! `planet-admin` entry point.

use std::process::ExitCode;

use admin::cli::Cli;
use admin::config::Config;
use clap::Parser;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("planet-admin: {e}");
            return ExitCode::from(2);
        }
    };

    if let Err(e) = admin::telemetry::init_tracing(&config) {
        eprintln!("planet-admin: {e}");
    }

    let mut stdout = std::io::stdout();
    match admin::run(&config, cli.command, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("planet-admin: {e}");
            ExitCode::FAILURE
        }
    }
}
