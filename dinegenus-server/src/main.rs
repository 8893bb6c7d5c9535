use std::process::ExitCode;

use colored::Colorize;
use dinegenus_server::{logging, run_server, ServerConfig};
use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_logger().expect("logging is initialized");

    info!("Starting dinegenus...");

    let result = match ServerConfig::from_env() {
        Ok(config) => run_server(config).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(
                "{} Read the error below to troubleshoot the issue.",
                "dinegenus failed to start!".bold().red()
            );
            error!("{}", error);
            error!("{}", format!("Hint: {}", error.hint()).bright_black().italic());

            ExitCode::FAILURE
        }
    }
}
