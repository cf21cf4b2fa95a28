#![cfg(not(tarpaulin_include))]

use sheetpulse::app;
use sheetpulse::config::Config;

/// Main entry point for the chart-data API server
///
/// Initializes logging, loads configuration from the environment, and runs
/// the HTTP server until it is shut down.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_env();
    app::run(config).await
}
