#![cfg(not(tarpaulin_include))]

use clap::Parser;
use cosme_insight::app;
use cosme_insight::config::Config;

/// Main entry point for the dashboard server
///
/// Reads flags (with environment fallbacks), primes the survey cache and
/// serves the dashboard until the process is stopped.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success, or the startup error
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    app::run(config).await
}
