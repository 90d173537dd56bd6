//! jobscraper CLI: job-listing search sessions from the terminal or over HTTP.
//!
//! Runs paginated search sessions against a headless rendering service and
//! prints the extracted listings, or serves the same sessions behind a small
//! JSON API.

mod commands;
mod server;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
