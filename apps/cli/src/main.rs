//! pressfeat CLI: batch featurization of scraped press releases.
//!
//! Turns raw article and listing HTML into labeled feature records for
//! downstream text classification.

mod commands;

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
