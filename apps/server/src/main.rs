//! EnrichKit: homepage scraping and enrichment audit logging service.
//!
//! Runs the HTTP boundary (`enrichkit serve`) and a few local operator
//! commands against the same configuration.

mod commands;
mod error;
mod routes;
mod state;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
