//! almanac CLI: scrape league leader tables, clean them, load them into SQLite.
//!
//! Each stage is a standalone batch job; `almanac run` chains all three.

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
