//! Postforge CLI — blog post enrichment tool.
//!
//! Ingests blog posts into a local database, enhances them with
//! reference-backed LLM synthesis, and reformats their original text.

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
