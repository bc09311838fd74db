//! QuestGuide CLI: enrich quests with AI guides and matched images.
//!
//! Loads quest snapshots from JSON, runs them through the enrichment
//! pipeline, and prints either the enriched guide or the plain quest view.

mod commands;
mod render;

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
