//! prodcat CLI: product catalog maintenance.
//!
//! Scans product-list spreadsheets, normalizes chemistry, published and image
//! fields in the product store or through the catalog API, and verifies
//! records by identifier.

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
