//! Repoblame - streaming per-commit blame analysis for git histories
//!
//! Reconstructs every file at every commit with per-line authorship,
//! language classification, license detection and code metrics.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    // Parse CLI args and run
    let cli = repoblame::cli::Cli::parse();
    repoblame::cli::run(cli)
}
