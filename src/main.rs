//! copr-rebuild CLI - Rebuild Koji packages on Copr in dependency order
//!
//! Entry point for the copr-rebuild command-line application.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use copr_rebuild::cli::output::{display_error, OutputConfig};
use copr_rebuild::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Apply output configuration globally
    let output_config = OutputConfig::new(cli.quiet, cli.json, cli.verbose);
    output_config.apply_global();

    // RUST_LOG wins over the -v/-q flags
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(output_config.log_level().into()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Run the command and handle errors
    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
